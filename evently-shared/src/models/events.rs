use chrono::NaiveDate;
use uuid::Uuid;

/// Payloads published on the event bus. `topic()` is appended to the
/// configured topic prefix by the publisher.
pub trait DomainEvent: serde::Serialize + Send + Sync {
    fn topic(&self) -> &'static str;
    fn key(&self) -> String;
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct EventCreatedEvent {
    pub event_id: Uuid,
    pub company_id: Uuid,
    pub kind: String,
    pub date_count: usize,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCreatedEvent {
    pub booking_id: Uuid,
    pub event_id: Uuid,
    pub company_id: Uuid,
    pub date: NaiveDate,
    pub attendees: u32,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingStatusChangedEvent {
    pub booking_id: Uuid,
    pub event_id: Uuid,
    pub company_id: Uuid,
    pub from: String,
    pub to: String,
    pub changed_by: String,
    pub timestamp: i64,
}

/// `slot_clash` marks a payment captured for a date another booking already
/// holds; the operator has to refund or move one of them.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PaymentRecordedEvent {
    pub booking_id: Uuid,
    pub event_id: Uuid,
    pub company_id: Uuid,
    pub date: NaiveDate,
    pub from: String,
    pub to: String,
    pub reference: Option<String>,
    pub slot_clash: bool,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct MessageCreatedEvent {
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: String,
    pub timestamp: i64,
}

impl DomainEvent for EventCreatedEvent {
    fn topic(&self) -> &'static str {
        "event.created"
    }

    fn key(&self) -> String {
        self.company_id.to_string()
    }
}

impl DomainEvent for BookingCreatedEvent {
    fn topic(&self) -> &'static str {
        "booking.created"
    }

    fn key(&self) -> String {
        self.booking_id.to_string()
    }
}

impl DomainEvent for BookingStatusChangedEvent {
    fn topic(&self) -> &'static str {
        "booking.status_changed"
    }

    fn key(&self) -> String {
        self.booking_id.to_string()
    }
}

impl DomainEvent for PaymentRecordedEvent {
    fn topic(&self) -> &'static str {
        "booking.payment_recorded"
    }

    fn key(&self) -> String {
        self.booking_id.to_string()
    }
}

impl DomainEvent for MessageCreatedEvent {
    fn topic(&self) -> &'static str {
        "message.created"
    }

    fn key(&self) -> String {
        self.conversation_id.to_string()
    }
}

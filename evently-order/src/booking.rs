use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use evently_catalog::error::describe_fields;
use evently_catalog::{Event, FieldError};
use evently_shared::Masked;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// pending → confirmed → completed, pending|confirmed → cancelled.
    /// Completed and cancelled are terminal.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Confirmed, Completed) | (Pending, Cancelled) | (Confirmed, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status as reported by the payment provider callback
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn can_move_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Unpaid, Pending)
                | (Unpaid, Paid)
                | (Unpaid, Failed)
                | (Pending, Paid)
                | (Pending, Failed)
                | (Failed, Pending)
                | (Failed, Paid)
                | (Paid, Refunded)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who asked for the booking and how to reach them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub user_id: String,
    pub name: String,
    pub email: Masked<String>,
    pub phone: Option<Masked<String>>,
}

/// Customer-submitted booking request
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub date: NaiveDate,
    #[serde(default)]
    pub time: Option<NaiveTime>,
    pub attendees: u32,
    #[serde(default)]
    pub tier: Option<String>,
    pub name: String,
    pub email: Masked<String>,
    #[serde(default)]
    pub phone: Option<Masked<String>>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub event_id: Uuid,
    pub company_id: Uuid,
    pub customer: Customer,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub attendees: u32,
    pub tier: Option<String>,
    pub total_amount: i64,
    pub currency: String,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Check a request against the event it targets and price it.
    /// The result is a new `pending`/`unpaid` booking.
    pub fn quote(
        event: &Event,
        user_id: &str,
        request: BookingRequest,
        today: NaiveDate,
    ) -> Result<Booking, BookingError> {
        let mut errors = Vec::new();

        if request.name.trim().is_empty() {
            errors.push(FieldError::new("name", "name is required"));
        }
        if !request.email.expose().contains('@') {
            errors.push(FieldError::new("email", "not a valid email address"));
        }
        if request.attendees == 0 {
            errors.push(FieldError::new("attendees", "at least one attendee is required"));
        } else if request.attendees > event.max_attendees {
            errors.push(FieldError::new(
                "attendees",
                format!("at most {} attendees", event.max_attendees),
            ));
        }

        let unit_price = match request.tier.as_deref() {
            Some(name) => match event.tier(name) {
                Some(tier) => {
                    if request.attendees > tier.capacity {
                        errors.push(FieldError::new(
                            "attendees",
                            format!("tier '{}' seats at most {}", tier.name, tier.capacity),
                        ));
                    }
                    tier.price
                }
                None => {
                    errors.push(FieldError::new("tier", format!("unknown tier '{}'", name)));
                    event.price
                }
            },
            None => event.price,
        };

        let total_amount = match unit_price.checked_mul(i64::from(request.attendees)) {
            Some(total) => total,
            None => {
                errors.push(FieldError::new("attendees", "total amount is out of range"));
                0
            }
        };

        if !errors.is_empty() {
            return Err(BookingError::Validation(errors));
        }

        if !event.offers_date(request.date, today) {
            return Err(BookingError::DateNotOffered(request.date));
        }

        let now = Utc::now();
        Ok(Booking {
            id: Uuid::new_v4(),
            event_id: event.id,
            company_id: event.company_id,
            customer: Customer {
                user_id: user_id.to_string(),
                name: request.name.trim().to_string(),
                email: request.email,
                phone: request.phone,
            },
            date: request.date,
            time: request.time.or(event.start_time),
            attendees: request.attendees,
            tier: request.tier.and_then(|t| event.tier(&t).map(|tier| tier.name.clone())),
            total_amount,
            currency: event.currency.clone(),
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_reference: None,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a status transition, returning the previous status.
    pub fn transition(&mut self, next: BookingStatus) -> Result<BookingStatus, BookingError> {
        if !self.status.can_transition_to(next) {
            return Err(BookingError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        let previous = self.status;
        self.status = next;
        self.updated_at = Utc::now();
        Ok(previous)
    }

    /// Record a provider-reported payment status, returning the previous one.
    pub fn record_payment(
        &mut self,
        status: PaymentStatus,
        reference: Option<String>,
    ) -> Result<PaymentStatus, BookingError> {
        if !self.payment_status.can_move_to(status) {
            return Err(BookingError::InvalidPaymentTransition {
                from: self.payment_status,
                to: status,
            });
        }
        let previous = self.payment_status;
        self.payment_status = status;
        if reference.is_some() {
            self.payment_reference = reference;
        }
        self.updated_at = Utc::now();
        Ok(previous)
    }

    /// Whether this booking makes its date "booked" for the event.
    pub fn holds_slot(&self) -> bool {
        match self.status {
            BookingStatus::Confirmed | BookingStatus::Completed => true,
            BookingStatus::Cancelled => false,
            BookingStatus::Pending => self.payment_status == PaymentStatus::Paid,
        }
    }

    pub fn is_customer(&self, user_id: &str) -> bool {
        self.customer.user_id == user_id
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("Invalid payment status change from {from} to {to}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Event is not offered on {0}")]
    DateNotOffered(NaiveDate),

    #[error("Validation failed: {}", describe_fields(.0))]
    Validation(Vec<FieldError>),
}

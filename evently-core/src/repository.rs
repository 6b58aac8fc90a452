use async_trait::async_trait;
use evently_catalog::{BookingStatusRecord, Company, ConflictGuard, Event};
use evently_order::{Booking, BookingStatus, Conversation, Message, PaymentStatus};
use uuid::Uuid;

use crate::CoreResult;

/// Repository trait for company data access
#[async_trait]
pub trait CompanyRepository: Send + Sync {
    async fn create_company(&self, company: &Company) -> CoreResult<Uuid>;

    async fn get_company(&self, id: Uuid) -> CoreResult<Option<Company>>;

    async fn list_companies_by_owner(&self, owner_user_id: &str) -> CoreResult<Vec<Company>>;
}

/// Repository trait for events and experiences.
///
/// Writes that carry a `ConflictGuard` run the guard against the company's
/// current events and perform the write under the same lock or transaction,
/// failing with `CoreError::Conflict` when the guard reports an overlap.
/// Inserts and deletes keep `Company::event_count` in the same write.
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn list_events_by_company(&self, company_id: Uuid) -> CoreResult<Vec<Event>>;

    async fn get_event(&self, id: Uuid) -> CoreResult<Option<Event>>;

    async fn create_event(&self, event: &Event, guard: Option<&ConflictGuard>) -> CoreResult<Uuid>;

    async fn update_event(&self, event: &Event, guard: Option<&ConflictGuard>) -> CoreResult<()>;

    async fn delete_event(&self, id: Uuid) -> CoreResult<bool>;
}

/// Repository trait for bookings.
///
/// Status and payment updates are conditional on the expected current value
/// (`CoreError::StaleWrite` otherwise) and keep the booking status map in
/// step within the same write: a booking that starts holding its slot marks
/// the date booked, one that stops holding it frees the date unless another
/// booking still does. Confirmation is refused with `CoreError::SlotTaken`
/// while another booking holds the date; payments are always recorded.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<Uuid>;

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    async fn list_bookings_by_company(&self, company_id: Uuid) -> CoreResult<Vec<Booking>>;

    async fn list_bookings_by_customer(&self, user_id: &str) -> CoreResult<Vec<Booking>>;

    /// Fails with `SlotTaken` when confirming a booking whose date another
    /// booking already holds.
    async fn update_booking_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> CoreResult<Booking>;

    async fn update_payment_status(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        next: PaymentStatus,
        reference: Option<String>,
    ) -> CoreResult<PaymentUpdate>;
}

/// A recorded payment. The payment is always stored; `slot_clash` is set when
/// it made the booking hold a date that another booking already holds.
#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    pub booking: Booking,
    pub slot_clash: bool,
}

/// Point lookups on the per (company, event) booking status map.
#[async_trait]
pub trait BookingStatusRepository: Send + Sync {
    async fn get_booking_status_record(
        &self,
        company_id: Uuid,
        event_id: Uuid,
    ) -> CoreResult<Option<BookingStatusRecord>>;
}

/// Repository trait for conversations and their messages
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Stores a new conversation. A booking has at most one: when one already
    /// exists for `conversation.booking_id`, that one is returned unchanged.
    async fn create_conversation(&self, conversation: &Conversation) -> CoreResult<Conversation>;

    async fn get_conversation(&self, id: Uuid) -> CoreResult<Option<Conversation>>;

    async fn find_conversation_by_booking(&self, booking_id: Uuid) -> CoreResult<Option<Conversation>>;

    async fn list_conversations_for_user(&self, user_id: &str) -> CoreResult<Vec<Conversation>>;

    /// Appends the message and advances the conversation's last activity.
    async fn create_message(&self, message: &Message) -> CoreResult<Uuid>;

    /// Oldest first.
    async fn list_messages(&self, conversation_id: Uuid) -> CoreResult<Vec<Message>>;
}

/// Everything the services need from the backing document store.
pub trait DocumentStore:
    CompanyRepository + EventRepository + BookingRepository + BookingStatusRepository + ConversationRepository
{
}

impl<T> DocumentStore for T where
    T: CompanyRepository + EventRepository + BookingRepository + BookingStatusRepository + ConversationRepository
{
}

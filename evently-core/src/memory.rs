use async_trait::async_trait;
use chrono::NaiveDate;
use evently_catalog::{BookingStatusRecord, Company, ConflictGuard, Event, SlotStatus};
use evently_order::{sort_inbox, sort_messages, Booking, BookingStatus, Conversation, Message, PaymentStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::repository::{
    BookingRepository, BookingStatusRepository, CompanyRepository, ConversationRepository, EventRepository,
    PaymentUpdate,
};
use crate::{CoreError, CoreResult};

#[derive(Default)]
struct MemoryState {
    companies: HashMap<Uuid, Company>,
    events: HashMap<Uuid, Event>,
    bookings: HashMap<Uuid, Booking>,
    status_records: HashMap<(Uuid, Uuid), BookingStatusRecord>,
    conversations: HashMap<Uuid, Conversation>,
    messages: HashMap<Uuid, Vec<Message>>,
}

impl MemoryState {
    fn company_events(&self, company_id: Uuid) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .events
            .values()
            .filter(|e| e.company_id == company_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        events
    }

    fn run_guard(&self, guard: Option<&ConflictGuard>) -> CoreResult<()> {
        if let Some(guard) = guard {
            let report = guard.check(&self.company_events(guard.company_id));
            if report.has_conflict {
                return Err(CoreError::Conflict(report));
            }
        }
        Ok(())
    }

    fn slot_held_by_other(&self, booking: &Booking) -> bool {
        self.bookings.values().any(|b| {
            b.id != booking.id && b.event_id == booking.event_id && b.date == booking.date && b.holds_slot()
        })
    }

    fn record_mut(&mut self, company_id: Uuid, event_id: Uuid) -> &mut BookingStatusRecord {
        self.status_records
            .entry((company_id, event_id))
            .or_insert_with(|| BookingStatusRecord::new(company_id, event_id))
    }

    /// Recompute `date` for the event from the bookings currently holding it.
    fn refresh(&mut self, company_id: Uuid, event_id: Uuid, date: NaiveDate) {
        let held = self
            .bookings
            .values()
            .any(|b| b.event_id == event_id && b.date == date && b.holds_slot());
        let status = if held { SlotStatus::Booked } else { SlotStatus::Available };
        self.record_mut(company_id, event_id).set(date, status);
    }

    /// Store `updated` in place of the booking with the same id, keeping the
    /// status map consistent.
    fn commit_booking(&mut self, before_held: bool, updated: Booking) -> Booking {
        let (company_id, event_id, date) = (updated.company_id, updated.event_id, updated.date);
        self.bookings.insert(updated.id, updated.clone());
        if updated.holds_slot() != before_held {
            self.refresh(company_id, event_id, date);
        }
        updated
    }
}

/// Process-local document store. Every operation takes one lock, so guarded
/// writes and conditional updates are atomic with respect to each other.
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the store going away; every call then fails with `Connectivity`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> CoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CoreError::Connectivity("memory store marked unavailable".to_string()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompanyRepository for MemoryStore {
    async fn create_company(&self, company: &Company) -> CoreResult<Uuid> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        state.companies.insert(company.id, company.clone());
        Ok(company.id)
    }

    async fn get_company(&self, id: Uuid) -> CoreResult<Option<Company>> {
        self.ensure_available()?;
        Ok(self.state.read().await.companies.get(&id).cloned())
    }

    async fn list_companies_by_owner(&self, owner_user_id: &str) -> CoreResult<Vec<Company>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let mut companies: Vec<Company> = state
            .companies
            .values()
            .filter(|c| c.owner_user_id == owner_user_id)
            .cloned()
            .collect();
        companies.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(companies)
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn list_events_by_company(&self, company_id: Uuid) -> CoreResult<Vec<Event>> {
        self.ensure_available()?;
        Ok(self.state.read().await.company_events(company_id))
    }

    async fn get_event(&self, id: Uuid) -> CoreResult<Option<Event>> {
        self.ensure_available()?;
        Ok(self.state.read().await.events.get(&id).cloned())
    }

    async fn create_event(&self, event: &Event, guard: Option<&ConflictGuard>) -> CoreResult<Uuid> {
        self.ensure_available()?;
        let mut state = self.state.write().await;

        if !state.companies.contains_key(&event.company_id) {
            return Err(CoreError::NotFound(format!("company {}", event.company_id)));
        }
        state.run_guard(guard)?;

        state.events.insert(event.id, event.clone());
        if let Some(company) = state.companies.get_mut(&event.company_id) {
            company.event_count += 1;
        }
        Ok(event.id)
    }

    async fn update_event(&self, event: &Event, guard: Option<&ConflictGuard>) -> CoreResult<()> {
        self.ensure_available()?;
        let mut state = self.state.write().await;

        match state.events.get(&event.id) {
            Some(existing) if existing.company_id == event.company_id => {}
            Some(_) => return Err(CoreError::Forbidden("events cannot change company".to_string())),
            None => return Err(CoreError::NotFound(format!("event {}", event.id))),
        }
        state.run_guard(guard)?;

        state.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn delete_event(&self, id: Uuid) -> CoreResult<bool> {
        self.ensure_available()?;
        let mut state = self.state.write().await;

        let Some(event) = state.events.remove(&id) else {
            return Ok(false);
        };
        state.status_records.remove(&(event.company_id, id));
        if let Some(company) = state.companies.get_mut(&event.company_id) {
            company.event_count = company.event_count.saturating_sub(1);
        }
        Ok(true)
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<Uuid> {
        self.ensure_available()?;
        let mut state = self.state.write().await;

        if !state.events.contains_key(&booking.event_id) {
            return Err(CoreError::NotFound(format!("event {}", booking.event_id)));
        }
        let booked = state
            .status_records
            .get(&(booking.company_id, booking.event_id))
            .is_some_and(|r| r.is_booked(booking.date));
        if booked {
            return Err(CoreError::SlotTaken(booking.date));
        }

        state.commit_booking(false, booking.clone());
        Ok(booking.id)
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        self.ensure_available()?;
        Ok(self.state.read().await.bookings.get(&id).cloned())
    }

    async fn list_bookings_by_company(&self, company_id: Uuid) -> CoreResult<Vec<Booking>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.company_id == company_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn list_bookings_by_customer(&self, user_id: &str) -> CoreResult<Vec<Booking>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.is_customer(user_id))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> CoreResult<Booking> {
        self.ensure_available()?;
        let mut state = self.state.write().await;

        let mut booking = state
            .bookings
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", id)))?;
        if booking.status != expected {
            return Err(CoreError::StaleWrite(format!("booking {}", id)));
        }

        let before_held = booking.holds_slot();
        booking.transition(next)?;
        if next == BookingStatus::Confirmed && state.slot_held_by_other(&booking) {
            return Err(CoreError::SlotTaken(booking.date));
        }
        Ok(state.commit_booking(before_held, booking))
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        next: PaymentStatus,
        reference: Option<String>,
    ) -> CoreResult<PaymentUpdate> {
        self.ensure_available()?;
        let mut state = self.state.write().await;

        let mut booking = state
            .bookings
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", id)))?;
        if booking.payment_status != expected {
            return Err(CoreError::StaleWrite(format!("booking {}", id)));
        }

        let before_held = booking.holds_slot();
        booking.record_payment(next, reference)?;
        let slot_clash = booking.holds_slot() && !before_held && state.slot_held_by_other(&booking);
        Ok(PaymentUpdate {
            booking: state.commit_booking(before_held, booking),
            slot_clash,
        })
    }
}

#[async_trait]
impl BookingStatusRepository for MemoryStore {
    async fn get_booking_status_record(
        &self,
        company_id: Uuid,
        event_id: Uuid,
    ) -> CoreResult<Option<BookingStatusRecord>> {
        self.ensure_available()?;
        Ok(self
            .state
            .read()
            .await
            .status_records
            .get(&(company_id, event_id))
            .cloned())
    }
}

#[async_trait]
impl ConversationRepository for MemoryStore {
    async fn create_conversation(&self, conversation: &Conversation) -> CoreResult<Conversation> {
        self.ensure_available()?;
        let mut state = self.state.write().await;

        if let Some(booking_id) = conversation.booking_id {
            let existing = state
                .conversations
                .values()
                .find(|c| c.booking_id == Some(booking_id));
            if let Some(existing) = existing {
                return Ok(existing.clone());
            }
        }

        state.conversations.insert(conversation.id, conversation.clone());
        state.messages.entry(conversation.id).or_default();
        Ok(conversation.clone())
    }

    async fn get_conversation(&self, id: Uuid) -> CoreResult<Option<Conversation>> {
        self.ensure_available()?;
        Ok(self.state.read().await.conversations.get(&id).cloned())
    }

    async fn find_conversation_by_booking(&self, booking_id: Uuid) -> CoreResult<Option<Conversation>> {
        self.ensure_available()?;
        Ok(self
            .state
            .read()
            .await
            .conversations
            .values()
            .find(|c| c.booking_id == Some(booking_id))
            .cloned())
    }

    async fn list_conversations_for_user(&self, user_id: &str) -> CoreResult<Vec<Conversation>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let mut conversations: Vec<Conversation> = state
            .conversations
            .values()
            .filter(|c| c.is_participant(user_id))
            .cloned()
            .collect();
        sort_inbox(&mut conversations);
        Ok(conversations)
    }

    async fn create_message(&self, message: &Message) -> CoreResult<Uuid> {
        self.ensure_available()?;
        let mut state = self.state.write().await;

        let conversation = state
            .conversations
            .get_mut(&message.conversation_id)
            .ok_or_else(|| CoreError::NotFound(format!("conversation {}", message.conversation_id)))?;
        conversation.last_message_at = Some(message.created_at);

        state
            .messages
            .entry(message.conversation_id)
            .or_default()
            .push(message.clone());
        Ok(message.id)
    }

    async fn list_messages(&self, conversation_id: Uuid) -> CoreResult<Vec<Message>> {
        self.ensure_available()?;
        let mut messages = self
            .state
            .read()
            .await
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default();
        sort_messages(&mut messages);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evently_catalog::{DateConfiguration, EventDraft, EventKind};
    use evently_order::BookingRequest;
    use evently_shared::Masked;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seeded() -> (MemoryStore, Company, Event) {
        let store = MemoryStore::new();
        let company = Company::new("Bay Tours".to_string(), "owner-1".to_string());
        store.create_company(&company).await.unwrap();

        let event = Event::from_draft(
            company.id,
            EventDraft {
                kind: EventKind::Experience,
                title: "Kayak".to_string(),
                description: String::new(),
                location: String::new(),
                price: 1000,
                currency: "USD".to_string(),
                category: None,
                max_attendees: 4,
                tags: vec![],
                image_url: None,
                start_time: None,
                date_configuration: DateConfiguration::Range {
                    start: date(2025, 6, 1),
                    end: date(2025, 6, 5),
                },
                seat_tiers: vec![],
            },
        );
        store.create_event(&event, None).await.unwrap();
        (store, company, event)
    }

    fn booking(event: &Event, user: &str) -> Booking {
        Booking::quote(
            event,
            user,
            BookingRequest {
                date: date(2025, 6, 2),
                time: None,
                attendees: 2,
                tier: None,
                name: "Sam".to_string(),
                email: Masked::new("sam@example.com".to_string()),
                phone: None,
                notes: None,
            },
            date(2025, 5, 1),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_event_count_follows_inserts_and_deletes() {
        let (store, company, event) = seeded().await;
        assert_eq!(store.get_company(company.id).await.unwrap().unwrap().event_count, 1);

        assert!(store.delete_event(event.id).await.unwrap());
        assert!(!store.delete_event(event.id).await.unwrap());
        assert_eq!(store.get_company(company.id).await.unwrap().unwrap().event_count, 0);
    }

    #[tokio::test]
    async fn test_guarded_create_refuses_overlap() {
        let (store, company, event) = seeded().await;
        let mut clash = event.clone();
        clash.id = Uuid::new_v4();
        clash.company_id = company.id;

        let guard = ConflictGuard::for_event(&clash, None, date(2025, 5, 1));
        let err = store.create_event(&clash, guard.as_ref()).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(ref r) if r.conflicting_dates.len() == 5));
        assert_eq!(store.list_events_by_company(company.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_confirm_marks_slot_and_blocks_second_confirm() {
        let (store, company, event) = seeded().await;
        let first = booking(&event, "user-1");
        let second = booking(&event, "user-2");
        store.create_booking(&first).await.unwrap();
        store.create_booking(&second).await.unwrap();

        store
            .update_booking_status(first.id, BookingStatus::Pending, BookingStatus::Confirmed)
            .await
            .unwrap();
        let record = store
            .get_booking_status_record(company.id, event.id)
            .await
            .unwrap()
            .unwrap();
        assert!(record.is_booked(date(2025, 6, 2)));

        let err = store
            .update_booking_status(second.id, BookingStatus::Pending, BookingStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::SlotTaken(_)));
        let second_now = store.get_booking(second.id).await.unwrap().unwrap();
        assert_eq!(second_now.status, BookingStatus::Pending);

        store
            .update_booking_status(first.id, BookingStatus::Confirmed, BookingStatus::Cancelled)
            .await
            .unwrap();
        let record = store
            .get_booking_status_record(company.id, event.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!record.is_booked(date(2025, 6, 2)));
    }

    #[tokio::test]
    async fn test_stale_status_update_rejected() {
        let (store, _company, event) = seeded().await;
        let b = booking(&event, "user-1");
        store.create_booking(&b).await.unwrap();
        store
            .update_booking_status(b.id, BookingStatus::Pending, BookingStatus::Cancelled)
            .await
            .unwrap();

        let err = store
            .update_booking_status(b.id, BookingStatus::Pending, BookingStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::StaleWrite(_)));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let (store, company, _event) = seeded().await;
        store.set_available(false);
        assert!(matches!(
            store.list_events_by_company(company.id).await,
            Err(CoreError::Connectivity(_))
        ));
    }

    #[tokio::test]
    async fn test_one_conversation_per_booking() {
        let (store, _company, event) = seeded().await;
        let first = booking(&event, "user-1");
        store.create_booking(&first).await.unwrap();

        let a = Conversation::for_booking(&first, "owner-1", "A".to_string());
        let b = Conversation::for_booking(&first, "owner-1", "B".to_string());
        let stored_a = store.create_conversation(&a).await.unwrap();
        let stored_b = store.create_conversation(&b).await.unwrap();
        assert_eq!(stored_a.id, a.id);
        assert_eq!(stored_b.id, a.id);
        assert!(store.get_conversation(b.id).await.unwrap().is_none());
        assert_eq!(store.list_conversations_for_user("user-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_messages_listed_oldest_first() {
        let store = MemoryStore::new();
        let conversation = Conversation::inquiry(Uuid::new_v4(), "owner-1", "user-1", "Hi".to_string());
        store.create_conversation(&conversation).await.unwrap();

        let first = Message::compose(&conversation, "user-1", "first", 100).unwrap();
        let second = Message::compose(&conversation, "owner-1", "second", 100).unwrap();
        store.create_message(&second).await.unwrap();
        store.create_message(&first).await.unwrap();

        let listed = store.list_messages(conversation.id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].created_at <= listed[1].created_at);

        let inbox = store.list_conversations_for_user("owner-1").await.unwrap();
        assert!(inbox[0].last_message_at.is_some());
    }
}

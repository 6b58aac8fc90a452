use chrono::Utc;
use evently_order::{Conversation, Message};
use evently_shared::models::MessageCreatedEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::publisher::{emit, EventPublisher};
use crate::repository::DocumentStore;
use crate::session::AuthSession;
use crate::{CoreError, CoreResult};

const LIVE_CHANNEL_CAPACITY: usize = 256;

/// Conversations between a company owner and a customer.
///
/// Stored messages are the source of truth. The broadcast channel only feeds
/// live subscribers and drops messages for receivers that fall behind.
pub struct MessagingService {
    store: Arc<dyn DocumentStore>,
    publisher: Arc<dyn EventPublisher>,
    live_tx: broadcast::Sender<Message>,
    max_message_length: usize,
}

impl MessagingService {
    pub fn new(store: Arc<dyn DocumentStore>, publisher: Arc<dyn EventPublisher>, max_message_length: usize) -> Self {
        let (live_tx, _) = broadcast::channel(LIVE_CHANNEL_CAPACITY);
        Self {
            store,
            publisher,
            live_tx,
            max_message_length,
        }
    }

    /// Returns the booking's conversation, creating it on first use.
    pub async fn open_for_booking(&self, session: &AuthSession, booking_id: Uuid) -> CoreResult<Conversation> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", booking_id)))?;
        let company = self
            .store
            .get_company(booking.company_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("company {}", booking.company_id)))?;

        if !booking.is_customer(&session.user_id) && !session.can_manage(&company) {
            return Err(CoreError::Forbidden(format!("booking {}", booking_id)));
        }

        if let Some(existing) = self.store.find_conversation_by_booking(booking_id).await? {
            return Ok(existing);
        }

        let event_title = self
            .store
            .get_event(booking.event_id)
            .await?
            .map(|e| e.title)
            .unwrap_or_else(|| "booking".to_string());
        let subject = format!("{} on {}", event_title, booking.date);

        let candidate = Conversation::for_booking(&booking, &company.owner_user_id, subject);
        let conversation = self.store.create_conversation(&candidate).await?;
        if conversation.id == candidate.id {
            info!(conversation_id = %conversation.id, %booking_id, "Conversation opened");
        }
        Ok(conversation)
    }

    /// Pre-booking question from a customer to a company.
    pub async fn open_inquiry(&self, session: &AuthSession, company_id: Uuid, subject: &str) -> CoreResult<Conversation> {
        let company = self
            .store
            .get_company(company_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("company {}", company_id)))?;

        if company.is_owned_by(&session.user_id) {
            return Err(CoreError::validation("company_id", "cannot open an inquiry with your own company"));
        }
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(CoreError::validation("subject", "must not be empty"));
        }

        let conversation = Conversation::inquiry(company_id, &company.owner_user_id, &session.user_id, subject.to_string());
        let conversation = self.store.create_conversation(&conversation).await?;
        info!(conversation_id = %conversation.id, %company_id, "Inquiry opened");
        Ok(conversation)
    }

    pub async fn post_message(&self, session: &AuthSession, conversation_id: Uuid, body: &str) -> CoreResult<Message> {
        let conversation = self.load(conversation_id).await?;
        let message = Message::compose(&conversation, &session.user_id, body, self.max_message_length)?;

        self.store.create_message(&message).await?;
        debug!(message_id = %message.id, %conversation_id, "Message stored");

        // No receivers is fine; nobody is watching this conversation.
        let _ = self.live_tx.send(message.clone());

        emit(
            self.publisher.as_ref(),
            &MessageCreatedEvent {
                message_id: message.id,
                conversation_id,
                sender_id: message.sender_id.clone(),
                timestamp: Utc::now().timestamp(),
            },
        )
        .await;

        Ok(message)
    }

    pub async fn list_messages(&self, session: &AuthSession, conversation_id: Uuid) -> CoreResult<Vec<Message>> {
        self.authorize(session, conversation_id).await?;
        self.store.list_messages(conversation_id).await
    }

    pub async fn list_conversations(&self, session: &AuthSession) -> CoreResult<Vec<Conversation>> {
        self.store.list_conversations_for_user(&session.user_id).await
    }

    /// Receiver of every new message; callers filter by conversation id.
    pub async fn subscribe(
        &self,
        session: &AuthSession,
        conversation_id: Uuid,
    ) -> CoreResult<broadcast::Receiver<Message>> {
        self.authorize(session, conversation_id).await?;
        Ok(self.live_tx.subscribe())
    }

    async fn load(&self, conversation_id: Uuid) -> CoreResult<Conversation> {
        self.store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("conversation {}", conversation_id)))
    }

    async fn authorize(&self, session: &AuthSession, conversation_id: Uuid) -> CoreResult<Conversation> {
        let conversation = self.load(conversation_id).await?;
        if conversation.is_participant(&session.user_id) || session.is_admin() {
            Ok(conversation)
        } else {
            Err(CoreError::Forbidden(format!("conversation {}", conversation_id)))
        }
    }
}

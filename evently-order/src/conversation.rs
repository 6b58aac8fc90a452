use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::Booking;

/// Thread between a company owner and a customer, bound to a booking or,
/// for pre-booking inquiries, to the company alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub company_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub owner_id: String,
    pub customer_id: String,
    pub subject: String,
    pub created_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn for_booking(booking: &Booking, owner_id: &str, subject: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id: booking.company_id,
            booking_id: Some(booking.id),
            owner_id: owner_id.to_string(),
            customer_id: booking.customer.user_id.clone(),
            subject,
            created_at: Utc::now(),
            last_message_at: None,
        }
    }

    pub fn inquiry(company_id: Uuid, owner_id: &str, customer_id: &str, subject: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            booking_id: None,
            owner_id: owner_id.to_string(),
            customer_id: customer_id.to_string(),
            subject,
            created_at: Utc::now(),
            last_message_at: None,
        }
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.owner_id == user_id || self.customer_id == user_id
    }

    /// Most recent activity, used to order a user's inbox.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_message_at.unwrap_or(self.created_at)
    }
}

/// Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn compose(
        conversation: &Conversation,
        sender_id: &str,
        body: &str,
        max_len: usize,
    ) -> Result<Message, ConversationError> {
        if !conversation.is_participant(sender_id) {
            return Err(ConversationError::NotParticipant(sender_id.to_string()));
        }

        let body = body.trim();
        if body.is_empty() {
            return Err(ConversationError::EmptyBody);
        }
        let len = body.chars().count();
        if len > max_len {
            return Err(ConversationError::BodyTooLong { len, max: max_len });
        }

        Ok(Message {
            id: Uuid::new_v4(),
            conversation_id: conversation.id,
            sender_id: sender_id.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
        })
    }
}

/// Oldest first; the id breaks ties between messages sharing a timestamp.
pub fn sort_messages(messages: &mut [Message]) {
    messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

/// Newest activity first.
pub fn sort_inbox(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()).then(a.id.cmp(&b.id)));
}

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("{0} is not a participant of this conversation")]
    NotParticipant(String),

    #[error("Message body must not be empty")]
    EmptyBody,

    #[error("Message body is {len} characters, at most {max} allowed")]
    BodyTooLong { len: usize, max: usize },
}

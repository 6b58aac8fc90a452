pub mod booking;
pub mod conversation;

pub use booking::{Booking, BookingError, BookingRequest, BookingStatus, Customer, PaymentStatus};
pub use conversation::{sort_inbox, sort_messages, Conversation, ConversationError, Message};

pub mod events;

pub use events::{
    BookingCreatedEvent, BookingStatusChangedEvent, DomainEvent, EventCreatedEvent,
    MessageCreatedEvent, PaymentRecordedEvent,
};

pub mod session;
pub mod clock;
pub mod repository;
pub mod memory;
pub mod publisher;
pub mod availability;
pub mod catalog;
pub mod bookings;
pub mod messaging;
pub mod services;

use chrono::NaiveDate;
use evently_catalog::error::describe_fields;
use evently_catalog::{CatalogError, ConflictReport, FieldError};
use evently_order::{BookingError, ConversationError};

pub use services::{Limits, Services};
pub use session::{AuthSession, Role};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {}", describe_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("Date conflict with existing experiences on {} date(s)", conflict_count(.0))]
    Conflict(ConflictReport),

    #[error("{0} is already booked")]
    SlotTaken(NaiveDate),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Concurrent modification of {0}, reload and retry")]
    StaleWrite(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Authentication required: {0}")]
    Unauthorized(String),

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Store unavailable: {0}")]
    Connectivity(String),

    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

fn conflict_count(report: &ConflictReport) -> usize {
    report.conflicting_dates.len()
}

impl CoreError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        CoreError::Validation(vec![FieldError::new(field, message)])
    }

    /// Short machine-readable tag, used in API bodies and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation",
            CoreError::Conflict(_) | CoreError::SlotTaken(_) => "conflict",
            CoreError::InvalidTransition(_) => "invalid_transition",
            CoreError::StaleWrite(_) => "stale_write",
            CoreError::NotFound(_) => "not_found",
            CoreError::Unauthorized(_) => "unauthorized",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::Connectivity(_) => "connectivity",
            CoreError::InternalError(_) => "internal",
        }
    }
}

impl From<CatalogError> for CoreError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(fields) => CoreError::Validation(fields),
            CatalogError::InvalidWindow(window) => CoreError::validation("month", format!("invalid month {}", window)),
        }
    }
}

impl From<BookingError> for CoreError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Validation(fields) => CoreError::Validation(fields),
            BookingError::DateNotOffered(date) => {
                CoreError::validation("date", format!("event is not offered on {}", date))
            }
            other @ (BookingError::InvalidTransition { .. } | BookingError::InvalidPaymentTransition { .. }) => {
                CoreError::InvalidTransition(other.to_string())
            }
        }
    }
}

impl From<ConversationError> for CoreError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::NotParticipant(_) => CoreError::Forbidden(err.to_string()),
            ConversationError::EmptyBody | ConversationError::BodyTooLong { .. } => {
                CoreError::validation("body", err.to_string())
            }
        }
    }
}

use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::{error::AppError, state::AppState};

pub struct Metrics {
    pub registry: Registry,
    pub bookings_created_total: IntCounter,
    pub booking_transitions_total: IntCounterVec,
    pub conflicts_refused_total: IntCounter,
    pub messages_posted_total: IntCounter,
    pub rate_limited_total: IntCounter,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let bookings_created_total = IntCounter::new("evently_bookings_created_total", "Bookings created")?;
        let booking_transitions_total = IntCounterVec::new(
            Opts::new("evently_booking_transitions_total", "Booking status transitions"),
            &["to"],
        )?;
        let conflicts_refused_total = IntCounter::new(
            "evently_conflicts_refused_total",
            "Event or booking writes refused because of a date conflict",
        )?;
        let messages_posted_total = IntCounter::new("evently_messages_posted_total", "Messages posted")?;
        let rate_limited_total = IntCounter::new("evently_rate_limited_total", "Requests rejected by the rate limiter")?;

        registry.register(Box::new(bookings_created_total.clone()))?;
        registry.register(Box::new(booking_transitions_total.clone()))?;
        registry.register(Box::new(conflicts_refused_total.clone()))?;
        registry.register(Box::new(messages_posted_total.clone()))?;
        registry.register(Box::new(rate_limited_total.clone()))?;

        Ok(Self {
            registry,
            bookings_created_total,
            booking_transitions_total,
            conflicts_refused_total,
            messages_posted_total,
            rate_limited_total,
        })
    }

    /// Count refused writes before the error goes back to the caller.
    pub fn observe_refusal(&self, err: &evently_core::CoreError) {
        if matches!(
            err,
            evently_core::CoreError::Conflict(_) | evently_core::CoreError::SlotTaken(_)
        ) {
            self.conflicts_refused_total.inc();
        }
    }
}

/// GET /metrics
pub async fn render(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&state.metrics.registry.gather(), &mut buffer)
        .map_err(anyhow::Error::from)?;

    Ok(([(header::CONTENT_TYPE, encoder.format_type().to_string())], buffer))
}

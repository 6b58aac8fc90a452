use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use evently_order::{Booking, PaymentStatus};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

pub const SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub booking_id: Uuid,
    pub status: PaymentStatus,
    #[serde(default)]
    pub reference: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments", post(handle_payment_webhook))
}

/// POST /v1/webhooks/payments
/// Payment provider callback, authenticated by a shared secret header.
/// Re-delivery of the status already recorded is accepted.
async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PaymentWebhook>,
) -> Result<Json<Booking>, AppError> {
    let presented = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if !secret_matches(presented, &state.auth.webhook_secret) {
        tracing::warn!(booking_id = %payload.booking_id, "Rejected payment webhook with bad secret");
        return Err(AppError::Unauthorized("Invalid webhook secret".to_string()));
    }

    tracing::info!(
        booking_id = %payload.booking_id,
        status = %payload.status,
        "Received payment webhook"
    );

    let booking = state
        .services
        .bookings
        .record_payment(payload.booking_id, payload.status, payload.reference)
        .await
        .inspect_err(|e| state.metrics.observe_refusal(e))?;

    Ok(Json(booking))
}

fn secret_matches(presented: Option<&str>, expected: &str) -> bool {
    match presented {
        Some(presented) if !expected.is_empty() => {
            constant_time_eq::constant_time_eq(presented.as_bytes(), expected.as_bytes())
        }
        _ => false,
    }
}

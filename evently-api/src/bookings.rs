use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use evently_order::{Booking, BookingStatus, Conversation};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::AppError, middleware::Session, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/status", post(change_status))
        .route("/v1/bookings/{id}/conversation", post(open_conversation))
        .route("/v1/me/bookings", get(my_bookings))
}

async fn get_booking(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.services.bookings.get_booking(&session, id).await?))
}

async fn my_bookings(State(state): State<AppState>, Session(session): Session) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.services.bookings.list_for_customer(&session).await?))
}

#[derive(Debug, Deserialize)]
struct StatusChangeRequest {
    status: BookingStatus,
}

/// POST /v1/bookings/{id}/status
async fn change_status(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .services
        .bookings
        .transition(&session, id, req.status)
        .await
        .inspect_err(|e| state.metrics.observe_refusal(e))?;

    state
        .metrics
        .booking_transitions_total
        .with_label_values(&[req.status.as_str()])
        .inc();
    Ok(Json(booking))
}

async fn open_conversation(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Conversation>, AppError> {
    Ok(Json(state.services.messaging.open_for_booking(&session, id).await?))
}

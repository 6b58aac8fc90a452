use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use evently_catalog::{Event, EventDraft};
use evently_order::{Booking, BookingRequest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::{error::AppError, middleware::Session, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/events/{id}", get(get_event).put(update_event).delete(delete_event))
        .route("/v1/events/{id}/dates", get(event_dates))
        .route("/v1/events/{id}/availability", get(availability))
        .route("/v1/events/{id}/bookings", post(create_booking))
}

async fn get_event(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Event>, AppError> {
    Ok(Json(state.services.catalog.get_event(id).await?))
}

async fn update_event(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<Uuid>,
    Json(draft): Json<EventDraft>,
) -> Result<Json<Event>, AppError> {
    let event = state
        .services
        .catalog
        .update_event(&session, id, draft)
        .await
        .inspect_err(|e| state.metrics.observe_refusal(e))?;
    Ok(Json(event))
}

async fn delete_event(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.services.catalog.delete_event(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct DatesResponse {
    event_id: Uuid,
    dates: BTreeSet<NaiveDate>,
}

async fn event_dates(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<DatesResponse>, AppError> {
    let dates = state.services.catalog.event_dates(id).await?;
    Ok(Json(DatesResponse { event_id: id, dates }))
}

#[derive(Debug, Deserialize)]
struct AvailabilityQuery {
    date: NaiveDate,
}

#[derive(Debug, Serialize)]
struct AvailabilityResponse {
    event_id: Uuid,
    date: NaiveDate,
    booked: bool,
}

/// GET /v1/events/{id}/availability?date=2025-06-01
async fn availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let event = state.services.catalog.get_event(id).await?;
    let booked = state
        .services
        .availability
        .is_booked(event.company_id, event.id, q.date)
        .await?;

    Ok(Json(AvailabilityResponse {
        event_id: id,
        date: q.date,
        booked,
    }))
}

async fn create_booking(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<Uuid>,
    Json(req): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state
        .services
        .bookings
        .create_booking(&session, id, req)
        .await
        .inspect_err(|e| state.metrics.observe_refusal(e))?;

    state.metrics.bookings_created_total.inc();
    Ok((StatusCode::CREATED, Json(booking)))
}

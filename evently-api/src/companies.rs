use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Datelike;
use evently_catalog::{CalendarMonth, Company, ConflictingEvent, DateConfiguration, Event, EventDraft};
use evently_core::catalog::NewCompany;
use evently_order::{Booking, Conversation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, middleware::Session, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/companies", post(create_company))
        .route("/v1/companies/{id}", get(get_company))
        .route("/v1/companies/{id}/events", get(list_events).post(create_event))
        .route("/v1/companies/{id}/conflicts", post(preview_conflicts))
        .route("/v1/companies/{id}/calendar", get(calendar))
        .route("/v1/companies/{id}/bookings", get(company_bookings))
        .route("/v1/companies/{id}/conversations", post(open_inquiry))
        .route("/v1/me/companies", get(my_companies))
}

async fn create_company(
    State(state): State<AppState>,
    Session(session): Session,
    Json(req): Json<NewCompany>,
) -> Result<(StatusCode, Json<Company>), AppError> {
    let company = state.services.catalog.create_company(&session, req).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

async fn get_company(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Company>, AppError> {
    Ok(Json(state.services.catalog.get_company(id).await?))
}

async fn my_companies(State(state): State<AppState>, Session(session): Session) -> Result<Json<Vec<Company>>, AppError> {
    Ok(Json(state.services.catalog.my_companies(&session).await?))
}

async fn list_events(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Vec<Event>>, AppError> {
    Ok(Json(state.services.catalog.list_events(id).await?))
}

async fn create_event(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<Uuid>,
    Json(draft): Json<EventDraft>,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let event = state
        .services
        .catalog
        .create_event(&session, id, draft)
        .await
        .inspect_err(|e| state.metrics.observe_refusal(e))?;
    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Debug, Deserialize)]
struct ConflictPreviewRequest {
    date_configuration: DateConfiguration,
    #[serde(default)]
    exclude_event_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct ConflictPreviewResponse {
    has_conflict: bool,
    conflicting_dates: Vec<chrono::NaiveDate>,
    conflicts_with: Vec<ConflictingEvent>,
    /// First dates to show in a form, capped by `limits.conflict_preview_limit`.
    preview: Vec<chrono::NaiveDate>,
    more: usize,
}

/// POST /v1/companies/{id}/conflicts
/// Dry run of the check the event write performs, for edit forms.
async fn preview_conflicts(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<Uuid>,
    Json(req): Json<ConflictPreviewRequest>,
) -> Result<Json<ConflictPreviewResponse>, AppError> {
    let company = state.services.catalog.get_company(id).await?;
    session.require_manage(&company)?;

    let report = state
        .services
        .availability
        .preview_conflicts(id, &req.date_configuration, req.exclude_event_id)
        .await?;

    let (shown, more) = report.preview(state.services.limits.conflict_preview_limit);
    let preview = shown.to_vec();
    Ok(Json(ConflictPreviewResponse {
        has_conflict: report.has_conflict,
        conflicting_dates: report.conflicting_dates,
        conflicts_with: report.conflicts_with,
        preview,
        more,
    }))
}

#[derive(Debug, Deserialize)]
struct CalendarQuery {
    year: Option<i32>,
    month: Option<u32>,
}

/// GET /v1/companies/{id}/calendar?year=2025&month=6
/// Defaults to the current month.
async fn calendar(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<CalendarQuery>,
) -> Result<Json<CalendarMonth>, AppError> {
    let today = state.services.availability.today();
    let year = q.year.unwrap_or(today.year());
    let month = q.month.unwrap_or(today.month());

    Ok(Json(state.services.availability.calendar(id, year, month).await?))
}

async fn company_bookings(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.services.bookings.list_for_company(&session, id).await?))
}

#[derive(Debug, Deserialize)]
struct InquiryRequest {
    subject: String,
}

async fn open_inquiry(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<Uuid>,
    Json(req): Json<InquiryRequest>,
) -> Result<(StatusCode, Json<Conversation>), AppError> {
    let conversation = state.services.messaging.open_inquiry(&session, id, &req.subject).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

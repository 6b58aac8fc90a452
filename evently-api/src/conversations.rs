use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use evently_order::{Conversation, Message};
use futures_util::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::{error::AppError, middleware::Session, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/me/conversations", get(my_conversations))
        .route("/v1/conversations/{id}/messages", get(list_messages).post(post_message))
        .route("/v1/conversations/{id}/stream", get(stream))
}

async fn my_conversations(
    State(state): State<AppState>,
    Session(session): Session,
) -> Result<Json<Vec<Conversation>>, AppError> {
    Ok(Json(state.services.messaging.list_conversations(&session).await?))
}

async fn list_messages(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, AppError> {
    Ok(Json(state.services.messaging.list_messages(&session, id).await?))
}

#[derive(Debug, Deserialize)]
struct PostMessageRequest {
    body: String,
}

async fn post_message(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<Uuid>,
    Json(req): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let message = state.services.messaging.post_message(&session, id, &req.body).await?;
    state.metrics.messages_posted_total.inc();
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /v1/conversations/{id}/stream
/// Server-sent `message` events for one conversation. Best effort: a client
/// that lags behind skips messages and should re-list.
async fn stream(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let rx = state.services.messaging.subscribe(&session, id).await?;

    let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(message) if message.conversation_id == id => {
            Event::default().event("message").json_data(&message).ok().map(Ok)
        }
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(conversation_id = %id, "Live stream lagged: {}", e);
            None
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

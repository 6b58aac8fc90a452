use axum::{extract::State, routing::post, Json, Router};
use evently_core::Role;
use serde::Serialize;
use uuid::Uuid;

use crate::{error::AppError, middleware::issue_token, state::AppState};

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    user_id: String,
    expires_in: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/guest", post(login_guest))
}

/// POST /v1/auth/guest
/// Short-lived customer identity for browsing and booking without an account.
async fn login_guest(State(state): State<AppState>) -> Result<Json<AuthResponse>, AppError> {
    let user_id = format!("guest-{}", Uuid::new_v4());
    let token = issue_token(&state.auth, &user_id, None, Role::Customer)?;

    tracing::debug!(%user_id, "Issued guest token");
    Ok(Json(AuthResponse {
        token,
        user_id,
        expires_in: state.auth.expiration,
    }))
}

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use evently_core::{AuthSession, Role};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, state::{AppState, AuthConfig}};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: Option<String>,
    pub role: Role,
    pub exp: usize,
}

impl Claims {
    pub fn into_session(self) -> AuthSession {
        AuthSession {
            user_id: self.sub,
            email: self.email,
            role: self.role,
        }
    }
}

pub fn issue_token(auth: &AuthConfig, user_id: &str, email: Option<String>, role: Role) -> Result<String, AppError> {
    let claims = Claims {
        sub: user_id.to_string(),
        email,
        role,
        exp: (chrono::Utc::now() + chrono::Duration::seconds(auth.expiration as i64)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::Anyhow(anyhow::anyhow!("Token encoding failed: {}", e)))
}

pub fn verify_token(auth: &AuthConfig, token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

/// Verifies a bearer token when one is sent and stores the caller's
/// `AuthSession` in the request extensions. Requests without a token pass
/// through anonymous; a bad token is rejected outright.
pub async fn session_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(TypedHeader(Authorization(bearer))) = bearer {
        let claims = verify_token(&state.auth, bearer.token())?;
        req.extensions_mut().insert(claims.into_session());
    }

    Ok(next.run(req).await)
}

/// Handler argument for routes that need an identified caller.
pub struct Session(pub AuthSession);

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthSession>()
            .cloned()
            .map(Session)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> AuthConfig {
        AuthConfig {
            secret: "test-secret".to_string(),
            expiration: 60,
            webhook_secret: "hook".to_string(),
        }
    }

    #[test]
    fn test_token_round_trips_into_session() {
        let token = issue_token(&auth(), "owner-1", Some("o@example.com".into()), Role::Operator).unwrap();
        let session = verify_token(&auth(), &token).unwrap().into_session();
        assert_eq!(session.user_id, "owner-1");
        assert_eq!(session.role, Role::Operator);
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let mut other = auth();
        other.secret = "someone-else".to_string();
        let token = issue_token(&other, "owner-1", None, Role::Admin).unwrap();
        assert!(matches!(verify_token(&auth(), &token), Err(AppError::Unauthorized(_))));
    }
}

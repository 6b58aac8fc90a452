use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use evently_core::CoreError;
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, Value) {
        match self {
            AppError::Core(err) => {
                let status = match err {
                    CoreError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    CoreError::Conflict(_)
                    | CoreError::SlotTaken(_)
                    | CoreError::InvalidTransition(_)
                    | CoreError::StaleWrite(_) => StatusCode::CONFLICT,
                    CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                    CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                    CoreError::Connectivity(_) => StatusCode::SERVICE_UNAVAILABLE,
                    CoreError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let details = match err {
                    CoreError::Validation(fields) => json!({ "fields": fields }),
                    CoreError::Conflict(report) => json!({
                        "conflicting_dates": report.conflicting_dates,
                        "conflicts_with": report.conflicts_with,
                    }),
                    CoreError::SlotTaken(date) => json!({ "date": date }),
                    _ => json!({}),
                };
                (status, err.kind(), details)
            }
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", json!({})),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized", json!({})),
            AppError::Anyhow(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", json!({})),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, details) = self.parts();

        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!("Internal Server Error: {}", self);
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        let mut body = json!({
            "error": message,
            "kind": kind,
        });
        if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), details) {
            body.extend(extra);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use evently_catalog::ConflictReport;

    #[test]
    fn test_status_codes_follow_error_kind() {
        let cases = [
            (CoreError::validation("title", "required"), StatusCode::UNPROCESSABLE_ENTITY),
            (CoreError::NotFound("event".into()), StatusCode::NOT_FOUND),
            (CoreError::Forbidden("company".into()), StatusCode::FORBIDDEN),
            (CoreError::InvalidTransition("pending → completed".into()), StatusCode::CONFLICT),
            (CoreError::Connectivity("down".into()), StatusCode::SERVICE_UNAVAILABLE),
            (CoreError::InternalError("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).into_response().status(), expected);
        }
    }

    #[test]
    fn test_conflict_body_lists_every_date() {
        let dates: Vec<NaiveDate> = (1..=7).map(|d| NaiveDate::from_ymd_opt(2025, 6, d).unwrap()).collect();
        let report = ConflictReport {
            has_conflict: true,
            conflicting_dates: dates.clone(),
            conflicts_with: vec![],
        };
        let (status, kind, details) = AppError::from(CoreError::Conflict(report)).parts();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(kind, "conflict");
        assert_eq!(details["conflicting_dates"].as_array().unwrap().len(), 7);
    }
}

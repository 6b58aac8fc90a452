use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use evently_api::{
    app,
    metrics::Metrics,
    middleware::issue_token,
    state::{AppState, AuthConfig},
};
use evently_core::clock::FixedClock;
use evently_core::memory::MemoryStore;
use evently_core::publisher::LogPublisher;
use evently_core::{Limits, Role, Services};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const WEBHOOK_SECRET: &str = "hook-secret";

fn auth_config() -> AuthConfig {
    AuthConfig {
        secret: "test-secret".to_string(),
        expiration: 300,
        webhook_secret: WEBHOOK_SECRET.to_string(),
    }
}

fn test_app() -> Router {
    let services = Services::new(
        Arc::new(MemoryStore::new()),
        Arc::new(LogPublisher),
        Arc::new(FixedClock(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap())),
        Limits::default(),
    );

    app(AppState {
        services: Arc::new(services),
        redis: None,
        auth: auth_config(),
        metrics: Arc::new(Metrics::new().unwrap()),
        rate_limit_per_minute: 100,
    })
}

fn token(user_id: &str, role: Role) -> String {
    issue_token(&auth_config(), user_id, None, role).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn experience(title: &str, date_configuration: Value) -> Value {
    json!({
        "kind": "experience",
        "title": title,
        "price": 2500,
        "currency": "USD",
        "max_attendees": 8,
        "date_configuration": date_configuration,
    })
}

async fn create_company(app: &Router, owner: &str) -> String {
    let (status, body) = send(app, "POST", "/v1/companies", Some(owner), Some(json!({ "name": "Trails" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn create_event(app: &Router, owner: &str, company_id: &str, payload: Value) -> (StatusCode, Value) {
    send(app, "POST", &format!("/v1/companies/{}/events", company_id), Some(owner), Some(payload)).await
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_writes_require_a_valid_token() {
    let app = test_app();

    let (status, body) = send(&app, "POST", "/v1/companies", None, Some(json!({ "name": "X" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthorized");

    let (status, _) = send(&app, "POST", "/v1/companies", Some("not-a-jwt"), Some(json!({ "name": "X" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let customer = token("user-1", Role::Customer);
    let (status, _) = send(&app, "POST", "/v1/companies", Some(&customer), Some(json!({ "name": "X" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_overlapping_experience_is_refused_with_dates() {
    let app = test_app();
    let owner = token("owner-1", Role::Operator);
    let company_id = create_company(&app, &owner).await;

    let (status, _) = create_event(
        &app,
        &owner,
        &company_id,
        experience("A", json!({ "type": "selected", "dates": ["2025-06-01", "2025-06-02"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let b_dates = json!({ "type": "range", "start": "2025-06-02", "end": "2025-06-03" });

    let (status, preview) = send(
        &app,
        "POST",
        &format!("/v1/companies/{}/conflicts", company_id),
        Some(&owner),
        Some(json!({ "date_configuration": b_dates })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["has_conflict"], true);
    assert_eq!(preview["preview"], json!(["2025-06-02"]));

    let (status, body) = create_event(&app, &owner, &company_id, experience("B", b_dates)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");
    assert_eq!(body["conflicting_dates"], json!(["2025-06-02"]));

    let (_, company) = send(&app, "GET", &format!("/v1/companies/{}", company_id), None, None).await;
    assert_eq!(company["event_count"], 1);
}

#[tokio::test]
async fn test_invalid_event_reports_fields() {
    let app = test_app();
    let owner = token("owner-1", Role::Operator);
    let company_id = create_company(&app, &owner).await;

    let mut payload = experience("", json!({ "type": "monthly", "day": 0 }));
    payload["currency"] = json!("dollars");

    let (status, body) = create_event(&app, &owner, &company_id, payload).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"title"));
    assert!(fields.contains(&"currency"));
}

#[tokio::test]
async fn test_booking_lifecycle_and_availability() {
    let app = test_app();
    let owner = token("owner-1", Role::Operator);
    let company_id = create_company(&app, &owner).await;
    let (_, event) = create_event(
        &app,
        &owner,
        &company_id,
        experience("Canyon Hike", json!({ "type": "range", "start": "2025-06-10", "end": "2025-06-20" })),
    )
    .await;
    let event_id = event["id"].as_str().unwrap().to_string();

    let (status, guest) = send(&app, "POST", "/v1/auth/guest", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let customer = guest["token"].as_str().unwrap().to_string();

    let request = json!({
        "date": "2025-06-12",
        "attendees": 3,
        "name": "Sam",
        "email": "sam@example.com",
    });
    let (status, booking) = send(
        &app,
        "POST",
        &format!("/v1/events/{}/bookings", event_id),
        Some(&customer),
        Some(request.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "pending");
    assert_eq!(booking["total_amount"], 7500);
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/v1/bookings/{}/status", booking_id),
        Some(&owner),
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "invalid_transition");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/v1/bookings/{}/status", booking_id),
        Some(&owner),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");

    let (_, availability) = send(
        &app,
        "GET",
        &format!("/v1/events/{}/availability?date=2025-06-12", event_id),
        None,
        None,
    )
    .await;
    assert_eq!(availability["booked"], true);

    let (_, availability) = send(
        &app,
        "GET",
        &format!("/v1/events/{}/availability?date=2025-06-13", event_id),
        None,
        None,
    )
    .await;
    assert_eq!(availability["booked"], false);

    let other = token("user-2", Role::Customer);
    let (status, body) = send(
        &app,
        "POST",
        &format!("/v1/events/{}/bookings", event_id),
        Some(&other),
        Some(request),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["date"], "2025-06-12");

    let (status, calendar) = send(
        &app,
        "GET",
        &format!("/v1/companies/{}/calendar?year=2025&month=6", company_id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(calendar["days"].as_object().unwrap().len(), 11);
    assert_eq!(calendar["days"]["2025-06-12"][0]["status"], "booked");

    let (_, mine) = send(&app, "GET", "/v1/me/bookings", Some(&customer), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_payment_webhook_requires_secret() {
    let app = test_app();
    let owner = token("owner-1", Role::Operator);
    let company_id = create_company(&app, &owner).await;
    let (_, event) = create_event(
        &app,
        &owner,
        &company_id,
        experience("Kayak", json!({ "type": "selected", "dates": ["2025-07-01"] })),
    )
    .await;

    let customer = token("user-1", Role::Customer);
    let (_, booking) = send(
        &app,
        "POST",
        &format!("/v1/events/{}/bookings", event["id"].as_str().unwrap()),
        Some(&customer),
        Some(json!({ "date": "2025-07-01", "attendees": 1, "name": "Jo", "email": "jo@example.com" })),
    )
    .await;
    let payload = json!({ "booking_id": booking["id"], "status": "paid", "reference": "pi_1" });

    let (status, _) = send(&app, "POST", "/v1/webhooks/payments", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/v1/webhooks/payments")
        .header("Content-Type", "application/json")
        .header("x-webhook-secret", WEBHOOK_SECRET)
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let paid: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(paid["payment_status"], "paid");
    assert_eq!(paid["payment_reference"], "pi_1");
}

#[tokio::test]
async fn test_conversation_between_owner_and_customer() {
    let app = test_app();
    let owner = token("owner-1", Role::Operator);
    let company_id = create_company(&app, &owner).await;
    let (_, event) = create_event(
        &app,
        &owner,
        &company_id,
        experience("Wine Walk", json!({ "type": "selected", "dates": ["2025-08-02"] })),
    )
    .await;

    let customer = token("user-1", Role::Customer);
    let (_, booking) = send(
        &app,
        "POST",
        &format!("/v1/events/{}/bookings", event["id"].as_str().unwrap()),
        Some(&customer),
        Some(json!({ "date": "2025-08-02", "attendees": 2, "name": "Ana", "email": "ana@example.com" })),
    )
    .await;

    let (status, conversation) = send(
        &app,
        "POST",
        &format!("/v1/bookings/{}/conversation", booking["id"].as_str().unwrap()),
        Some(&customer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let messages_uri = format!("/v1/conversations/{}/messages", conversation["id"].as_str().unwrap());

    let (status, _) = send(&app, "POST", &messages_uri, Some(&customer), Some(json!({ "body": "Dog friendly?" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, "POST", &messages_uri, Some(&owner), Some(json!({ "body": "Of course" }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, "POST", &messages_uri, Some(&owner), Some(json!({ "body": "   " }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let stranger = token("user-9", Role::Customer);
    let (status, _) = send(&app, "GET", &messages_uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, messages) = send(&app, "GET", &messages_uri, Some(&owner), None).await;
    let bodies: Vec<&str> = messages
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["body"].as_str().unwrap())
        .collect();
    assert_eq!(bodies, vec!["Dog friendly?", "Of course"]);

    let (_, inbox) = send(&app, "GET", "/v1/me/conversations", Some(&owner), None).await;
    assert_eq!(inbox.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_metrics_exposed() {
    let app = test_app();
    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("evently_bookings_created_total"));
}

//! Common test utilities for integration tests.
//!
//! The router is wired to the in-memory admission store, so these tests run
//! without a database. Callers authenticate with freshly signed Telegram
//! `initData`.

// Helpers are shared across test binaries; not every binary uses all of them.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use chrono::Utc;
use domain::store::{AdmissionStore, InMemoryAdmissionStore};
use fake::faker::name::en::FirstName;
use fake::Fake;
use event_rsvp_api::{app::create_app, config::Config};
use serde_json::{json, Value};
use shared::telegram::sign_init_data;
use tower::ServiceExt;

pub const BOT_TOKEN: &str = "123456:TEST-bot-token";

/// Test configuration: memory backend, known bot token, no rate limit.
pub fn test_config() -> Config {
    test_config_with(&[])
}

pub fn test_config_with(overrides: &[(&str, &str)]) -> Config {
    let mut all = vec![
        ("telegram.bot_token", BOT_TOKEN),
        ("security.rsvp_rate_limit_per_hour", "0"),
        ("logging.format", "pretty"),
    ];
    all.extend_from_slice(overrides);
    Config::load_for_test(&all).expect("test config")
}

pub fn memory_store() -> Arc<dyn AdmissionStore> {
    Arc::new(InMemoryAdmissionStore::default())
}

/// Create a test application router over a fresh in-memory store.
pub fn create_test_app() -> Router {
    create_app(test_config(), memory_store())
}

/// `Authorization` header value for the Telegram user `user_id`.
pub fn tma_header(user_id: i64) -> String {
    let user = json!({
        "id": user_id,
        "first_name": FirstName().fake::<String>(),
        "username": format!("user{}", user_id),
        "language_code": "en",
    })
    .to_string();
    let auth_date = Utc::now().timestamp().to_string();
    let init_data = sign_init_data(
        &[
            ("auth_date", auth_date.as_str()),
            ("query_id", "AAHdF6IQAAAAAN0XohDhrOrc"),
            ("user", user.as_str()),
        ],
        BOT_TOKEN,
    )
    .expect("sign initData");
    format!("tma {}", init_data)
}

pub fn json_request(method: Method, uri: &str, body: Value, user_id: i64) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, tma_header(user_id))
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str, user_id: i64) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::AUTHORIZATION, tma_header(user_id))
        .body(Body::empty())
        .unwrap()
}

pub fn delete_request(uri: &str, user_id: i64) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header(header::AUTHORIZATION, tma_header(user_id))
        .body(Body::empty())
        .unwrap()
}

/// Helper to parse JSON response body.
pub async fn parse_response_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

/// Creates a published event hosted by `host` and returns its JSON.
pub async fn create_event(app: &Router, host: i64, capacity: Option<i32>) -> Value {
    create_event_with(app, host, json!({ "capacity": capacity })).await
}

/// Creates an event from `overrides` merged over a valid default body.
pub async fn create_event_with(app: &Router, host: i64, overrides: Value) -> Value {
    let mut body = json!({
        "title": "Rust Meetup",
        "description": "Monthly meetup",
        "location": "Bratislava",
        "start_date": (Utc::now() + chrono::Duration::days(14)).to_rfc3339(),
    });
    if let (Some(base), Some(extra)) = (body.as_object_mut(), overrides.as_object()) {
        for (key, value) in extra {
            base.insert(key.clone(), value.clone());
        }
    }

    let response = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/events", body, host))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    parse_response_body(response).await
}

/// Submits an RSVP and returns the status code with the body.
pub async fn rsvp(
    app: &Router,
    event_id: &str,
    user_id: i64,
    body: Value,
) -> (axum::http::StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/events/{}/rsvp", event_id),
            body,
            user_id,
        ))
        .await
        .unwrap();
    let status = response.status();
    (status, parse_response_body(response).await)
}

pub async fn summary(app: &Router, event_id: &str, host: i64) -> Value {
    let response = app
        .clone()
        .oneshot(get_request(&format!("/api/v1/events/{}/summary", event_id), host))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    parse_response_body(response).await
}

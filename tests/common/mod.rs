//! Test utilities and fixtures for hwlock integration tests

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;

// Re-export the main library crate
pub use hwlock::config::Config;
pub use hwlock::db::{AppState, DocumentStore, MemoryStore, SqliteStore, queries};
pub use hwlock::handlers;
pub use hwlock::models::*;
pub use hwlock::util::{MS_PER_DAY, now_ms};

pub const TEST_ADMIN_KEY: &str = "hwl_test_admin_key";

pub const ONE_DAY: i64 = MS_PER_DAY;

pub fn future_timestamp(ms: i64) -> i64 {
    now_ms() + ms
}

pub fn past_timestamp(ms: i64) -> i64 {
    now_ms() - ms
}

/// App state over a fresh in-memory store.
pub fn create_test_app_state() -> AppState {
    AppState::new(
        Arc::new(MemoryStore::new()),
        Config::with_admin_key(TEST_ADMIN_KEY),
    )
}

/// App state over a fresh in-memory SQLite database.
pub fn create_sqlite_app_state() -> AppState {
    let store = SqliteStore::open_in_memory().expect("Failed to open in-memory SQLite store");
    AppState::new(Arc::new(store), Config::with_admin_key(TEST_ADMIN_KEY))
}

/// Public routes without rate limiting (oneshot requests carry no peer address).
pub fn public_app(state: AppState) -> Router {
    handlers::public::routes().with_state(state)
}

pub fn admin_app(state: AppState) -> Router {
    handlers::admin::router(state.clone()).with_state(state)
}

pub fn full_app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::public::routes())
        .merge(handlers::admin::router(state.clone()))
        .with_state(state)
}

/// Create a license with an explicit key.
pub fn create_test_license(state: &AppState, key: &str, expiry: Option<i64>) -> License {
    queries::create_license(
        state.store.as_ref(),
        &CreateLicense {
            key: key.to_string(),
            expiry,
            created_by: "admin".to_string(),
            batch_id: None,
        },
    )
    .expect("Failed to create test license")
}

pub fn get_test_license(state: &AppState, key: &str) -> License {
    queries::get_license(state.store.as_ref(), key)
        .expect("Failed to read license")
        .expect("License should exist")
}

pub fn activity(state: &AppState) -> Vec<ActivityEntry> {
    queries::recent_activity(state.store.as_ref(), 1000).expect("Failed to read activity")
}

pub fn update_test_settings(state: &AppState, patch: UpdateSettings) -> Settings {
    queries::update_settings(state.store.as_ref(), &patch).expect("Failed to update settings")
}

/// Send a request and return status plus body text.
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

/// Send a request and parse the body as JSON.
pub async fn send_json(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let (status, body) = send(app, request).await;
    let json = serde_json::from_str(&body)
        .unwrap_or_else(|e| panic!("Body is not JSON ({}): {}", e, body));
    (status, json)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Authenticated admin request. `body` is sent as JSON when present.
pub fn admin_request(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", TEST_ADMIN_KEY));
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// GET /api/validate, returning status and outcome code.
pub async fn validate(state: &AppState, key: &str, hwid: &str) -> (StatusCode, String) {
    send(
        public_app(state.clone()),
        get(&format!("/api/validate?license={}&hwid={}", key, hwid)),
    )
    .await
}

/// GET /api/register, returning status and outcome code.
pub async fn register(state: &AppState, key: &str, hwid: &str) -> (StatusCode, String) {
    send(
        public_app(state.clone()),
        get(&format!("/api/register?license={}&hwid={}", key, hwid)),
    )
    .await
}

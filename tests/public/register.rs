//! Tests for GET /api/register

use axum::body::Body;
use axum::http::{Request, StatusCode};

#[path = "../common/mod.rs"]
mod common;
use common::*;

#[tokio::test]
async fn test_register_binds_and_records_client() {
    let state = create_test_app_state();
    create_test_license(&state, "LIC-AAAA", None);

    let request = Request::builder()
        .uri("/api/register?license=LIC-AAAA&hwid=H1")
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .header("user-agent", "client/2.1")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(public_app(state.clone()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "SUCCESS");

    let license = get_test_license(&state, "LIC-AAAA");
    assert_eq!(license.hwid, "H1");
    assert_eq!(license.activation_ip.as_deref(), Some("203.0.113.7"));
    assert_eq!(license.device_info.as_deref(), Some("client/2.1"));
    assert!(license.activated_at.is_some());
    assert_eq!(license.activated_at, license.last_validated);

    let last = license.history.last().unwrap();
    assert_eq!(last.action, HistoryAction::Register);
}

#[tokio::test]
async fn test_register_same_device_is_idempotent() {
    let state = create_test_app_state();
    create_test_license(&state, "LIC-AAAA", None);

    assert_eq!(register(&state, "LIC-AAAA", "H1").await.1, "SUCCESS");
    let first = get_test_license(&state, "LIC-AAAA");

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert_eq!(register(&state, "LIC-AAAA", "H1").await.1, "SUCCESS");
    let second = get_test_license(&state, "LIC-AAAA");

    assert!(second.activated_at > first.activated_at);
    assert!(second.last_validated > first.last_validated);
    assert_eq!(second.history.len(), first.history.len() + 1);
    assert_eq!(second.hwid, "H1");
}

#[tokio::test]
async fn test_hwid_in_use_by_another_license() {
    let state = create_test_app_state();
    create_test_license(&state, "LIC-AAAA", None);
    create_test_license(&state, "LIC-BBBB", None);

    assert_eq!(register(&state, "LIC-AAAA", "H1").await.1, "SUCCESS");
    assert_eq!(register(&state, "LIC-BBBB", "H1").await.1, "HWID_IN_USE");
    assert!(!get_test_license(&state, "LIC-BBBB").is_bound());

    // A different device is still fine for the second license
    assert_eq!(register(&state, "LIC-BBBB", "H2").await.1, "SUCCESS");
}

#[tokio::test]
async fn test_register_rejections() {
    let state = create_test_app_state();
    create_test_license(&state, "LIC-OLD", Some(past_timestamp(ONE_DAY)));
    queries::ban_hwid(state.store.as_ref(), "BAD").unwrap();

    assert_eq!(register(&state, "LIC-NOPE", "H1").await.1, "INVALID_LICENSE");
    assert_eq!(register(&state, "LIC-OLD", "H1").await.1, "EXPIRED");
    assert_eq!(register(&state, "LIC-NOPE", "BAD").await.1, "BANNED");

    let (status, body) = register(&state, "LIC-OLD", "").await;
    assert_eq!((status, body.as_str()), (StatusCode::BAD_REQUEST, "FAILED"));

    let outcomes: Vec<_> = activity(&state)
        .into_iter()
        .filter_map(|e| e.outcome)
        .collect();
    assert_eq!(outcomes, vec!["BANNED", "EXPIRED", "INVALID_LICENSE"]);
}

#[tokio::test]
async fn test_reset_allows_binding_a_new_device() {
    let state = create_test_app_state();
    create_test_license(&state, "LIC-AAAA", None);
    assert_eq!(register(&state, "LIC-AAAA", "H1").await.1, "SUCCESS");

    queries::reset_hwid(state.store.as_ref(), "LIC-AAAA", HistoryAction::ResetHwid, "admin", now_ms())
        .unwrap();

    assert_eq!(validate(&state, "LIC-AAAA", "H1").await.1, "HWID_MISMATCH");
    assert_eq!(register(&state, "LIC-AAAA", "H2").await.1, "SUCCESS");
    assert_eq!(validate(&state, "LIC-AAAA", "H2").await.1, "VALID");
}

#[tokio::test]
async fn test_concurrent_registrations_bind_hwid_once() {
    let state = create_sqlite_app_state();
    for i in 0..8 {
        create_test_license(&state, &format!("LIC-{}", i), None);
    }

    let mut handles = Vec::new();
    for i in 0..8 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            register(&state, &format!("LIC-{}", i), "SHARED").await.1
        }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    assert_eq!(outcomes.iter().filter(|o| *o == "SUCCESS").count(), 1);
    assert_eq!(outcomes.iter().filter(|o| *o == "HWID_IN_USE").count(), 7);

    let bound = queries::list_licenses(state.store.as_ref())
        .unwrap()
        .into_iter()
        .filter(|l| l.hwid == "SHARED")
        .count();
    assert_eq!(bound, 1);
}

//! Ban list endpoints

use axum::http::StatusCode;
use serde_json::json;

#[path = "../common/mod.rs"]
mod common;
use common::*;

#[tokio::test]
async fn test_ban_and_unban() {
    let state = create_test_app_state();
    create_test_license(&state, "LIC-A", None);
    register(&state, "LIC-A", "H1").await;

    let (status, json) = send_json(
        admin_app(state.clone()),
        admin_request("POST", "/admin/bans", Some(json!({ "hwid": "H1", "reason": "chargeback" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["added"], true);
    assert_eq!(validate(&state, "LIC-A", "H1").await.1, "BANNED");

    let (_, json) = send_json(admin_app(state.clone()), admin_request("GET", "/admin/bans", None)).await;
    assert_eq!(json["hwids"], json!(["H1"]));

    let (status, json) = send_json(
        admin_app(state.clone()),
        admin_request("DELETE", "/admin/bans/H1", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], true);
    assert_eq!(validate(&state, "LIC-A", "H1").await.1, "VALID");
}

#[tokio::test]
async fn test_ban_is_idempotent() {
    let state = create_test_app_state();

    for expected in [true, false] {
        let (status, json) = send_json(
            admin_app(state.clone()),
            admin_request("POST", "/admin/bans", Some(json!({ "hwid": "H1" }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["added"], expected);
    }
    assert_eq!(queries::get_banlist(state.store.as_ref()).unwrap().hwids, vec!["H1"]);

    // Only the change is audited
    let bans = activity(&state)
        .into_iter()
        .filter(|e| e.action == ActivityAction::BanHwid)
        .count();
    assert_eq!(bans, 1);
}

#[tokio::test]
async fn test_ban_rejects_blank_hwid() {
    let state = create_test_app_state();
    let (status, json) = send_json(
        admin_app(state.clone()),
        admin_request("POST", "/admin/bans", Some(json!({ "hwid": "   " }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["details"], "HWID must not be empty");
}

#[tokio::test]
async fn test_unban_absent_is_noop() {
    let state = create_test_app_state();
    let (status, json) = send_json(
        admin_app(state.clone()),
        admin_request("DELETE", "/admin/bans/NOT-THERE", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], false);
    assert!(activity(&state).is_empty());
}

#[tokio::test]
async fn test_ban_is_case_sensitive() {
    let state = create_test_app_state();
    create_test_license(&state, "LIC-A", None);
    queries::ban_hwid(state.store.as_ref(), "ABC").unwrap();

    assert_eq!(register(&state, "LIC-A", "abc").await.1, "SUCCESS");
    assert_eq!(register(&state, "LIC-A", "ABC").await.1, "BANNED");
}

//! Typed queries over the document store

use hwlock::db::collections::{BANLIST_DOC, GENERAL_DOC, LICENSES, SETTINGS};
use hwlock::db::queries::BindResult;
use hwlock::error::AppError;
use serde_json::json;

#[path = "../common/mod.rs"]
mod common;
use common::*;

fn stores() -> Vec<(&'static str, Box<dyn DocumentStore>)> {
    vec![
        ("memory", Box::new(MemoryStore::new())),
        ("sqlite", Box::new(SqliteStore::open_in_memory().unwrap())),
    ]
}

fn new_license(key: &str) -> CreateLicense {
    CreateLicense {
        key: key.into(),
        expiry: None,
        created_by: "admin".into(),
        batch_id: None,
    }
}

fn activation() -> Activation {
    Activation {
        ip: Some("203.0.113.9".into()),
        device_info: Some("client/2.1".into()),
    }
}

#[test]
fn test_create_license_records_history_and_rejects_duplicates() {
    for (name, store) in stores() {
        let store = store.as_ref();
        let created = queries::create_license(store, &new_license("LIC-1")).unwrap();
        assert!(!created.is_bound(), "{}", name);
        assert_eq!(created.history.len(), 1, "{}", name);
        assert_eq!(created.history[0].action, HistoryAction::Create, "{}", name);

        let dup = queries::create_license(store, &new_license("LIC-1"));
        assert!(matches!(dup, Err(AppError::Conflict(_))), "{}", name);
        assert_eq!(queries::list_licenses(store).unwrap().len(), 1, "{}", name);
    }
}

#[test]
fn test_bind_hwid_compare_and_swap() {
    for (name, store) in stores() {
        let store = store.as_ref();
        queries::create_license(store, &new_license("LIC-1")).unwrap();

        let stale = queries::bind_hwid(store, "LIC-1", "SOMEONE", "H1", 1_000, &activation()).unwrap();
        assert_eq!(stale, BindResult::Stale, "{}", name);
        assert!(!queries::get_license(store, "LIC-1").unwrap().unwrap().is_bound(), "{}", name);

        let bound = queries::bind_hwid(store, "LIC-1", "", "H1", 1_000, &activation()).unwrap();
        assert_eq!(bound, BindResult::Bound, "{}", name);

        let license = queries::get_license(store, "LIC-1").unwrap().unwrap();
        assert_eq!(license.hwid, "H1", "{}", name);
        assert_eq!(license.activated_at, Some(1_000), "{}", name);
        assert_eq!(license.last_validated, Some(1_000), "{}", name);
        assert_eq!(license.activation_ip.as_deref(), Some("203.0.113.9"), "{}", name);
        assert_eq!(license.history.last().unwrap().action, HistoryAction::Register, "{}", name);

        let missing = queries::bind_hwid(store, "NOPE", "", "H1", 1_000, &activation()).unwrap();
        assert_eq!(missing, BindResult::Missing, "{}", name);
    }
}

#[test]
fn test_find_license_by_hwid_excludes_self() {
    for (name, store) in stores() {
        let store = store.as_ref();
        queries::create_license(store, &new_license("LIC-1")).unwrap();
        queries::create_license(store, &new_license("LIC-2")).unwrap();
        queries::bind_hwid(store, "LIC-1", "", "H1", 1, &activation()).unwrap();

        assert_eq!(queries::find_license_by_hwid(store, "H1", "LIC-1").unwrap(), None, "{}", name);
        assert_eq!(
            queries::find_license_by_hwid(store, "H1", "LIC-2").unwrap().as_deref(),
            Some("LIC-1"),
            "{}",
            name
        );
        // Unbound licenses never match a real HWID
        assert_eq!(queries::find_license_by_hwid(store, "H2", "").unwrap(), None, "{}", name);
    }
}

#[test]
fn test_reset_hwid() {
    for (name, store) in stores() {
        let store = store.as_ref();
        queries::create_license(store, &new_license("LIC-1")).unwrap();
        queries::bind_hwid(store, "LIC-1", "", "H1", 1, &activation()).unwrap();

        let previous = queries::reset_hwid(store, "LIC-1", HistoryAction::ResetHwid, "admin", 2).unwrap();
        assert_eq!(previous.as_deref(), Some("H1"), "{}", name);
        let license = queries::get_license(store, "LIC-1").unwrap().unwrap();
        assert!(!license.is_bound(), "{}", name);
        assert_eq!(license.history.len(), 3, "{}", name);

        // Resetting an unbound license still succeeds
        let previous = queries::reset_hwid(store, "LIC-1", HistoryAction::ResetHwid, "admin", 3).unwrap();
        assert_eq!(previous.as_deref(), Some(""), "{}", name);

        assert!(queries::reset_hwid(store, "NOPE", HistoryAction::ResetHwid, "admin", 3).unwrap().is_none());
    }
}

#[test]
fn test_ban_list_singleton() {
    for (name, store) in stores() {
        let store = store.as_ref();
        assert!(queries::get_banlist(store).unwrap().hwids.is_empty(), "{}", name);
        assert!(!queries::unban_hwid(store, "H1").unwrap(), "{}", name);

        assert!(queries::ban_hwid(store, "H1").unwrap(), "{}", name);
        assert!(queries::ban_hwid(store, "H2").unwrap(), "{}", name);
        assert!(!queries::ban_hwid(store, "H1").unwrap(), "{}", name);
        assert_eq!(queries::get_banlist(store).unwrap().hwids, vec!["H1", "H2"], "{}", name);

        assert!(queries::unban_hwid(store, "H1").unwrap(), "{}", name);
        assert_eq!(queries::get_banlist(store).unwrap().hwids, vec!["H2"], "{}", name);
        assert!(store.get(SETTINGS, BANLIST_DOC).unwrap().is_some(), "{}", name);
    }
}

#[test]
fn test_settings_fill_defaults_for_partial_documents() {
    for (name, store) in stores() {
        let store = store.as_ref();
        let mut partial = hwlock::db::Document::new();
        partial.insert("maintenanceMode".into(), json!(true));
        partial.insert("legacyTheme".into(), json!("dark"));
        store.create(SETTINGS, GENERAL_DOC, partial).unwrap();

        let settings = queries::get_settings(store).unwrap();
        assert!(settings.maintenance_mode, "{}", name);
        assert!(settings.api_enabled, "{}", name);
        assert!(settings.allow_hwid_change, "{}", name);

        let updated = queries::update_settings(
            store,
            &UpdateSettings {
                auto_expire_in_days: Some(30),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(updated.maintenance_mode, "{}", name);
        assert_eq!(updated.auto_expire_in_days, 30, "{}", name);

        // Only the patched field is written; everything else stays as stored
        let stored = store.get(SETTINGS, GENERAL_DOC).unwrap().unwrap();
        assert_eq!(stored["legacyTheme"], "dark", "{}", name);
        assert_eq!(stored["autoExpireInDays"], 30, "{}", name);
        assert!(stored.get("apiEnabled").is_none(), "{}", name);
    }
}

#[test]
fn test_malformed_license_document_is_an_error() {
    for (name, store) in stores() {
        let store = store.as_ref();
        let mut bad = hwlock::db::Document::new();
        bad.insert("expiry".into(), json!("tomorrow"));
        store.create(LICENSES, "LIC-BAD", bad).unwrap();
        assert!(queries::get_license(store, "LIC-BAD").is_err(), "{}", name);
    }
}

#[test]
fn test_hwid_requests() {
    for (name, store) in stores() {
        let store = store.as_ref();
        let input = |license: &str| CreateHwidRequest {
            license_key: license.into(),
            hwid: "H2".into(),
            reason: String::new(),
            ip: None,
            user_agent: None,
        };

        let first = queries::create_hwid_request(store, &input("LIC-1")).unwrap();
        assert_eq!(first.status, HwidRequestStatus::Pending, "{}", name);
        assert!(matches!(
            queries::create_hwid_request(store, &input("LIC-1")),
            Err(AppError::Conflict(_))
        ));
        queries::create_hwid_request(store, &input("LIC-2")).unwrap();

        let pending = queries::pending_request_for_license(store, "LIC-1").unwrap();
        assert_eq!(pending.map(|r| r.id), Some(first.id.clone()), "{}", name);

        assert_eq!(queries::delete_hwid_requests_for_license(store, "LIC-1").unwrap(), 1, "{}", name);
        assert!(queries::get_hwid_request(store, &first.id).unwrap().is_none(), "{}", name);
        assert_eq!(queries::list_hwid_requests(store).unwrap().len(), 1, "{}", name);
    }
}

#[test]
fn test_purge_old_activity_keeps_recent_entries() {
    for (name, store) in stores() {
        let store = store.as_ref();
        let entry = ActivityEntry {
            id: "act_00000000000000000000000000000001".into(),
            timestamp: now_ms(),
            actor_type: ActorType::System,
            actor_id: None,
            action: ActivityAction::SeedLicenses,
            license_key: None,
            hwid: None,
            outcome: None,
            details: None,
            ip: None,
            user_agent: None,
        };
        queries::log_activity(store, &entry).unwrap();

        assert_eq!(queries::purge_old_activity(store, 30).unwrap(), 0, "{}", name);
        assert_eq!(queries::purge_old_activity(store, 200_000_000_000).unwrap(), 0, "{}", name);
        assert_eq!(queries::purge_old_activity(store, i64::MAX).unwrap(), 0, "{}", name);
        assert_eq!(queries::recent_activity(store, 10).unwrap().len(), 1, "{}", name);
        assert!(queries::log_activity(store, &entry).is_err(), "{}", name);
    }
}

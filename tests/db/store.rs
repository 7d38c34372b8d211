//! Both store implementations must behave the same per document.

use hwlock::db::{Document, UpdateResult};
use serde_json::json;

#[path = "../common/mod.rs"]
mod common;
use common::*;

fn doc(value: serde_json::Value) -> Document {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

fn stores() -> Vec<(&'static str, Box<dyn DocumentStore>)> {
    vec![
        ("memory", Box::new(MemoryStore::new())),
        ("sqlite", Box::new(SqliteStore::open_in_memory().unwrap())),
    ]
}

#[test]
fn test_create_never_overwrites() {
    for (name, store) in stores() {
        assert!(store.create("things", "a", doc(json!({ "n": 1 }))).unwrap(), "{}", name);
        assert!(!store.create("things", "a", doc(json!({ "n": 2 }))).unwrap(), "{}", name);
        assert_eq!(store.get("things", "a").unwrap().unwrap()["n"], 1, "{}", name);
    }
}

#[test]
fn test_get_missing_and_collections_are_separate() {
    for (name, store) in stores() {
        store.create("one", "a", doc(json!({}))).unwrap();
        assert!(store.get("two", "a").unwrap().is_none(), "{}", name);
        assert!(store.get("one", "b").unwrap().is_none(), "{}", name);
        assert_eq!(store.count("two").unwrap(), 0, "{}", name);
    }
}

#[test]
fn test_merge_keeps_other_fields_and_creates() {
    for (name, store) in stores() {
        store.merge("things", "a", doc(json!({ "x": 1 }))).unwrap();
        store.merge("things", "a", doc(json!({ "y": 2 }))).unwrap();
        store.merge("things", "a", doc(json!({ "x": 3 }))).unwrap();
        assert_eq!(
            store.get("things", "a").unwrap().unwrap(),
            doc(json!({ "x": 3, "y": 2 })),
            "{}",
            name
        );
    }
}

#[test]
fn test_update_results() {
    for (name, store) in stores() {
        let mut calls = 0;
        let result = store
            .update("things", "a", &mut |_| {
                calls += 1;
                true
            })
            .unwrap();
        assert_eq!(result, UpdateResult::Missing, "{}", name);
        assert_eq!(calls, 0, "{}", name);

        store.create("things", "a", doc(json!({ "v": "old" }))).unwrap();

        let result = store
            .update("things", "a", &mut |d| {
                d.insert("v".into(), json!("ignored"));
                false
            })
            .unwrap();
        assert_eq!(result, UpdateResult::Skipped, "{}", name);
        assert_eq!(store.get("things", "a").unwrap().unwrap()["v"], "old", "{}", name);

        let result = store
            .update("things", "a", &mut |d| {
                if d["v"] != "old" {
                    return false;
                }
                d.insert("v".into(), json!("new"));
                true
            })
            .unwrap();
        assert_eq!(result, UpdateResult::Applied, "{}", name);
        assert_eq!(store.get("things", "a").unwrap().unwrap()["v"], "new", "{}", name);
    }
}

#[test]
fn test_list_and_recent_order() {
    for (name, store) in stores() {
        for key in ["c", "a", "b"] {
            store.create("things", key, doc(json!({ "k": key }))).unwrap();
        }
        let listed: Vec<String> = store.list("things").unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(listed, vec!["c", "a", "b"], "{}", name);

        let recent: Vec<String> = store.recent("things", 2).unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(recent, vec!["b", "a"], "{}", name);
        assert_eq!(store.count("things").unwrap(), 3, "{}", name);
    }
}

#[test]
fn test_delete() {
    for (name, store) in stores() {
        store.create("things", "a", doc(json!({}))).unwrap();
        assert!(store.delete("things", "a").unwrap(), "{}", name);
        assert!(!store.delete("things", "a").unwrap(), "{}", name);
        assert!(store.get("things", "a").unwrap().is_none(), "{}", name);
        // The key is free again
        assert!(store.create("things", "a", doc(json!({}))).unwrap(), "{}", name);
    }
}

#[test]
fn test_purge_before() {
    for (name, store) in stores() {
        store.create("log", "a", doc(json!({}))).unwrap();
        store.create("log", "b", doc(json!({}))).unwrap();

        assert_eq!(store.purge_before("log", 0).unwrap(), 0, "{}", name);
        assert_eq!(store.purge_before("log", now_ms() + 60_000).unwrap(), 2, "{}", name);
        assert_eq!(store.count("log").unwrap(), 0, "{}", name);
    }
}

#[test]
fn test_sqlite_file_persists_across_opens() {
    let dir = std::env::temp_dir().join(format!("hwlock-test-{}", uuid_like()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("store.db");
    let path = path.to_str().unwrap();

    {
        let store = SqliteStore::open(path).unwrap();
        store.create("things", "a", doc(json!({ "n": 7 }))).unwrap();
    }
    let store = SqliteStore::open(path).unwrap();
    assert_eq!(store.get("things", "a").unwrap().unwrap()["n"], 7);

    drop(store);
    let _ = std::fs::remove_dir_all(&dir);
}

fn uuid_like() -> String {
    format!("{}-{}", std::process::id(), now_ms())
}

//! Unit tests for the request handler, exercised through the same
//! `handle_method` path the `tabsig-host` binary uses.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use tabsig::app::App;
use tabsig::config::{CoreConfig, StoreBackend};
use tabsig::rpc_handler::handle_method;
use tabsig::services::title_correction::TabHost;
use tabsig::types::errors::HostError;

struct SilentHost;

#[async_trait]
impl TabHost for SilentHost {
    async fn tab_title(&self, _tab_id: i64) -> Result<Option<String>, HostError> {
        Ok(None)
    }
    async fn force_title(&self, _tab_id: i64, _title: &str) -> Result<(), HostError> {
        Ok(())
    }
}

/// Fresh App on a temp-dir SQLite store.
fn setup() -> (App, TempDir) {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let mut config = CoreConfig::default();
    config.store.backend = StoreBackend::Sqlite;
    config.store.path = Some(tmp.path().join("signatures.db"));
    let app = App::from_config(&config, Arc::new(SilentHost)).expect("Failed to init App");
    (app, tmp)
}

// ─── Ping ───

#[tokio::test]
async fn test_ping() {
    let (app, _tmp) = setup();
    let res = handle_method(&app, "ping", &json!({})).await.unwrap();
    assert_eq!(res, json!({"pong": true}));
}

#[tokio::test]
async fn test_unknown_method_returns_error() {
    let (app, _tmp) = setup();
    let res = handle_method(&app, "nonexistent.method", &json!({})).await;
    assert!(res.unwrap_err().contains("unknown method"));
}

// ─── Signatures ───

#[tokio::test]
async fn test_save_then_load_signature() {
    let (app, _tmp) = setup();
    handle_method(
        &app,
        "save_signature",
        &json!({
            "tabId": 7,
            "url": "https://a.com",
            "index": 0,
            "signature": {"title": "Example", "favicon": {"type": "systemEmojiFavicon", "content": "😁"}}
        }),
    )
    .await
    .unwrap();

    let loaded = handle_method(
        &app,
        "load_signature",
        &json!({"tabId": 7, "url": "https://a.com", "index": 0}),
    )
    .await
    .unwrap();
    assert_eq!(loaded["title"], "Example");
    assert_eq!(loaded["favicon"]["type"], "systemEmojiFavicon");
}

#[tokio::test]
async fn test_load_after_close_moves_signature_to_new_id() {
    let (app, _tmp) = setup();
    handle_method(
        &app,
        "save_signature",
        &json!({"tabId": 7, "url": "https://a.com", "index": 0, "signature": {"title": "Example"}}),
    )
    .await
    .unwrap();
    handle_method(&app, "tab_removed", &json!({"tabId": 7})).await.unwrap();

    let loaded = handle_method(
        &app,
        "load_signature",
        &json!({"tabId": 9, "url": "https://a.com", "index": 0, "isBeingOpened": true}),
    )
    .await
    .unwrap();
    assert_eq!(loaded["title"], "Example");
    assert!(app.tabs.get_by_id(7).await.unwrap().is_none());
    assert!(!app.tabs.get_by_id(9).await.unwrap().unwrap().is_closed);
}

#[tokio::test]
async fn test_load_unknown_tab_is_null() {
    let (app, _tmp) = setup();
    let loaded = handle_method(
        &app,
        "load_signature",
        &json!({"tabId": 1, "url": "https://nowhere.com", "index": 0}),
    )
    .await
    .unwrap();
    assert!(loaded.is_null());
}

#[tokio::test]
async fn test_save_requires_tab_id() {
    let (app, _tmp) = setup();
    let err = handle_method(&app, "save_signature", &json!({"url": "https://a.com", "index": 0}))
        .await
        .unwrap_err();
    assert_eq!(err, "missing tabId");
}

#[tokio::test]
async fn test_discard_and_move() {
    let (app, _tmp) = setup();
    handle_method(
        &app,
        "save_signature",
        &json!({"tabId": 1, "url": "https://a.com", "index": 3, "signature": {"title": "T"}}),
    )
    .await
    .unwrap();

    let res = handle_method(
        &app,
        "discard_tab",
        &json!({"tabId": 2, "url": "https://a.com", "index": 3}),
    )
    .await
    .unwrap();
    assert_eq!(res["title"], "T");

    let res = handle_method(&app, "move_tab", &json!({"tabId": 2, "index": 8}))
        .await
        .unwrap();
    assert_eq!(res, json!({"found": true}));
    assert_eq!(app.tabs.get_by_id(2).await.unwrap().unwrap().index, 8);
}

// ─── Settings ───

#[tokio::test]
async fn test_emoji_style_round_trip() {
    let (app, _tmp) = setup();
    let res = handle_method(&app, "set_emoji_style", &json!({"style": "twemoji"}))
        .await
        .unwrap();
    assert_eq!(res, json!({"style": "twemoji"}));

    let res = handle_method(&app, "get_emoji_style", &json!({})).await.unwrap();
    assert_eq!(res, json!({"style": "twemoji"}));

    assert!(handle_method(&app, "set_emoji_style", &json!({"style": "sparkly"}))
        .await
        .is_err());
}

// ─── Original title stash ───

#[tokio::test]
async fn test_original_title_stash() {
    let (app, _tmp) = setup();
    handle_method(
        &app,
        "stash_original_title",
        &json!({"tabId": 4, "originalTitle": "Inbox (3)"}),
    )
    .await
    .unwrap();

    let res = handle_method(&app, "unstash_original_title", &json!({"tabId": 4}))
        .await
        .unwrap();
    assert_eq!(res, json!({"originalTitle": "Inbox (3)"}));

    let res = handle_method(&app, "unstash_original_title", &json!({"tabId": 4}))
        .await
        .unwrap();
    assert_eq!(res, json!({"originalTitle": null}));
}

// ─── Lifecycle ───

#[tokio::test]
async fn test_title_changed_decisions() {
    let (app, _tmp) = setup();
    let res = handle_method(&app, "title_changed", &json!({"tabId": 1, "title": "x"}))
        .await
        .unwrap();
    assert_eq!(res, json!({"decision": "not_tracked"}));

    handle_method(
        &app,
        "save_signature",
        &json!({"tabId": 1, "url": "https://a.com", "index": 0, "signature": {"title": "Mine"}}),
    )
    .await
    .unwrap();
    let res = handle_method(&app, "title_changed", &json!({"tabId": 1, "title": "Mine"}))
        .await
        .unwrap();
    assert_eq!(res, json!({"decision": "ignored"}));
    let res = handle_method(&app, "title_changed", &json!({"tabId": 1, "title": "Theirs"}))
        .await
        .unwrap();
    assert_eq!(res, json!({"decision": "scheduled"}));
}

#[tokio::test]
async fn test_lifecycle_forwarding() {
    let (app, _tmp) = setup();
    handle_method(
        &app,
        "save_signature",
        &json!({"tabId": 1, "url": "https://a.com", "index": 0, "signature": {"title": "A"}}),
    )
    .await
    .unwrap();

    let res = handle_method(
        &app,
        "tab_moved",
        &json!({"tabId": 1, "moveInfo": {"windowId": 1, "fromIndex": 0, "toIndex": 4}}),
    )
    .await
    .unwrap();
    assert_eq!(res, json!({"ok": true}));
    assert_eq!(app.tabs.get_by_id(1).await.unwrap().unwrap().index, 4);

    let res = handle_method(
        &app,
        "tab_updated",
        &json!({"tabId": 1, "changeInfo": {"status": "complete"}}),
    )
    .await
    .unwrap();
    assert_eq!(res, json!({"decision": null}));

    let res = handle_method(&app, "startup", &json!({})).await.unwrap();
    assert_eq!(res, json!({"closed": 1}));

    let res = handle_method(&app, "installed", &json!({"reason": "install"}))
        .await
        .unwrap();
    assert_eq!(res, json!({"closed": 0}));

    assert!(handle_method(&app, "installed", &json!({"reason": "bogus"}))
        .await
        .is_err());
}

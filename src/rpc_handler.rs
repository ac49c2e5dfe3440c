//! Request handler for the tabsig JSON protocol.
//!
//! Kept apart from `rpc_server.rs` so it can be tested without stdio.
//! `handle_method` dispatches one request to the repositories and services
//! owned by [`App`].

use serde_json::{json, Value};
use tracing::warn;

use crate::app::App;
use crate::services::title_correction::CorrectionDecision;
use crate::types::tab::{InstallReason, TabChange, TabId, TabMove, TabRecord, TabSignature};

fn tab_id(params: &Value) -> Result<TabId, String> {
    params
        .get("tabId")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| "missing tabId".to_string())
}

fn str_param<'a>(params: &'a Value, name: &str) -> Result<&'a str, String> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing {}", name))
}

fn index_param(params: &Value, name: &str) -> Result<u32, String> {
    params
        .get(name)
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| format!("missing {}", name))
}

fn object_param<T: serde::de::DeserializeOwned>(params: &Value, name: &str) -> Result<T, String> {
    let value = params.get(name).cloned().unwrap_or_else(|| json!({}));
    serde_json::from_value(value).map_err(|e| format!("invalid {}: {}", name, e))
}

fn decision_name(decision: &CorrectionDecision) -> &'static str {
    match decision {
        CorrectionDecision::NotTracked => "not_tracked",
        CorrectionDecision::Ignored => "ignored",
        CorrectionDecision::Scheduled(_) => "scheduled",
        CorrectionDecision::RateLimited => "rate_limited",
    }
}

fn signature_json(signature: Option<TabSignature>) -> Result<Value, String> {
    match signature {
        Some(signature) => serde_json::to_value(signature).map_err(|e| e.to_string()),
        None => Ok(Value::Null),
    }
}

/// Dispatches one request.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(app: &App, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true})),

        // ─── Signatures ───
        "save_signature" => {
            let id = tab_id(params)?;
            let url = str_param(params, "url")?;
            let index = index_param(params, "index")?;
            let signature: TabSignature = object_param(params, "signature")?;
            let record = TabRecord::new(id, url, index, signature);
            let tabs = &app.tabs;
            tabs.run_exclusive(|| tabs.save(&record))
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "load_signature" => {
            let id = tab_id(params)?;
            let url = str_param(params, "url")?;
            let index = index_param(params, "index")?;
            let is_being_opened = params
                .get("isBeingOpened")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let tabs = &app.tabs;
            let loaded = tabs
                .run_exclusive(|| tabs.load_tab_and_update_id(id, url, index, is_being_opened))
                .await;
            match loaded {
                Ok(record) => signature_json(record.map(|r| r.signature)),
                Err(e) => {
                    warn!(tab_id = id, error = %e, "Failed to load signature");
                    Ok(Value::Null)
                }
            }
        }
        "discard_tab" => {
            let id = tab_id(params)?;
            let url = str_param(params, "url")?;
            let index = index_param(params, "index")?;
            let tabs = &app.tabs;
            let record = tabs
                .run_exclusive(|| tabs.reattach_discarded_tab(id, url, index))
                .await
                .map_err(|e| e.to_string())?;
            signature_json(record.map(|r| r.signature))
        }
        "move_tab" => {
            let id = tab_id(params)?;
            let index = index_param(params, "index")?;
            let tabs = &app.tabs;
            let record = tabs
                .run_exclusive(|| tabs.update_index(id, index))
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"found": record.is_some()}))
        }

        // ─── Settings ───
        "set_emoji_style" => {
            let style = str_param(params, "style")?;
            let style = app
                .settings
                .set_emoji_style_str(style)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"style": style.as_str()}))
        }
        "get_emoji_style" => {
            let style = app
                .settings
                .get_or_init_emoji_style()
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"style": style.as_str()}))
        }

        // ─── Original title stash ───
        "stash_original_title" => {
            let id = tab_id(params)?;
            let title = str_param(params, "originalTitle")?;
            app.stash_original_title(id, title);
            Ok(json!({"ok": true}))
        }
        "unstash_original_title" => {
            let id = tab_id(params)?;
            Ok(json!({"originalTitle": app.unstash_original_title(id)}))
        }

        // ─── Lifecycle ───
        "title_changed" => {
            let id = tab_id(params)?;
            let title = str_param(params, "title")?;
            let decision = app
                .title_correction
                .handle_title_change(id, title)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"decision": decision_name(&decision)}))
        }
        "tab_removed" => {
            let id = tab_id(params)?;
            app.lifecycle.on_tab_removed(id).await.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "tab_updated" => {
            let id = tab_id(params)?;
            let change: TabChange = object_param(params, "changeInfo")?;
            let decision = app
                .lifecycle
                .on_tab_updated(id, &change)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"decision": decision.as_ref().map(decision_name)}))
        }
        "tab_moved" => {
            let id = tab_id(params)?;
            let movement: TabMove = object_param(params, "moveInfo")?;
            app.lifecycle
                .on_tab_moved(id, &movement)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "startup" => {
            let closed = app.lifecycle.on_startup().await.map_err(|e| e.to_string())?;
            Ok(json!({"closed": closed}))
        }
        "installed" => {
            let reason: InstallReason = object_param(params, "reason")?;
            let closed = app
                .lifecycle
                .on_installed(reason)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"closed": closed}))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}

//! tabsig host: JSON over stdin/stdout for the browser-side shim.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"load_signature", "params":{"tabId":9,"url":"...","index":0}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//! Command:  {"command":"force_title", "tabId":9, "title":"..."}
//!
//! Logs go to stderr so stdout stays a clean protocol stream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tabsig::app::App;
use tabsig::config::CoreConfig;
use tabsig::rpc_handler::handle_method;
use tabsig::services::title_correction::TabHost;
use tabsig::types::errors::HostError;
use tabsig::types::tab::TabId;

const LOG_ENV: &str = "TABSIG_LOG";

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// [`TabHost`] backed by the stdio stream.
///
/// Live titles are whatever the shim last reported; commands are queued to
/// the stdout writer.
struct StdioHost {
    outbound: mpsc::UnboundedSender<Value>,
    titles: Mutex<HashMap<TabId, String>>,
}

impl StdioHost {
    fn new(outbound: mpsc::UnboundedSender<Value>) -> Self {
        Self {
            outbound,
            titles: Mutex::new(HashMap::new()),
        }
    }

    /// Tracks titles carried by inbound requests.
    fn observe(&self, method: &str, params: &Value) {
        let Some(tab_id) = params.get("tabId").and_then(|v| v.as_i64()) else {
            return;
        };
        let title = match method {
            "title_changed" => params.get("title"),
            "tab_updated" => params.get("changeInfo").and_then(|c| c.get("title")),
            "tab_removed" => {
                self.titles().remove(&tab_id);
                return;
            }
            _ => None,
        };
        if let Some(title) = title.and_then(|t| t.as_str()) {
            self.titles().insert(tab_id, title.to_string());
        }
    }

    fn titles(&self) -> std::sync::MutexGuard<'_, HashMap<TabId, String>> {
        self.titles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TabHost for StdioHost {
    async fn tab_title(&self, tab_id: TabId) -> Result<Option<String>, HostError> {
        Ok(self.titles().get(&tab_id).cloned())
    }

    async fn force_title(&self, tab_id: TabId, title: &str) -> Result<(), HostError> {
        self.outbound
            .send(json!({"command": "force_title", "tabId": tab_id, "title": title}))
            .map_err(|_| HostError::Disconnected)
    }
}

#[tokio::main]
async fn main() {
    init_logging();

    let config = match CoreConfig::load_default() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Falling back to default config");
            CoreConfig::default()
        }
    };

    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Value>();
    let host = Arc::new(StdioHost::new(outbound.clone()));
    let app = match App::from_config(&config, host.clone()) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "Failed to initialize tabsig");
            std::process::exit(1);
        }
    };

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = outbound_rx.recv().await {
            let mut line = message.to_string();
            line.push('\n');
            if let Err(e) = stdout.write_all(line.as_bytes()).await {
                error!(error = %e, "stdout closed");
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let _ = outbound.send(json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}));
    let background = app.start_background_tasks();
    info!("tabsig host ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                let _ = outbound.send(json!({"id": null, "error": format!("parse error: {}", e)}));
                continue;
            }
        };

        let id = req.get("id").cloned().unwrap_or(Value::Null);
        let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
        let params = req.get("params").cloned().unwrap_or(json!({}));

        host.observe(method, &params);
        let response = match handle_method(&app, method, &params).await {
            Ok(val) => json!({"id": id, "result": val}),
            Err(err) => json!({"id": id, "error": err}),
        };
        if outbound.send(response).is_err() {
            break;
        }
    }

    info!("stdin closed, shutting down");
    for task in background {
        task.abort();
    }
    drop(app);
    drop(outbound);
    drop(host);
    // In-flight corrections may still hold a sender; give the writer a moment to drain.
    let _ = tokio::time::timeout(Duration::from_secs(1), writer).await;
}

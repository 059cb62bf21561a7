//! Append-only audit trail. Every stage of a request lands here as one
//! JSON line; an optional HTTP mirror receives a copy. Ledger failures are
//! reported in the acknowledgement and never abort the request.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

/// Per-request identity stamped on every line.
#[derive(Debug, Clone)]
pub struct LedgerContext {
    pub session_id: String,
    pub agent_version: String,
    pub model_id: String,
    pub user_query: String,
}

impl LedgerContext {
    pub fn new(
        session_id: Option<String>,
        agent_version: impl Into<String>,
        model_id: impl Into<String>,
        user_query: impl Into<String>,
    ) -> Self {
        let session_id = session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self {
            session_id,
            agent_version: agent_version.into(),
            model_id: model_id.into(),
            user_query: user_query.into(),
        }
    }
}

/// Outcome of one write. `ok` is true when at least the local append
/// succeeded (or local writes are disabled and the mirror succeeded).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerAck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    local_enabled: bool,
    local_path: PathBuf,
    mirror_url: Option<String>,
    client: reqwest::Client,
}

impl Ledger {
    pub fn new(local_enabled: bool, local_path: impl Into<PathBuf>, mirror_url: Option<String>) -> Self {
        Self {
            local_enabled,
            local_path: local_path.into(),
            mirror_url: mirror_url.filter(|url| !url.trim().is_empty()),
            client: reqwest::Client::new(),
        }
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Record an intermediate stage such as planning or tool execution.
    pub async fn write_step(&self, ctx: &LedgerContext, stage: &str, payload: Value) -> LedgerAck {
        let ts = timestamp();
        let entry = json!({
            "ts": ts,
            "session_id": ctx.session_id,
            "stage": stage,
            "agent_version": ctx.agent_version,
            "model_id": ctx.model_id,
            "user_query": ctx.user_query,
            "payload": payload,
        });
        self.append(ctx, &ts, entry).await
    }

    /// Record the final resolved args and result envelope for a request.
    pub async fn write_entry(&self, ctx: &LedgerContext, args: &Value, result: &Value) -> LedgerAck {
        let ts = timestamp();
        let entry = json!({
            "ts": ts,
            "session_id": ctx.session_id,
            "stage": "final",
            "agent_version": ctx.agent_version,
            "model_id": ctx.model_id,
            "user_query": ctx.user_query,
            "args": args,
            "result": result,
        });
        self.append(ctx, &ts, entry).await
    }

    async fn append(&self, ctx: &LedgerContext, ts: &str, entry: Value) -> LedgerAck {
        let mut ack = LedgerAck {
            ok: false,
            local_path: None,
            local_error: None,
            remote_uri: None,
            remote_error: None,
        };

        if self.local_enabled {
            match self.append_local(&entry) {
                Ok(()) => {
                    ack.ok = true;
                    ack.local_path = Some(self.local_path.display().to_string());
                }
                Err(error) => {
                    warn!(%error, path = %self.local_path.display(), "local ledger append failed");
                    ack.local_error = Some(error.to_string());
                }
            }
        }

        if let Some(base) = &self.mirror_url {
            let uri = format!("{}/{}/{}.json", base.trim_end_matches('/'), ctx.session_id, ts);
            match self.client.put(&uri).json(&entry).send().await {
                Ok(response) if response.status().is_success() => {
                    ack.ok = true;
                    ack.remote_uri = Some(uri);
                }
                Ok(response) => {
                    warn!(status = %response.status(), %uri, "ledger mirror rejected entry");
                    ack.remote_error = Some(format!("HTTP {}", response.status()));
                }
                Err(error) => {
                    warn!(%error, %uri, "ledger mirror unreachable");
                    ack.remote_error = Some(error.to_string());
                }
            }
        }

        ack
    }

    fn append_local(&self, entry: &Value) -> std::io::Result<()> {
        if let Some(parent) = self.local_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.local_path)?;
        writeln!(file, "{entry}")
    }
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

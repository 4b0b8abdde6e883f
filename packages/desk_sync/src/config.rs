//! Configuration
//!
//! Figment-layered: struct defaults → `config.toml` in the data directory →
//! `DESK_*` environment variables (double underscore nests into sections):
//!
//!   config.toml:   [server]
//!                  base_url = "https://support.example.com"
//!
//!   env var:       DESK_SERVER__BASE_URL=https://support.example.com

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub operator: OperatorFileConfig,
}

/// Connection tunables (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    /// HTTP base URL of the support backend. The realtime endpoint is
    /// derived from it with a fixed `/ws` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Fixed delay between reconnection attempts.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// Credential sent as a bearer token to the REST collaborators.
    #[serde(default)]
    pub session_token: Option<String>,
    /// Capacity of the engine's inbound event queue.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Capacity of the outbound frame queue.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            session_token: None,
            event_capacity: default_event_capacity(),
            outbound_capacity: default_outbound_capacity(),
        }
    }
}

/// Operator identity (lives under `[operator]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperatorFileConfig {
    /// Sender name stamped on outgoing messages and used to recognize the
    /// operator's own echoes (they never flip a conversation to unread).
    #[serde(default = "default_operator_identity")]
    pub identity: String,
}

impl Default for OperatorFileConfig {
    fn default() -> Self {
        Self {
            identity: default_operator_identity(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_event_capacity() -> usize {
    256
}

fn default_outbound_capacity() -> usize {
    64
}

fn default_operator_identity() -> String {
    std::env::var("USER")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "operator".to_string())
}

/// Build a figment that layers: defaults → config.toml → DESK_* env vars.
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("DESK_").split("__"))
}

/// Resolved runtime configuration used throughout the engine.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub base_url: String,
    pub reconnect_delay: Duration,
    pub session_token: Option<String>,
    pub operator_identity: String,
    pub event_capacity: usize,
    pub outbound_capacity: usize,
}

impl SyncConfig {
    pub fn from_file(fc: &FileConfig) -> Self {
        Self {
            base_url: fc.server.base_url.trim_end_matches('/').to_string(),
            reconnect_delay: Duration::from_secs(fc.server.reconnect_delay_secs),
            session_token: fc.server.session_token.clone(),
            operator_identity: fc.operator.identity.clone(),
            event_capacity: fc.server.event_capacity,
            outbound_capacity: fc.server.outbound_capacity,
        }
    }

    /// Realtime endpoint: base URL with the scheme flipped to ws(s) and the
    /// fixed `/ws` path suffix.
    pub fn ws_url(&self) -> String {
        let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("ws://{}", self.base_url)
        };
        format!("{base}/ws")
    }

    /// Open-conversations fetch, used by catch-up.
    pub fn open_tickets_url(&self) -> String {
        format!("{}/api/tickets/open", self.base_url)
    }

    /// Full-history fetch for one conversation.
    pub fn history_url(&self, chat_id: &str) -> String {
        format!("{}/api/tickets/{chat_id}/messages", self.base_url)
    }
}

/// Directory layout (not tunable via figment — derived from `--data-dir`).
#[derive(Clone, Debug)]
pub struct DataDir {
    pub path: PathBuf,
}

impl DataDir {
    pub fn new(custom: Option<PathBuf>) -> Result<Self> {
        let path = match custom {
            Some(path) => path,
            None => dirs::home_dir()
                .context("could not find home directory")?
                .join(".desk-sync"),
        };
        std::fs::create_dir_all(&path)
            .with_context(|| format!("failed to create data directory: {:?}", path))?;
        Ok(Self { path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── defaults ────────────────────────────────────────────────────────

    #[test]
    fn file_config_defaults() {
        let fc = FileConfig::default();
        assert_eq!(fc.server.base_url, "http://127.0.0.1:8080");
        assert_eq!(fc.server.reconnect_delay_secs, 5);
        assert!(fc.server.session_token.is_none());
        assert!(!fc.operator.identity.is_empty());
    }

    // ── load_config ─────────────────────────────────────────────────────

    #[test]
    fn load_config_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let fc: FileConfig = load_config(tmp.path()).extract().unwrap();
        assert_eq!(fc.server.reconnect_delay_secs, 5);
    }

    #[test]
    fn load_config_toml_sets_values() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "[server]\nbase_url = \"https://support.example.com\"\nreconnect_delay_secs = 2\n\n[operator]\nidentity = \"op1\"\n",
        )
        .unwrap();
        let fc: FileConfig = load_config(tmp.path()).extract().unwrap();
        assert_eq!(fc.server.base_url, "https://support.example.com");
        assert_eq!(fc.server.reconnect_delay_secs, 2);
        assert_eq!(fc.operator.identity, "op1");
    }

    // ── SyncConfig ──────────────────────────────────────────────────────

    #[test]
    fn ws_url_flips_scheme_and_appends_suffix() {
        let mut fc = FileConfig::default();
        fc.server.base_url = "https://support.example.com".into();
        let cfg = SyncConfig::from_file(&fc);
        assert_eq!(cfg.ws_url(), "wss://support.example.com/ws");

        fc.server.base_url = "http://127.0.0.1:8080/".into();
        let cfg = SyncConfig::from_file(&fc);
        assert_eq!(cfg.ws_url(), "ws://127.0.0.1:8080/ws");
    }

    #[test]
    fn rest_urls() {
        let cfg = SyncConfig::from_file(&FileConfig::default());
        assert_eq!(
            cfg.open_tickets_url(),
            "http://127.0.0.1:8080/api/tickets/open"
        );
        assert_eq!(
            cfg.history_url("T42"),
            "http://127.0.0.1:8080/api/tickets/T42/messages"
        );
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let mut fc = FileConfig::default();
        fc.server.base_url = "http://h:1/".into();
        let cfg = SyncConfig::from_file(&fc);
        assert_eq!(cfg.base_url, "http://h:1");
    }
}

use std::collections::BTreeSet;
use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn split_peers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_log_filter() -> String {
    "info".into()
}

// ── Node config ───────────────────────────────────────────────

/// Configuration for one scheduling peer.
///
/// Parsed from TOML (`peerflow.toml`) or built from `PEERFLOW_*` environment
/// variables. Env vars override file values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Identifier of the local peer.
    pub peer_id: String,

    /// Other peers known at startup. May include the local peer.
    #[serde(default)]
    pub peers: Vec<String>,

    /// `tracing_subscriber` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl NodeConfig {
    /// Minimal config for a single peer with no other members.
    pub fn local(peer_id: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            peers: Vec::new(),
            log_filter: default_log_filter(),
        }
    }

    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, CoreError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Load config from `path`, or `Ok(None)` when no file exists there.
    ///
    /// A file that exists but fails to read, parse or validate is an error.
    pub fn from_file_if_present(path: impl AsRef<Path>) -> Result<Option<Self>, CoreError> {
        match Self::from_file(path) {
            Ok(config) => Ok(Some(config)),
            Err(CoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `PEERFLOW_PROFILE`. When set (e.g. `STAGING`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Result<Self, CoreError> {
        let profile = env_or("PEERFLOW_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Result<Self, CoreError> {
        let p = profile.to_uppercase();
        let p = p.as_str();
        let mut config = Self {
            peer_id: profiled_env_or(p, "PEERFLOW_PEER_ID", ""),
            peers: profiled_env_opt(p, "PEERFLOW_PEERS")
                .map(|raw| split_peers(&raw))
                .unwrap_or_default(),
            log_filter: profiled_env_or(p, "PEERFLOW_LOG", "info"),
        };
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn apply_env_overrides(&mut self) {
        if let Some(v) = env_opt("PEERFLOW_PEER_ID") {
            self.peer_id = v;
        }
        if let Some(v) = env_opt("PEERFLOW_PEERS") {
            self.peers = split_peers(&v);
        }
        if let Some(v) = env_opt("PEERFLOW_LOG") {
            self.log_filter = v;
        }
    }

    /// Check the config is usable and normalise the peer list.
    pub fn validate(&mut self) -> Result<(), CoreError> {
        if self.peer_id.trim().is_empty() {
            return Err(CoreError::Config("peer_id must not be empty".into()));
        }
        if let Some(blank) = self.peers.iter().position(|p| p.trim().is_empty()) {
            return Err(CoreError::Config(format!("peers[{blank}] is empty")));
        }
        self.dedup_peers();
        Ok(())
    }

    fn dedup_peers(&mut self) {
        let mut seen = BTreeSet::new();
        self.peers.retain(|p| seen.insert(p.clone()));
    }

    /// The full membership this node starts with, always including itself.
    pub fn effective_peers(&self) -> BTreeSet<String> {
        let mut peers: BTreeSet<String> = self.peers.iter().cloned().collect();
        peers.insert(self.peer_id.clone());
        peers
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  peer_id:     {}", self.peer_id);
        tracing::info!("  peers:       {}", self.effective_peers().len());
        tracing::info!("  log_filter:  {}", self.log_filter);
    }
}

//! Settings: serde defaults, JSON file deep-merge, env overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`Settings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules: objects merge recursively, arrays and primitives are
//! replaced entirely, nulls in the file are skipped.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use opshub_bridge::BridgeConfig;

/// Settings loading failure.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    /// The settings file (or merged result) is not valid.
    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// HTTP/WebSocket server section.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Interval between server-initiated pings, seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a client that has not answered a ping for this long, seconds.
    pub heartbeat_timeout_secs: u64,
    /// Per-connection outbound channel capacity.
    pub channel_capacity: usize,
    /// Drop a connection after this many undelivered messages.
    pub max_dropped_messages: u64,
    /// How many activity entries the `state` snapshot carries.
    pub snapshot_activity_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            channel_capacity: 256,
            max_dropped_messages: 100,
            snapshot_activity_limit: 50,
        }
    }
}

/// Full daemon settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// HTTP/WebSocket server section.
    pub server: ServerConfig,
    /// Orchestrator boundary section.
    pub bridge: BridgeConfig,
}

/// Resolve the default settings path (`~/.opshub/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_owned());
    PathBuf::from(home).join(".opshub").join("settings.json")
}

/// Load settings from `path` with env var overrides. A missing file
/// yields defaults; a malformed file is an error.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    let defaults = serde_json::to_value(Settings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: Settings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides. Invalid values are silently
/// ignored, falling back to the file/default value.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Some(v) = read_env_string("OPSHUB_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u64("OPSHUB_PORT", 0, 65535) {
        settings.server.port = u16::try_from(v).unwrap_or(0);
    }
    if let Some(v) = read_env_u64("OPSHUB_HEARTBEAT_INTERVAL_SECS", 1, 600) {
        settings.server.heartbeat_interval_secs = v;
    }
    if let Some(v) = read_env_u64("OPSHUB_POLL_INTERVAL_SECS", 1, 3600) {
        settings.bridge.poll_interval_secs = v;
    }
    if let Some(v) = read_env_u64("OPSHUB_CACHE_TTL_SECS", 1, 3600) {
        settings.bridge.cache_ttl_secs = v;
    }
    if let Some(v) = read_env_u64("OPSHUB_DISPATCH_TIMEOUT_SECS", 1, 3600) {
        settings.bridge.dispatch_timeout_secs = v;
    }
    if let Some(v) = read_env_string("OPSHUB_COORDINATOR") {
        settings.bridge.coordinator = v;
    }
    if let Some(v) = read_env_string("OPSHUB_ORCHESTRATOR_CMD") {
        let parts: Vec<String> = v.split_whitespace().map(str::to_owned).collect();
        if !parts.is_empty() {
            settings.bridge.command = parts;
        }
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    let n: u64 = raw.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

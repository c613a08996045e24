//! Bridge configuration.

use serde::{Deserialize, Serialize};

/// Settings for the orchestrator boundary.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// Orchestrator CLI: program followed by base arguments.
    pub command: Vec<String>,
    /// Seconds between reconciliation polls.
    pub poll_interval_secs: u64,
    /// Hard deadline for one presence poll, seconds.
    pub poll_timeout_secs: u64,
    /// TTL for cached orchestrator status, seconds.
    pub cache_ttl_secs: u64,
    /// Deadline for one notification dispatch, seconds.
    pub dispatch_timeout_secs: u64,
    /// Callsign of the coordinator agent.
    pub coordinator: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command: vec!["orchestrator".into()],
            poll_interval_secs: 30,
            poll_timeout_secs: 15,
            cache_ttl_secs: 20,
            dispatch_timeout_secs: 90,
            coordinator: opshub_core::agent::COORDINATOR_NAME.into(),
        }
    }
}

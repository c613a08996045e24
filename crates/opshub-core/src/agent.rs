//! Agent records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::ids::AgentId;

/// Callsign of the coordinator agent. The coordinator is never marked
/// offline by presence reconciliation and receives verification requests.
pub const COORDINATOR_NAME: &str = "ATLAS";

/// Presence/work status of an agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Session alive, no current assignment in progress.
    #[default]
    Idle,
    /// Session alive and working on an assignment.
    Active,
    /// No live session found by reconciliation.
    Offline,
}

impl AgentStatus {
    /// Wire/storage string for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "active" => Ok(Self::Active),
            "offline" => Ok(Self::Offline),
            other => Err(CoreError::UnknownVariant {
                kind: "agent status",
                value: other.to_owned(),
            }),
        }
    }
}

/// A known autonomous agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Unique agent record ID.
    pub id: AgentId,
    /// Callsign, unique among agents (e.g. "Scout", "ATLAS").
    pub name: String,
    /// What kind of agent this is, if declared at registration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Current presence/work status.
    pub status: AgentStatus,
    /// Task the agent is currently working, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_task_id: Option<crate::ids::TaskId>,
    /// Free-text description of current activity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_action: Option<String>,
    /// External session identifier, when a live session is bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Model the agent's session runs on, as reported by the orchestrator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Last time the agent was seen alive (report, registration, or poll).
    pub last_seen: DateTime<Utc>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Register a new agent with the given callsign, starting idle.
    pub fn register(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: AgentId::new(),
            name: name.into(),
            role: None,
            status: AgentStatus::Idle,
            current_task_id: None,
            current_action: None,
            session_id: None,
            model: None,
            last_seen: now,
            created_at: now,
        }
    }

    /// Whether this agent is the coordinator.
    pub fn is_coordinator(&self) -> bool {
        self.name == COORDINATOR_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for s in [AgentStatus::Idle, AgentStatus::Active, AgentStatus::Offline] {
            let back: AgentStatus = s.as_str().parse().unwrap();
            assert_eq!(back, s);
        }
    }

    #[test]
    fn registered_agent_starts_idle() {
        let a = Agent::register("Scout");
        assert_eq!(a.status, AgentStatus::Idle);
        assert!(a.current_task_id.is_none());
        assert!(!a.is_coordinator());
    }

    #[test]
    fn coordinator_detected_by_name() {
        let a = Agent::register(COORDINATOR_NAME);
        assert!(a.is_coordinator());
    }
}

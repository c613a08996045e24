//! External session descriptors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One live session as reported by the external orchestrator.
///
/// Reconciliation matches sessions to agents by callsign and flips agents
/// with no matching session to offline. The orchestrator is the sole
/// owner of these records; locally only the session ID is retained as a
/// correlation key.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    /// Orchestrator-side session identifier.
    pub session_id: String,
    /// Orchestrator-side agent identifier, when bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Session key, typically `agent:<callsign>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Agent callsign bound to the session, when reported directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    /// Model the session runs on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Last time the orchestrator touched this session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Last heartbeat the orchestrator saw for this session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl SessionDescriptor {
    /// The agent callsign for this session: the explicit `agentName`
    /// when present, otherwise derived from the session key by stripping
    /// the `agent:` prefix.
    pub fn callsign(&self) -> Option<&str> {
        if let Some(name) = &self.agent_name {
            return Some(name);
        }
        let key = self.key.as_deref()?;
        Some(key.strip_prefix("agent:").unwrap_or(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_orchestrator_shape() {
        let json = r#"{"sessionId":"s-1","agentName":"Scout"}"#;
        let s: SessionDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(s.session_id, "s-1");
        assert_eq!(s.agent_name.as_deref(), Some("Scout"));
        assert!(s.last_heartbeat.is_none());
    }

    #[test]
    fn callsign_derives_from_key() {
        let json = r#"{"sessionId":"s-2","key":"agent:Relay","model":"m-1"}"#;
        let s: SessionDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(s.callsign(), Some("Relay"));

        // Explicit name wins over the key.
        let json = r#"{"sessionId":"s-3","key":"agent:Relay","agentName":"Scout"}"#;
        let s: SessionDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(s.callsign(), Some("Scout"));
    }

    #[test]
    fn anonymous_session_has_no_callsign() {
        let json = r#"{"sessionId":"s-4"}"#;
        let s: SessionDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(s.callsign(), None);
    }
}

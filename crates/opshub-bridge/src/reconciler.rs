//! Periodic presence reconciliation.
//!
//! Every tick the reconciler asks the orchestrator (through the status
//! cache) for its live sessions and diffs them against a known-sessions
//! map it owns exclusively:
//!
//! - a session ID it has not seen registers or refreshes the agent and
//!   publishes `agent:connected`;
//! - a known session that vanished marks the agent offline and publishes
//!   `agent:disconnected`, unless the agent is the coordinator, which is
//!   never auto-offlined;
//! - a failed or timed-out poll skips the whole cycle — absence of an
//!   answer is not evidence of absence of agents.
//!
//! A tick firing while a poll is still in flight is dropped.

use chrono::Utc;
use metrics::counter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use opshub_core::agent::{Agent, AgentStatus};
use opshub_core::session::SessionDescriptor;
use opshub_events::{
    AgentConnectedPayload, AgentDisconnectedPayload, DomainEvent, EventBus,
};
use opshub_store::RecordStore;

use crate::cache::StatusCache;
use crate::error::BridgeError;
use crate::orchestrator::{OrchestratorClient, OrchestratorStatus};

/// Reconciles orchestrator sessions against agent records.
pub struct SessionReconciler {
    store: Arc<dyn RecordStore>,
    bus: EventBus,
    client: Arc<OrchestratorClient>,
    cache: Arc<StatusCache<OrchestratorStatus>>,
    coordinator: String,
    interval: Duration,
    poll_timeout: Duration,
    /// session_id -> agent callsign. Owned exclusively by this task.
    known: Mutex<HashMap<String, String>>,
    /// Held for the duration of one poll; a tick that cannot take it
    /// immediately is dropped.
    poll_gate: Mutex<()>,
}

impl SessionReconciler {
    /// Create a reconciler. `interval` is the tick period, `poll_timeout`
    /// the hard deadline for one poll.
    pub fn new(
        store: Arc<dyn RecordStore>,
        bus: EventBus,
        client: Arc<OrchestratorClient>,
        cache: Arc<StatusCache<OrchestratorStatus>>,
        coordinator: impl Into<String>,
        interval: Duration,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            store,
            bus,
            client,
            cache,
            coordinator: coordinator.into(),
            interval,
            poll_timeout,
            known: Mutex::new(HashMap::new()),
            poll_gate: Mutex::new(()),
        }
    }

    /// Run until cancelled. One tick per interval; overlapping ticks are
    /// dropped rather than queued.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(interval_secs = self.interval.as_secs(), "session reconciler started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.poll_gate.try_lock() {
                        Ok(_guard) => {
                            if let Err(error) = self.poll_once().await {
                                warn!(%error, "presence poll failed, skipping cycle");
                            }
                        }
                        Err(_) => {
                            counter!("reconciler_polls_skipped_total").increment(1);
                            debug!("poll already in flight, dropping tick");
                        }
                    }
                }
                () = cancel.cancelled() => {
                    info!("session reconciler stopping");
                    return;
                }
            }
        }
    }

    /// One reconciliation cycle. Public for tests and manual triggers.
    pub async fn poll_once(&self) -> Result<(), BridgeError> {
        counter!("reconciler_polls_total").increment(1);

        let status = tokio::time::timeout(
            self.poll_timeout,
            self.cache.fetch(|| self.client.status()),
        )
        .await
        .map_err(|_| BridgeError::Timeout(u64::try_from(self.poll_timeout.as_millis()).unwrap_or(u64::MAX)))??;

        let mut known = self.known.lock().await;

        // New or refreshed sessions.
        for session in &status.sessions {
            let Some(name) = session.callsign().map(str::to_owned) else {
                continue;
            };
            if known.contains_key(&session.session_id) {
                continue;
            }
            let _ = known.insert(session.session_id.clone(), name.clone());
            self.register_or_refresh(&name, session);
        }

        // Vanished sessions.
        let live: Vec<&str> = status
            .sessions
            .iter()
            .map(|s| s.session_id.as_str())
            .collect();
        let vanished: Vec<(String, String)> = known
            .iter()
            .filter(|(sid, _)| !live.contains(&sid.as_str()))
            .map(|(sid, name)| (sid.clone(), name.clone()))
            .collect();
        for (session_id, name) in vanished {
            let _ = known.remove(&session_id);
            if name == self.coordinator {
                // The coordinator's primary session is managed out of
                // band; never auto-offline it.
                debug!("coordinator session vanished, leaving agent online");
                continue;
            }
            self.mark_offline(&name);
        }
        Ok(())
    }

    fn register_or_refresh(&self, name: &str, session: &SessionDescriptor) {
        let now = Utc::now();
        let session_id = session.session_id.as_str();
        match self.store.agent_by_name(name) {
            Some(mut agent) => {
                agent.session_id = Some(session_id.to_owned());
                if agent.model.is_none() {
                    agent.model = session.model.clone();
                }
                if agent.status == AgentStatus::Offline {
                    agent.status = AgentStatus::Idle;
                }
                agent.last_seen = now;
                if let Err(error) = self.store.update_agent(agent) {
                    warn!(%error, %name, "failed to refresh agent");
                    return;
                }
            }
            None => {
                let mut agent = Agent::register(name);
                agent.session_id = Some(session_id.to_owned());
                agent.model = session.model.clone();
                if let Err(error) = self.store.insert_agent(agent) {
                    warn!(%error, %name, "failed to register agent");
                    return;
                }
            }
        }
        counter!("reconciler_connects_total").increment(1);
        info!(%name, %session_id, "agent session connected");
        self.bus
            .publish(DomainEvent::AgentConnected(AgentConnectedPayload {
                name: name.to_owned(),
                session_id: Some(session_id.to_owned()),
            }));
    }

    fn mark_offline(&self, name: &str) {
        if let Some(mut agent) = self.store.agent_by_name(name) {
            agent.status = AgentStatus::Offline;
            agent.session_id = None;
            agent.current_action = None;
            if let Err(error) = self.store.update_agent(agent) {
                warn!(%error, %name, "failed to offline agent");
                return;
            }
        }
        counter!("reconciler_disconnects_total").increment(1);
        info!(%name, "agent session vanished, marked offline");
        self.bus
            .publish(DomainEvent::AgentDisconnected(AgentDisconnectedPayload {
                name: name.to_owned(),
            }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeRunner;
    use opshub_store::MemoryStore;

    fn reconciler(runner: Arc<FakeRunner>) -> (Arc<SessionReconciler>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let client = Arc::new(OrchestratorClient::new(
            runner,
            vec!["orc".into()],
            Duration::from_secs(5),
            CancellationToken::new(),
        ));
        // Zero TTL so every poll actually queries the fake.
        let cache = Arc::new(StatusCache::new(Duration::from_millis(0)));
        let rec = Arc::new(SessionReconciler::new(
            store.clone(),
            EventBus::new(),
            client,
            cache,
            "ATLAS",
            Duration::from_secs(30),
            Duration::from_secs(5),
        ));
        (rec, store)
    }

    #[tokio::test]
    async fn new_session_registers_agent() {
        let runner =
            FakeRunner::with_status(r#"{"sessions":[{"sessionId":"s-1","agentName":"Scout"}]}"#);
        let (rec, store) = reconciler(runner);

        rec.poll_once().await.unwrap();

        let agent = store.agent_by_name("Scout").unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);
        assert_eq!(agent.session_id.as_deref(), Some("s-1"));
    }

    #[tokio::test]
    async fn session_key_and_model_are_picked_up() {
        let runner = FakeRunner::with_status(
            r#"{"sessions":[{"sessionId":"s-1","key":"agent:Relay","model":"m-large"}]}"#,
        );
        let (rec, store) = reconciler(runner);

        rec.poll_once().await.unwrap();

        let agent = store.agent_by_name("Relay").unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);
        assert_eq!(agent.model.as_deref(), Some("m-large"));
    }

    #[tokio::test]
    async fn vanished_session_marks_agent_offline() {
        let runner =
            FakeRunner::with_status(r#"{"sessions":[{"sessionId":"s-1","agentName":"Scout"}]}"#);
        let (rec, store) = reconciler(runner.clone());
        rec.poll_once().await.unwrap();

        runner.set_status(Ok(r#"{"sessions":[]}"#));
        rec.poll_once().await.unwrap();

        let agent = store.agent_by_name("Scout").unwrap();
        assert_eq!(agent.status, AgentStatus::Offline);
        assert!(agent.session_id.is_none());
    }

    #[tokio::test]
    async fn coordinator_is_never_auto_offlined() {
        let runner =
            FakeRunner::with_status(r#"{"sessions":[{"sessionId":"s-0","agentName":"ATLAS"}]}"#);
        let (rec, store) = reconciler(runner.clone());
        rec.poll_once().await.unwrap();

        runner.set_status(Ok(r#"{"sessions":[]}"#));
        rec.poll_once().await.unwrap();

        let agent = store.agent_by_name("ATLAS").unwrap();
        assert_ne!(agent.status, AgentStatus::Offline);
    }

    #[tokio::test]
    async fn failed_poll_skips_cycle_without_offlining() {
        let runner =
            FakeRunner::with_status(r#"{"sessions":[{"sessionId":"s-1","agentName":"Scout"}]}"#);
        let (rec, store) = reconciler(runner.clone());
        rec.poll_once().await.unwrap();

        // The cache serves last known good on a failed refresh, so the
        // cycle completes against the previous session list and changes
        // nothing.
        runner.set_status(Err("orchestrator unreachable"));
        rec.poll_once().await.unwrap();

        // Scout is still online: no answer is not evidence of absence.
        let agent = store.agent_by_name("Scout").unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);
    }

    #[tokio::test]
    async fn cold_failed_poll_errors_and_registers_nothing() {
        let runner = FakeRunner::new();
        runner.set_status(Err("orchestrator unreachable"));
        let (rec, store) = reconciler(runner);

        // No last known good yet: the failure surfaces and the cycle is
        // skipped entirely.
        assert!(rec.poll_once().await.is_err());
        assert!(store.agents().is_empty());
    }

    #[tokio::test]
    async fn reconnect_after_offline_restores_agent() {
        let runner =
            FakeRunner::with_status(r#"{"sessions":[{"sessionId":"s-1","agentName":"Scout"}]}"#);
        let (rec, store) = reconciler(runner.clone());
        rec.poll_once().await.unwrap();

        runner.set_status(Ok(r#"{"sessions":[]}"#));
        rec.poll_once().await.unwrap();
        assert_eq!(
            store.agent_by_name("Scout").unwrap().status,
            AgentStatus::Offline
        );

        runner.set_status(Ok(r#"{"sessions":[{"sessionId":"s-9","agentName":"Scout"}]}"#));
        rec.poll_once().await.unwrap();

        let agent = store.agent_by_name("Scout").unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);
        assert_eq!(agent.session_id.as_deref(), Some("s-9"));
        // No duplicate record was created.
        assert_eq!(store.agents().len(), 1);
    }
}

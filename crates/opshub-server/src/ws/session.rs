//! WebSocket session lifecycle, from upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use metrics::{counter, histogram};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use opshub_core::agent::Agent;
use opshub_core::agent::AgentStatus as CoreAgentStatus;
use opshub_core::task::TaskStatus;
use opshub_events::{
    AgentConnectedPayload, AgentDisconnectedPayload, AgentUpdatedPayload, DomainEvent,
};
use opshub_tasks::ReportParams;

use crate::snapshot::StateSnapshot;
use crate::state::AppState;

use super::connection::ClientConnection;
use super::protocol::{ClientMessage, envelope};

/// GET /ws — upgrade and run the session.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let client_id = format!("conn_{}", Uuid::now_v7());
    ws.on_upgrade(move |socket| run_ws_session(socket, client_id, state))
}

/// Run one client session:
///
/// 1. registers the connection with the hub,
/// 2. forwards outbound frames and sends periodic pings, dropping
///    clients that stop answering,
/// 3. dispatches inbound frames; malformed ones are logged and dropped
///    with the connection left open,
/// 4. on disconnect, removes the connection and publishes
///    `agent:disconnected` when an agent identity was bound.
#[instrument(skip_all, fields(client_id = %client_id))]
async fn run_ws_session(ws: WebSocket, client_id: String, state: AppState) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(state.config.channel_capacity);
    let connection = Arc::new(ClientConnection::new(client_id.clone(), send_tx));

    let connection_start = std::time::Instant::now();
    info!("client connected");
    counter!("ws_connections_total").increment(1);
    state.hub.add(connection.clone()).await;

    let ping_interval = Duration::from_secs(state.config.heartbeat_interval_secs);
    let pong_timeout = Duration::from_secs(state.config.heartbeat_timeout_secs);

    // Outbound forwarder with heartbeat.
    let outbound_conn = connection.clone();
    let outbound = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        // Skip the immediate first tick.
        let _ = ticker.tick().await;
        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    match frame {
                        Some(text) => {
                            if ws_tx.send(Message::Text((*text).clone().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > pong_timeout
                    {
                        warn!("client unresponsive, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Inbound loop.
    while let Some(Ok(msg)) = ws_rx.next().await {
        let text = match msg {
            Message::Text(ref t) => t.to_string(),
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                continue;
            }
            Message::Binary(_) => continue,
        };

        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(message) => handle_client_message(&state, &connection, message).await,
            Err(error) => {
                // Malformed frames never close the connection.
                counter!("ws_malformed_frames_total").increment(1);
                warn!(%error, "malformed client frame dropped");
            }
        }
    }

    info!("client disconnected");
    counter!("ws_disconnections_total").increment(1);
    histogram!("ws_connection_duration_seconds").record(connection_start.elapsed().as_secs_f64());
    outbound.abort();
    state.hub.remove(&client_id).await;
    if let Some(name) = connection.agent_name() {
        state
            .bus
            .publish(DomainEvent::AgentDisconnected(AgentDisconnectedPayload {
                name,
            }));
    }
}

/// Dispatch one parsed client message.
async fn handle_client_message(
    state: &AppState,
    connection: &Arc<ClientConnection>,
    message: ClientMessage,
) {
    match message {
        ClientMessage::Subscribe { subscriptions } => {
            debug!(?subscriptions, "client subscribed");
            connection.subscribe_to(subscriptions);
            // Snapshot first, live events after.
            let snapshot =
                StateSnapshot::collect(&*state.store, state.config.snapshot_activity_limit);
            match serde_json::to_value(&snapshot)
                .map(|payload| envelope("state", payload))
                .and_then(|env| serde_json::to_string(&env))
            {
                Ok(json) => {
                    if !connection.send(Arc::new(json)) {
                        warn!("failed to enqueue state snapshot");
                    }
                }
                Err(error) => warn!(%error, "failed to serialize state snapshot"),
            }
        }
        ClientMessage::AgentRegister { name, role } => {
            register_agent(state, &name, role);
            connection.register_agent(name.clone());
            state
                .bus
                .publish(DomainEvent::AgentConnected(AgentConnectedPayload {
                    name,
                    session_id: None,
                }));
        }
        ClientMessage::AgentStatus { status, action } => {
            let Some(name) = connection.agent_name() else {
                warn!("agent:status before agent:register, dropped");
                return;
            };
            update_agent_status(state, &name, status, action);
        }
        ClientMessage::AgentProgress {
            task_id,
            progress,
            status,
            message,
            action,
        } => {
            let Some(name) = connection.agent_name() else {
                warn!("agent:progress before agent:register, dropped");
                return;
            };
            let params = ReportParams {
                progress,
                status,
                message,
                action,
            };
            if let Err(error) = state.tasks.report(&task_id, &name, params) {
                warn!(%task_id, %error, "progress report rejected");
            }
        }
        ClientMessage::AgentComplete { task_id, message } => {
            let Some(name) = connection.agent_name() else {
                warn!("agent:complete before agent:register, dropped");
                return;
            };
            let params = ReportParams {
                progress: Some(100),
                status: Some(TaskStatus::Done),
                message,
                action: None,
            };
            if let Err(error) = state.tasks.report(&task_id, &name, params) {
                warn!(%task_id, %error, "completion report rejected");
            }
        }
    }
}

/// Insert or refresh an agent record for a socket registration.
fn register_agent(state: &AppState, name: &str, role: Option<String>) {
    match state.store.agent_by_name(name) {
        Some(mut agent) => {
            if role.is_some() {
                agent.role = role;
            }
            if agent.status == CoreAgentStatus::Offline {
                agent.status = CoreAgentStatus::Idle;
            }
            agent.last_seen = Utc::now();
            if let Err(error) = state.store.update_agent(agent) {
                warn!(%name, %error, "failed to refresh agent");
            }
        }
        None => {
            let mut agent = Agent::register(name);
            agent.role = role;
            if let Err(error) = state.store.insert_agent(agent) {
                warn!(%name, %error, "failed to register agent");
            }
        }
    }
    info!(%name, "agent registered over socket");
}

fn update_agent_status(
    state: &AppState,
    name: &str,
    status: CoreAgentStatus,
    action: Option<String>,
) {
    let Some(mut agent) = state.store.agent_by_name(name) else {
        warn!(%name, "status report for unknown agent, dropped");
        return;
    };
    agent.status = status;
    agent.current_action = action;
    agent.last_seen = Utc::now();
    let payload = AgentUpdatedPayload {
        agent_id: agent.id.clone(),
        name: agent.name.clone(),
        status: agent.status,
        current_action: agent.current_action.clone(),
    };
    if let Err(error) = state.store.update_agent(agent) {
        warn!(%name, %error, "failed to update agent status");
        return;
    }
    state.bus.publish(DomainEvent::AgentUpdated(payload));
}

//! Notification fanout.
//!
//! Listens for new notes, board messages, and direct operator messages,
//! builds a recipient-specific context prompt for every agent that
//! should hear about it, and dispatches each prompt to the orchestrator
//! as an isolated fire-and-forget task. The coordinator's replies are
//! written back as coordinator-authored records and re-published so the
//! realtime hub forwards them; dispatches to other agents are one-way.
//!
//! Distribution list for a project event: the coordinator (unless it is
//! the author) plus every distinct non-coordinator agent holding at
//! least one open task in the project, excluding the author. Failures
//! and timeouts are logged and never retried; the originating request
//! completed before dispatch began.

use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, info, warn};

use opshub_core::comms::Note;
use opshub_core::ids::{MessageId, ProjectId};
use opshub_core::task::Task;
use opshub_events::{
    CoordinatorResponsePayload, DomainEvent, EventBus, EventHandler, EventKind, MessageNewPayload,
    NoteNewPayload,
};
use opshub_store::{RecordStore, TaskFilter};
use opshub_tasks::{VerificationNotifier, VerificationRequest};

use crate::orchestrator::OrchestratorClient;

/// What triggered a dispatch, for prompt building.
enum Trigger<'a> {
    Note(&'a NoteNewPayload),
    Message(&'a MessageNewPayload),
    Direct { author: &'a str, body: &'a str },
    Verification(&'a VerificationRequest),
}

impl Trigger<'_> {
    fn project_id(&self) -> Option<&ProjectId> {
        match self {
            Self::Note(p) => Some(&p.project_id),
            Self::Message(p) => p.project_id.as_ref(),
            Self::Verification(r) => Some(&r.task.project_id),
            Self::Direct { .. } => None,
        }
    }
}

/// Where a coordinator reply should land.
#[derive(Clone, Debug)]
enum DispatchOrigin {
    /// Reply becomes a coordinator note on this project.
    Project(ProjectId),
    /// Reply becomes a coordinator reply in this thread.
    Thread(MessageId),
    /// Reply is only re-published, nothing persisted.
    None,
}

/// Context-payload fanout to agents. Cheap to clone; all fields are
/// shared handles.
#[derive(Clone)]
pub struct NotifyPipeline {
    store: Arc<dyn RecordStore>,
    bus: EventBus,
    client: Arc<OrchestratorClient>,
    coordinator: String,
}

impl NotifyPipeline {
    /// Create a pipeline.
    pub fn new(
        store: Arc<dyn RecordStore>,
        bus: EventBus,
        client: Arc<OrchestratorClient>,
        coordinator: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bus,
            client,
            coordinator: coordinator.into(),
        }
    }

    /// Register on the bus for the kinds this pipeline consumes.
    pub fn subscribe(&self) {
        let handler: Arc<dyn EventHandler> = Arc::new(self.clone());
        for kind in [
            EventKind::NoteNew,
            EventKind::MessageNew,
            EventKind::UserMessage,
        ] {
            self.bus.subscribe(kind, handler.clone());
        }
    }

    /// Distribution list: coordinator (unless author) plus distinct
    /// non-coordinator agents with an open task in the project,
    /// excluding the author.
    fn recipients(&self, project_id: Option<&ProjectId>, author: &str) -> Vec<String> {
        let mut out = Vec::new();
        if author != self.coordinator {
            out.push(self.coordinator.clone());
        }
        if let Some(project_id) = project_id {
            let tasks = self.store.tasks(&TaskFilter {
                project_id: Some(project_id.clone()),
                ..TaskFilter::default()
            });
            for task in tasks {
                if !task.is_open() {
                    continue;
                }
                let Some(assignee) = task.assignee else {
                    continue;
                };
                if assignee == author || assignee == self.coordinator {
                    continue;
                }
                if !out.contains(&assignee) {
                    out.push(assignee);
                }
            }
        }
        out
    }

    fn open_tasks_for(&self, project_id: &ProjectId, agent: &str) -> Vec<Task> {
        self.store
            .tasks(&TaskFilter {
                project_id: Some(project_id.clone()),
                assignee: Some(agent.to_owned()),
                ..TaskFilter::default()
            })
            .into_iter()
            .filter(Task::is_open)
            .collect()
    }

    /// Build the recipient-specific prompt: project summary, recent
    /// notes, the recipient's open tasks, the trigger, and reply
    /// instructions.
    fn build_prompt(&self, recipient: &str, trigger: &Trigger<'_>) -> String {
        let mut prompt = String::new();
        prompt.push_str(&format!("You are agent {recipient} on the ops dashboard.\n"));

        if let Some(project_id) = trigger.project_id() {
            if let Ok(project) = self.store.project(project_id) {
                prompt.push_str(&format!(
                    "Project: {} ({}%, {})\n",
                    project.name, project.progress, project.status
                ));
            }
            let notes = self.store.notes_for_project(project_id);
            if !notes.is_empty() {
                prompt.push_str("Recent notes:\n");
                for note in notes.iter().take(5) {
                    prompt.push_str(&format!("- [{}] {}\n", note.author, note.body));
                }
            }
            let tasks = self.open_tasks_for(project_id, recipient);
            if !tasks.is_empty() {
                prompt.push_str("Your open tasks:\n");
                for task in &tasks {
                    prompt.push_str(&format!(
                        "- {} ({}, {}%)\n",
                        task.title, task.status, task.progress
                    ));
                }
            }
        }

        match trigger {
            Trigger::Note(p) => {
                prompt.push_str(&format!("New note from {}: {}\n", p.author, p.body));
            }
            Trigger::Message(p) => {
                prompt.push_str(&format!("New message from {}: {}\n", p.author, p.body));
            }
            Trigger::Direct { author, body } => {
                prompt.push_str(&format!("Direct message from {author}: {body}\n"));
            }
            Trigger::Verification(r) => {
                prompt.push_str(&format!(
                    "{} reports task \"{}\" complete. Review the work and verify or reopen it.\n",
                    r.reporter, r.task.title
                ));
            }
        }
        prompt.push_str("Reply with a short status response; it will be posted on your behalf.\n");
        prompt
    }

    fn fan_out(&self, trigger: &Trigger<'_>, author: &str, coordinator_origin: DispatchOrigin) {
        for recipient in self.recipients(trigger.project_id(), author) {
            let prompt = self.build_prompt(&recipient, trigger);
            let origin = if recipient == self.coordinator {
                coordinator_origin.clone()
            } else {
                DispatchOrigin::None
            };
            // Each dispatch is its own task so a slow or failing one
            // cannot hold up siblings.
            drop(tokio::spawn(self.clone().dispatch(recipient, prompt, origin)));
        }
    }

    /// Dispatch one prompt. Coordinator replies are written back;
    /// everything else is one-way.
    async fn dispatch(self, recipient: String, prompt: String, origin: DispatchOrigin) {
        let kind = if recipient == self.coordinator {
            "coordinator"
        } else {
            "agent"
        };
        counter!("dispatches_total", "recipient" => kind).increment(1);

        match self.client.send_prompt(&recipient, &prompt).await {
            Ok(reply) => {
                debug!(%recipient, "dispatch delivered");
                if recipient == self.coordinator && !reply.is_empty() {
                    self.write_back(&reply, origin);
                }
            }
            Err(error) => {
                counter!("dispatch_failures_total").increment(1);
                warn!(%recipient, %error, "dispatch failed");
            }
        }
    }

    /// Persist a coordinator reply and re-publish it so the hub forwards
    /// it to connected UIs.
    fn write_back(&self, reply: &str, origin: DispatchOrigin) {
        match origin {
            DispatchOrigin::Project(project_id) => {
                let note = Note::new(project_id.clone(), self.coordinator.clone(), reply);
                if let Err(error) = self.store.insert_note(note.clone()) {
                    warn!(%error, "failed to persist coordinator note");
                    return;
                }
                let project_name = self
                    .store
                    .project(&project_id)
                    .map(|p| p.name)
                    .unwrap_or_default();
                self.bus.publish(DomainEvent::NoteNew(NoteNewPayload {
                    note_id: note.id,
                    project_id,
                    project_name,
                    author: self.coordinator.clone(),
                    body: reply.to_owned(),
                }));
                self.publish_response(reply, None);
            }
            DispatchOrigin::Thread(message_id) => match self.store.message(&message_id) {
                Ok(mut message) => {
                    message.add_reply(self.coordinator.clone(), reply);
                    if let Err(error) = self.store.update_message(message.clone()) {
                        warn!(%error, "failed to persist coordinator reply");
                        return;
                    }
                    self.bus.publish(DomainEvent::MessageNew(MessageNewPayload {
                        message_id: message.id.clone(),
                        project_id: message.project_id.clone(),
                        author: self.coordinator.clone(),
                        body: reply.to_owned(),
                        in_reply_to: Some(message.id.clone()),
                    }));
                    self.publish_response(reply, Some(message_id));
                }
                Err(error) => warn!(%error, "reply target message vanished"),
            },
            DispatchOrigin::None => {
                self.publish_response(reply, None);
            }
        }
        info!("coordinator reply written back");
    }

    fn publish_response(&self, body: &str, in_reply_to: Option<MessageId>) {
        self.bus
            .publish(DomainEvent::CoordinatorResponse(CoordinatorResponsePayload {
                body: body.to_owned(),
                in_reply_to,
            }));
    }
}

#[async_trait]
impl EventHandler for NotifyPipeline {
    async fn handle(
        &self,
        event: DomainEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match &event {
            DomainEvent::NoteNew(p) => {
                // Coordinator-authored notes are write-backs; fanning
                // them back to the coordinator would echo forever.
                let origin = DispatchOrigin::Project(p.project_id.clone());
                self.fan_out(&Trigger::Note(p), &p.author, origin);
            }
            DomainEvent::MessageNew(p) => {
                if p.in_reply_to.is_some() && p.author == self.coordinator {
                    return Ok(());
                }
                let origin = DispatchOrigin::Thread(p.message_id.clone());
                self.fan_out(&Trigger::Message(p), &p.author, origin);
            }
            DomainEvent::UserMessage(p) => {
                let origin = DispatchOrigin::Thread(p.message_id.clone());
                self.fan_out(
                    &Trigger::Direct {
                        author: &p.author,
                        body: &p.body,
                    },
                    &p.author,
                    origin,
                );
            }
            _ => {}
        }
        Ok(())
    }
}

impl VerificationNotifier for NotifyPipeline {
    fn request_verification(&self, request: VerificationRequest) {
        let prompt = self.build_prompt(&self.coordinator, &Trigger::Verification(&request));
        let recipient = self.coordinator.clone();
        let origin = DispatchOrigin::Project(request.task.project_id.clone());
        drop(tokio::spawn(self.clone().dispatch(recipient, prompt, origin)));
    }
}

//! Business logic layer for task delegation.
//!
//! Wraps the record store with the transition rules, activity logging,
//! and event emission. Key rules:
//!
//! - **First-reporter-claims**: a report against an unassigned task makes
//!   the reporter the assignee, so agents can self-report without a prior
//!   explicit assignment.
//! - **Last write wins**: an explicit `assign` landing after a
//!   first-reporter claim overwrites the claim with a fresh assignment.
//! - **Auto-timestamps**: `completed_at` set on the transition into
//!   `done`, cleared when the task leaves `done`.
//! - **Rollup**: every status change recomputes the owning project's
//!   progress and derived status.
//! - Every transition publishes `task:updated`; a transition into `done`
//!   requests verification unless the reporter is the verifier itself.

use chrono::Utc;
use metrics::counter;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info};

use opshub_core::ids::{ActivityId, ProjectId, TaskId};
use opshub_core::lifecycle::{derive_project_status, derive_status, project_progress};
use opshub_core::project::Project;
use opshub_core::task::{
    ActivityEntry, AgentResponse, Assignment, StatusEntry, Task, TaskPriority, TaskStatus,
};
use opshub_events::{DomainEvent, EventBus, TaskUpdatedPayload};
use opshub_store::{RecordStore, TaskFilter};

use crate::error::TaskError;

/// A request for the verifier to review a completed task.
#[derive(Clone, Debug)]
pub struct VerificationRequest {
    /// The task that just went done.
    pub task: Task,
    /// Owning project's display name.
    pub project_name: String,
    /// The agent that reported completion.
    pub reporter: String,
}

/// Sink for verification requests. The notification pipeline implements
/// this; dispatch is fire-and-forget from the service's point of view.
pub trait VerificationNotifier: Send + Sync {
    /// Queue a verification request. Must not block.
    fn request_verification(&self, request: VerificationRequest);
}

/// Parameters for a progress report.
#[derive(Clone, Debug, Default)]
pub struct ReportParams {
    /// Reported progress, 0–100. Absent means "no progress change".
    pub progress: Option<u8>,
    /// Explicit status override. Wins over derivation.
    pub status: Option<TaskStatus>,
    /// Free-text message.
    pub message: Option<String>,
    /// What the agent is currently doing.
    pub action: Option<String>,
}

/// Task service with transition rules and validation.
pub struct TaskService {
    store: Arc<dyn RecordStore>,
    bus: EventBus,
    /// Callsign of the verifier (the coordinator).
    verifier_name: String,
    notifier: RwLock<Option<Arc<dyn VerificationNotifier>>>,
    /// Serializes transitions so read-modify-write cycles on a task and
    /// its project rollup never interleave.
    transition_lock: Mutex<()>,
}

impl TaskService {
    /// Create a service over the given store and bus.
    pub fn new(store: Arc<dyn RecordStore>, bus: EventBus, verifier_name: impl Into<String>) -> Self {
        Self {
            store,
            bus,
            verifier_name: verifier_name.into(),
            notifier: RwLock::new(None),
            transition_lock: Mutex::new(()),
        }
    }

    /// Wire the verification sink. Called once at startup.
    pub fn set_notifier(&self, notifier: Arc<dyn VerificationNotifier>) {
        *self.notifier.write() = Some(notifier);
    }

    /// Create a project.
    pub fn create_project(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        actor: &str,
    ) -> Result<Project, TaskError> {
        let mut project = Project::new(name);
        project.description = description;
        self.store.insert_project(project.clone())?;
        self.log_activity(&project.id, None, actor, "project_created", Some(&project.name))?;
        info!(project = %project.id, name = %project.name, "project created");
        Ok(project)
    }

    /// Create a pending task in a project.
    pub fn create_task(
        &self,
        project_id: &ProjectId,
        title: impl Into<String>,
        description: Option<String>,
        priority: Option<TaskPriority>,
        actor: &str,
    ) -> Result<Task, TaskError> {
        let project = self.store.project(project_id)?;
        let mut task = Task::new(project_id.clone(), title);
        task.description = description;
        if let Some(p) = priority {
            task.priority = p;
        }
        self.store.insert_task(task.clone())?;
        self.log_activity(project_id, Some(&task.id), actor, "created", Some(&task.title))?;
        self.publish_task_updated(&task, &project.name, actor);
        Ok(task)
    }

    /// Delegate a task to an agent.
    ///
    /// Always creates a fresh [`Assignment`]; re-assignment (including one
    /// racing a first-reporter claim) overwrites the assignee — last
    /// write wins. Leaving `done` via re-assignment clears the
    /// completion and verification fields.
    pub fn assign(
        &self,
        task_id: &TaskId,
        to: &str,
        by: &str,
        parent_task_id: Option<TaskId>,
    ) -> Result<Task, TaskError> {
        let _guard = self.transition_lock.lock();
        counter!("task_transitions_total", "action" => "assign").increment(1);

        let mut task = self.store.task(task_id)?;
        let was_done = task.status == TaskStatus::Done;

        let assignment = Assignment::open(task_id.clone(), to, by, parent_task_id);
        self.store.insert_assignment(assignment)?;

        task.status = TaskStatus::Assigned;
        task.assignee = Some(to.to_owned());
        task.assigned_by = Some(by.to_owned());
        if was_done {
            task.completed_at = None;
            task.progress = 0;
            self.clear_verification(&mut task);
        }
        task.updated_at = Utc::now();
        self.store.update_task(task.clone())?;

        self.log_activity(
            &task.project_id,
            Some(task_id),
            by,
            "assigned",
            Some(&format!("{} -> {to}", task.title)),
        )?;
        let project = self.recompute_project(&task.project_id)?;
        self.publish_task_updated(&task, &project.name, by);
        Ok(task)
    }

    /// Record a progress report from an agent.
    pub fn report(
        &self,
        task_id: &TaskId,
        agent: &str,
        params: ReportParams,
    ) -> Result<Task, TaskError> {
        let _guard = self.transition_lock.lock();
        counter!("task_transitions_total", "action" => "report").increment(1);

        let mut task = self.store.task(task_id)?;
        let old_status = task.status;
        let now = Utc::now();

        // First-reporter-claims: an unassigned task is claimed by whoever
        // reports against it first.
        if task.assignee.is_none() {
            task.assignee = Some(agent.to_owned());
            if self.store.latest_assignment(task_id).is_none() {
                self.store
                    .insert_assignment(Assignment::open(task_id.clone(), agent, agent, None))?;
            }
            debug!(task = %task_id, %agent, "task claimed by first reporter");
        }

        let new_status = derive_status(old_status, params.progress.unwrap_or(0), params.status);
        if let Some(p) = params.progress {
            task.progress = p.min(100);
        }
        if new_status == TaskStatus::Done {
            task.progress = 100;
        } else if task.progress >= 100 {
            // Progress 100 is reserved for done; an explicit non-done
            // status (e.g. blocked at the finish line) caps it just below.
            task.progress = 99;
        }
        task.status = new_status;
        if new_status == TaskStatus::Done && old_status != TaskStatus::Done {
            task.completed_at = Some(now);
        }
        if new_status != TaskStatus::Done && old_status == TaskStatus::Done {
            task.completed_at = None;
            self.clear_verification(&mut task);
        }
        task.updated_at = now;
        self.store.update_task(task.clone())?;

        // Append to the live assignment's trail.
        if let Some(mut assignment) = self.store.latest_assignment(task_id) {
            assignment.responses.push(AgentResponse {
                agent_name: agent.to_owned(),
                message: params.message.clone(),
                progress: task.progress,
                action: params.action.clone(),
                timestamp: now,
            });
            assignment.progress = task.progress;
            assignment.current_action = params.action;
            if new_status != old_status {
                assignment.status_history.push(StatusEntry {
                    status: new_status,
                    changed_at: now,
                    changed_by: agent.to_owned(),
                    note: params.message.clone(),
                });
            }
            self.store.update_assignment(assignment)?;
        }

        self.log_activity(
            &task.project_id,
            Some(task_id),
            agent,
            "reported",
            params.message.as_deref(),
        )?;

        let project = if new_status == old_status {
            self.store.project(&task.project_id)?
        } else {
            self.recompute_project(&task.project_id)?
        };
        self.publish_task_updated(&task, &project.name, agent);

        if new_status == TaskStatus::Done && old_status != TaskStatus::Done {
            self.maybe_request_verification(&task, &project.name, agent);
        }
        Ok(task)
    }

    /// Sign off a completed task.
    pub fn verify(
        &self,
        task_id: &TaskId,
        by: &str,
        message: Option<String>,
    ) -> Result<Task, TaskError> {
        let _guard = self.transition_lock.lock();
        counter!("task_transitions_total", "action" => "verify").increment(1);

        let mut task = self.store.task(task_id)?;
        if task.status != TaskStatus::Done {
            return Err(TaskError::InvalidTransition(format!(
                "verify requires done, task is {}",
                task.status
            )));
        }
        task.verified = true;
        task.verified_by = Some(by.to_owned());
        task.verified_at = Some(Utc::now());
        task.updated_at = Utc::now();
        self.store.update_task(task.clone())?;

        self.log_activity(
            &task.project_id,
            Some(task_id),
            by,
            "verified",
            message.as_deref(),
        )?;
        let project = self.store.project(&task.project_id)?;
        self.publish_task_updated(&task, &project.name, by);
        Ok(task)
    }

    /// Send a task back for more work.
    pub fn reopen(
        &self,
        task_id: &TaskId,
        by: &str,
        message: Option<String>,
    ) -> Result<Task, TaskError> {
        let _guard = self.transition_lock.lock();
        counter!("task_transitions_total", "action" => "reopen").increment(1);

        let mut task = self.store.task(task_id)?;
        let now = Utc::now();
        task.status = TaskStatus::InProgress;
        task.progress = 0;
        task.completed_at = None;
        self.clear_verification(&mut task);
        task.updated_at = now;
        self.store.update_task(task.clone())?;

        if let Some(mut assignment) = self.store.latest_assignment(task_id) {
            assignment.status_history.push(StatusEntry {
                status: TaskStatus::InProgress,
                changed_at: now,
                changed_by: by.to_owned(),
                note: message.clone(),
            });
            assignment.progress = 0;
            self.store.update_assignment(assignment)?;
        }

        self.log_activity(
            &task.project_id,
            Some(task_id),
            by,
            "reopened",
            message.as_deref(),
        )?;
        let project = self.recompute_project(&task.project_id)?;
        self.publish_task_updated(&task, &project.name, by);
        Ok(task)
    }

    // ── internals ────────────────────────────────────────────────────────

    fn clear_verification(&self, task: &mut Task) {
        task.verified = false;
        task.verified_by = None;
        task.verified_at = None;
    }

    /// Recompute the owning project's progress and derived status.
    fn recompute_project(&self, project_id: &ProjectId) -> Result<Project, TaskError> {
        let mut project = self.store.project(project_id)?;
        let tasks = self.store.tasks(&TaskFilter {
            project_id: Some(project_id.clone()),
            ..TaskFilter::default()
        });
        let total = tasks.len();
        let done = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Done)
            .count();
        project.progress = project_progress(done, total);
        project.status = derive_project_status(project.status, done, total);
        project.updated_at = Utc::now();
        self.store.update_project(project.clone())?;
        debug!(project = %project_id, done, total, progress = project.progress, "project recomputed");
        Ok(project)
    }

    fn log_activity(
        &self,
        project_id: &ProjectId,
        task_id: Option<&TaskId>,
        actor: &str,
        action: &str,
        detail: Option<&str>,
    ) -> Result<(), TaskError> {
        self.store.append_activity(ActivityEntry {
            id: ActivityId::new(),
            project_id: project_id.clone(),
            task_id: task_id.cloned(),
            actor: actor.to_owned(),
            action: action.to_owned(),
            detail: detail.map(str::to_owned),
            created_at: Utc::now(),
        })?;
        Ok(())
    }

    fn publish_task_updated(&self, task: &Task, project_name: &str, actor: &str) {
        self.bus.publish(DomainEvent::TaskUpdated(TaskUpdatedPayload {
            task_id: task.id.clone(),
            project_id: task.project_id.clone(),
            project_name: project_name.to_owned(),
            title: task.title.clone(),
            status: task.status,
            progress: task.progress,
            assignee: task.assignee.clone(),
            actor: actor.to_owned(),
        }));
    }

    fn maybe_request_verification(&self, task: &Task, project_name: &str, reporter: &str) {
        // No self-verification loop: the verifier reporting its own task
        // done must not be asked to verify it.
        if reporter == self.verifier_name {
            return;
        }
        if let Some(notifier) = self.notifier.read().as_ref() {
            counter!("verification_requests_total").increment(1);
            notifier.request_verification(VerificationRequest {
                task: task.clone(),
                project_name: project_name.to_owned(),
                reporter: reporter.to_owned(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use opshub_core::project::ProjectStatus;
    use opshub_store::MemoryStore;

    const VERIFIER: &str = "ATLAS";

    fn service() -> TaskService {
        TaskService::new(Arc::new(MemoryStore::new()), EventBus::new(), VERIFIER)
    }

    fn seeded(service: &TaskService) -> (Project, Task) {
        let project = service
            .create_project("Mesh rollout", None, "operator")
            .unwrap();
        let task = service
            .create_task(&project.id, "Flash firmware", None, None, "operator")
            .unwrap();
        (project, task)
    }

    #[test]
    fn assign_sets_assignee_and_seeds_history() {
        let svc = service();
        let (_, task) = seeded(&svc);

        let task = svc.assign(&task.id, "Scout", VERIFIER, None).unwrap();
        assert_eq!(task.status, TaskStatus::Assigned);
        assert_eq!(task.assignee.as_deref(), Some("Scout"));

        let assignment = svc.store.latest_assignment(&task.id).unwrap();
        assert_eq!(assignment.status_history.len(), 2);
        assert_eq!(assignment.status_history[0].status, TaskStatus::Pending);
        assert_eq!(assignment.status_history[1].status, TaskStatus::Assigned);
    }

    #[test]
    fn report_progress_drives_status() {
        let svc = service();
        let (project, task) = seeded(&svc);
        let _ = svc.assign(&task.id, "Scout", VERIFIER, None).unwrap();

        let task = svc
            .report(
                &task.id,
                "Scout",
                ReportParams {
                    progress: Some(40),
                    ..ReportParams::default()
                },
            )
            .unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.progress, 40);
        assert!(task.completed_at.is_none());

        let task = svc
            .report(
                &task.id,
                "Scout",
                ReportParams {
                    progress: Some(100),
                    ..ReportParams::default()
                },
            )
            .unwrap();
        assert_eq!(task.status, TaskStatus::Done);
        assert!(task.completed_at.is_some());

        // Project rollup: single task, done.
        let project = svc.store.project(&project.id).unwrap();
        assert_eq!(project.progress, 100);
        assert_eq!(project.status, ProjectStatus::Completed);
    }

    #[test]
    fn zero_progress_report_does_not_regress_status() {
        let svc = service();
        let (_, task) = seeded(&svc);
        let _ = svc.assign(&task.id, "Scout", VERIFIER, None).unwrap();
        let task = svc
            .report(&task.id, "Scout", ReportParams::default())
            .unwrap();
        assert_eq!(task.status, TaskStatus::Assigned);
    }

    #[test]
    fn explicit_status_wins_over_progress() {
        let svc = service();
        let (_, task) = seeded(&svc);
        let task = svc
            .report(
                &task.id,
                "Scout",
                ReportParams {
                    progress: Some(100),
                    status: Some(TaskStatus::Blocked),
                    ..ReportParams::default()
                },
            )
            .unwrap();
        assert_eq!(task.status, TaskStatus::Blocked);
        assert!(task.completed_at.is_none());
        // Full progress is reserved for done; the blocked task is capped
        // just under it.
        assert_eq!(task.progress, 99);
    }

    #[test]
    fn leaving_done_by_explicit_status_caps_progress() {
        let svc = service();
        let (_, task) = seeded(&svc);
        let _ = svc
            .report(
                &task.id,
                "Scout",
                ReportParams {
                    progress: Some(100),
                    ..ReportParams::default()
                },
            )
            .unwrap();

        let task = svc
            .report(
                &task.id,
                "Scout",
                ReportParams {
                    status: Some(TaskStatus::Blocked),
                    ..ReportParams::default()
                },
            )
            .unwrap();
        assert_eq!(task.status, TaskStatus::Blocked);
        assert!(task.progress < 100);
        assert!(task.completed_at.is_none());
        assert!(!task.verified);
    }

    #[test]
    fn first_reporter_claims_unassigned_task() {
        let svc = service();
        let (_, task) = seeded(&svc);

        let task = svc
            .report(
                &task.id,
                "Relay",
                ReportParams {
                    progress: Some(10),
                    ..ReportParams::default()
                },
            )
            .unwrap();
        assert_eq!(task.assignee.as_deref(), Some("Relay"));
        // An implicit self-assignment was opened.
        let assignment = svc.store.latest_assignment(&task.id).unwrap();
        assert_eq!(assignment.assigned_to, "Relay");
        assert_eq!(assignment.assigned_by, "Relay");
        assert_eq!(assignment.responses.len(), 1);
    }

    #[test]
    fn explicit_assign_overrides_reporter_claim() {
        // Last write wins on the claim/assign race.
        let svc = service();
        let (_, task) = seeded(&svc);

        let _ = svc
            .report(
                &task.id,
                "Relay",
                ReportParams {
                    progress: Some(10),
                    ..ReportParams::default()
                },
            )
            .unwrap();
        let task = svc.assign(&task.id, "Scout", VERIFIER, None).unwrap();
        assert_eq!(task.assignee.as_deref(), Some("Scout"));
        // Two assignments now exist; histories are never rewritten.
        assert_eq!(svc.store.assignments_for_task(&task.id).len(), 2);
    }

    #[test]
    fn verify_requires_done() {
        let svc = service();
        let (_, task) = seeded(&svc);
        assert_matches!(
            svc.verify(&task.id, VERIFIER, None),
            Err(TaskError::InvalidTransition(_))
        );

        let _ = svc
            .report(
                &task.id,
                "Scout",
                ReportParams {
                    progress: Some(100),
                    ..ReportParams::default()
                },
            )
            .unwrap();
        let task = svc.verify(&task.id, VERIFIER, None).unwrap();
        assert!(task.verified);
        assert_eq!(task.verified_by.as_deref(), Some(VERIFIER));
        assert_eq!(task.status, TaskStatus::Done);
    }

    #[test]
    fn reopen_clears_completion_and_verification() {
        let svc = service();
        let (project, task) = seeded(&svc);
        let _ = svc
            .report(
                &task.id,
                "Scout",
                ReportParams {
                    progress: Some(100),
                    ..ReportParams::default()
                },
            )
            .unwrap();
        let _ = svc.verify(&task.id, VERIFIER, None).unwrap();

        let task = svc.reopen(&task.id, VERIFIER, Some("tests missing".into())).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.progress, 0);
        assert!(!task.verified);
        assert!(task.verified_by.is_none());
        assert!(task.completed_at.is_none());

        // Completed project drops back on recompute; with its only task
        // reopened, nothing is done, so it lands on not_started.
        let project = svc.store.project(&project.id).unwrap();
        assert_eq!(project.status, ProjectStatus::NotStarted);
        assert_eq!(project.progress, 0);

        // The reopen landed on the assignment trail.
        let assignment = svc.store.latest_assignment(&task.id).unwrap();
        let last = assignment.status_history.last().unwrap();
        assert_eq!(last.status, TaskStatus::InProgress);
        assert_eq!(last.changed_by, VERIFIER);
    }

    #[test]
    fn project_status_derivation_across_tasks() {
        let svc = service();
        let project = svc.create_project("Ops", None, "operator").unwrap();
        let t1 = svc
            .create_task(&project.id, "one", None, None, "operator")
            .unwrap();
        let _t2 = svc
            .create_task(&project.id, "two", None, None, "operator")
            .unwrap();

        let _ = svc
            .report(
                &t1.id,
                "Scout",
                ReportParams {
                    progress: Some(100),
                    ..ReportParams::default()
                },
            )
            .unwrap();

        let project = svc.store.project(&project.id).unwrap();
        assert_eq!(project.progress, 50);
        assert_eq!(project.status, ProjectStatus::InProgress);
    }

    struct CaptureNotifier(Mutex<Vec<VerificationRequest>>);

    impl VerificationNotifier for CaptureNotifier {
        fn request_verification(&self, request: VerificationRequest) {
            self.0.lock().push(request);
        }
    }

    #[test]
    fn done_transition_requests_verification() {
        let svc = service();
        let capture = Arc::new(CaptureNotifier(Mutex::new(Vec::new())));
        svc.set_notifier(capture.clone());
        let (_, task) = seeded(&svc);

        let _ = svc
            .report(
                &task.id,
                "Scout",
                ReportParams {
                    progress: Some(100),
                    ..ReportParams::default()
                },
            )
            .unwrap();

        let requests = capture.0.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].reporter, "Scout");
        assert_eq!(requests[0].task.status, TaskStatus::Done);
    }

    #[test]
    fn verifier_completing_its_own_task_skips_verification() {
        let svc = service();
        let capture = Arc::new(CaptureNotifier(Mutex::new(Vec::new())));
        svc.set_notifier(capture.clone());
        let (_, task) = seeded(&svc);

        let _ = svc
            .report(
                &task.id,
                VERIFIER,
                ReportParams {
                    progress: Some(100),
                    ..ReportParams::default()
                },
            )
            .unwrap();
        assert!(capture.0.lock().is_empty());
    }

    #[test]
    fn repeated_done_reports_request_verification_once() {
        let svc = service();
        let capture = Arc::new(CaptureNotifier(Mutex::new(Vec::new())));
        svc.set_notifier(capture.clone());
        let (_, task) = seeded(&svc);

        for _ in 0..2 {
            let _ = svc
                .report(
                    &task.id,
                    "Scout",
                    ReportParams {
                        progress: Some(100),
                        ..ReportParams::default()
                    },
                )
                .unwrap();
        }
        // Only the transition into done queues a request.
        assert_eq!(capture.0.lock().len(), 1);
    }
}

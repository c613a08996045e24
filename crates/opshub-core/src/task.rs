//! Task and assignment records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::ids::{AssignmentId, ProjectId, TaskId};

/// Lifecycle status of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet delegated.
    Pending,
    /// Delegated to an agent, no progress reported yet.
    Assigned,
    /// An agent has reported partial progress.
    InProgress,
    /// Reported complete.
    Done,
    /// Explicitly blocked; returns only via an explicit status report.
    Blocked,
}

impl TaskStatus {
    /// Wire/storage string for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Blocked => "blocked",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "assigned" => Ok(Self::Assigned),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "blocked" => Ok(Self::Blocked),
            other => Err(CoreError::UnknownVariant {
                kind: "task status",
                value: other.to_owned(),
            }),
        }
    }
}

/// Priority of a task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Background work.
    Low,
    /// Normal priority.
    #[default]
    Medium,
    /// Should be picked up soon.
    High,
    /// Drop everything.
    Critical,
}

/// A unit of work inside a project, delegated to agents.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task ID.
    pub id: TaskId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Short title.
    pub title: String,
    /// Longer description, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Priority.
    pub priority: TaskPriority,
    /// Agent callsign currently responsible, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Who delegated the task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_by: Option<String>,
    /// Completion percentage, 0–100.
    pub progress: u8,
    /// Whether a verifier signed off after completion.
    pub verified: bool,
    /// Who verified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
    /// When verification happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    /// When the task first reached `done`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a fresh pending task.
    pub fn new(project_id: ProjectId, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            project_id,
            title: title.into(),
            description: None,
            status: TaskStatus::Pending,
            priority: TaskPriority::default(),
            assignee: None,
            assigned_by: None,
            progress: 0,
            verified: false,
            verified_by: None,
            verified_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the task counts as open (not done).
    pub fn is_open(&self) -> bool {
        self.status != TaskStatus::Done
    }
}

/// One entry in an assignment's status history. Append-only.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    /// Task status at this point.
    pub status: TaskStatus,
    /// When the entry was appended.
    pub changed_at: DateTime<Utc>,
    /// Who caused the change.
    pub changed_by: String,
    /// Free-text note, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One progress report from an agent. Append-only, arrival order.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    /// Reporting agent's callsign.
    pub agent_name: String,
    /// Free-text message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Reported progress, 0–100.
    pub progress: u8,
    /// What the agent is currently doing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Arrival time.
    pub timestamp: DateTime<Utc>,
}

/// The record of one delegation of a task to an agent.
///
/// Re-assignment never mutates an existing assignment's history; it creates
/// a new `Assignment`. `status_history` and `responses` are append-only.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Unique assignment ID.
    pub id: AssignmentId,
    /// The task being delegated.
    pub task_id: TaskId,
    /// Receiving agent callsign.
    pub assigned_to: String,
    /// Delegating identity.
    pub assigned_by: String,
    /// Parent task for hierarchical sub-assignment, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<TaskId>,
    /// Append-only status trail.
    pub status_history: Vec<StatusEntry>,
    /// Append-only progress reports in arrival order.
    pub responses: Vec<AgentResponse>,
    /// What the assignee last said it was doing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_action: Option<String>,
    /// Latest reported progress, 0–100.
    pub progress: u8,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Assignment {
    /// Create an assignment seeded with the two-entry history required for
    /// a fresh delegation: `pending` at creation and `assigned` now.
    pub fn open(
        task_id: TaskId,
        assigned_to: impl Into<String>,
        assigned_by: impl Into<String>,
        parent_task_id: Option<TaskId>,
    ) -> Self {
        let now = Utc::now();
        let assigned_by = assigned_by.into();
        Self {
            id: AssignmentId::new(),
            task_id,
            assigned_to: assigned_to.into(),
            assigned_by: assigned_by.clone(),
            parent_task_id,
            status_history: vec![
                StatusEntry {
                    status: TaskStatus::Pending,
                    changed_at: now,
                    changed_by: assigned_by.clone(),
                    note: Some("assignment created".into()),
                },
                StatusEntry {
                    status: TaskStatus::Assigned,
                    changed_at: now,
                    changed_by: assigned_by,
                    note: None,
                },
            ],
            responses: Vec::new(),
            current_action: None,
            progress: 0,
            created_at: now,
        }
    }
}

/// Activity-log entry written on every task transition.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    /// Unique entry ID.
    pub id: crate::ids::ActivityId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Related task, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Who acted.
    pub actor: String,
    /// What happened (e.g. `assigned`, `reported`, `verified`, `reopened`).
    pub action: String,
    /// Free-text detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// When it happened.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for s in [
            TaskStatus::Pending,
            TaskStatus::Assigned,
            TaskStatus::InProgress,
            TaskStatus::Done,
            TaskStatus::Blocked,
        ] {
            let back: TaskStatus = s.as_str().parse().unwrap();
            assert_eq!(back, s);
        }
    }

    #[test]
    fn status_unknown_is_error() {
        let r: Result<TaskStatus, _> = "bogus".parse();
        assert!(r.is_err());
    }

    #[test]
    fn status_serde_is_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn new_task_is_pending() {
        let task = Task::new(ProjectId::from("p1"), "Scan the perimeter");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0);
        assert!(!task.verified);
        assert!(task.assignee.is_none());
        assert!(task.is_open());
    }

    #[test]
    fn open_assignment_has_two_entry_history() {
        let a = Assignment::open(TaskId::new(), "Scout", "ATLAS", None);
        assert_eq!(a.status_history.len(), 2);
        assert_eq!(a.status_history[0].status, TaskStatus::Pending);
        assert_eq!(a.status_history[1].status, TaskStatus::Assigned);
        assert_eq!(a.assigned_to, "Scout");
        assert_eq!(a.assigned_by, "ATLAS");
        assert!(a.responses.is_empty());
    }

    #[test]
    fn task_wire_format_is_camel_case() {
        let task = Task::new(ProjectId::from("p1"), "t");
        let v: serde_json::Value = serde_json::to_value(&task).unwrap();
        assert!(v.get("projectId").is_some());
        assert!(v.get("createdAt").is_some());
        // None fields are omitted entirely
        assert!(v.get("assignee").is_none());
        assert!(v.get("completedAt").is_none());
    }

    #[test]
    fn priority_ordering() {
        assert!(TaskPriority::Critical > TaskPriority::High);
        assert!(TaskPriority::High > TaskPriority::Medium);
        assert!(TaskPriority::Medium > TaskPriority::Low);
    }
}

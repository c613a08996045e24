//! The record store trait.

use opshub_core::agent::Agent;
use opshub_core::comms::{Note, ThreadMessage};
use opshub_core::ids::{AgentId, MessageId, NoteId, ProjectId, TaskId};
use opshub_core::project::Project;
use opshub_core::task::{ActivityEntry, Assignment, Task, TaskStatus};

use crate::error::StoreError;

/// Filter for task listings. Empty filter matches everything.
#[derive(Clone, Debug, Default)]
pub struct TaskFilter {
    /// Restrict to one project.
    pub project_id: Option<ProjectId>,
    /// Restrict to tasks assigned to this agent callsign.
    pub assignee: Option<String>,
    /// Restrict to one status.
    pub status: Option<TaskStatus>,
}

impl TaskFilter {
    /// Whether a task passes this filter.
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(p) = &self.project_id
            && *p != task.project_id
        {
            return false;
        }
        if let Some(a) = &self.assignee
            && task.assignee.as_deref() != Some(a.as_str())
        {
            return false;
        }
        if let Some(s) = self.status
            && task.status != s
        {
            return false;
        }
        true
    }
}

/// The persistence boundary. Durable storage is an external collaborator;
/// the server and tests run against [`crate::MemoryStore`].
///
/// Update methods replace the whole record by ID and fail with
/// [`StoreError::NotFound`] if it does not exist.
pub trait RecordStore: Send + Sync {
    // -- Projects --

    /// Insert a project.
    fn insert_project(&self, project: Project) -> Result<(), StoreError>;
    /// Look up a project.
    fn project(&self, id: &ProjectId) -> Result<Project, StoreError>;
    /// All projects, newest first.
    fn projects(&self) -> Vec<Project>;
    /// Replace a project.
    fn update_project(&self, project: Project) -> Result<(), StoreError>;

    // -- Tasks --

    /// Insert a task.
    fn insert_task(&self, task: Task) -> Result<(), StoreError>;
    /// Look up a task.
    fn task(&self, id: &TaskId) -> Result<Task, StoreError>;
    /// Tasks matching the filter, newest first.
    fn tasks(&self, filter: &TaskFilter) -> Vec<Task>;
    /// Replace a task.
    fn update_task(&self, task: Task) -> Result<(), StoreError>;

    // -- Assignments --

    /// Insert an assignment.
    fn insert_assignment(&self, assignment: Assignment) -> Result<(), StoreError>;
    /// All assignments for a task, oldest first.
    fn assignments_for_task(&self, task_id: &TaskId) -> Vec<Assignment>;
    /// The most recent assignment for a task, if any.
    fn latest_assignment(&self, task_id: &TaskId) -> Option<Assignment>;
    /// Replace an assignment.
    fn update_assignment(&self, assignment: Assignment) -> Result<(), StoreError>;

    // -- Agents --

    /// Insert an agent. Fails with [`StoreError::Conflict`] if the
    /// callsign is taken.
    fn insert_agent(&self, agent: Agent) -> Result<(), StoreError>;
    /// Look up an agent by record ID.
    fn agent(&self, id: &AgentId) -> Result<Agent, StoreError>;
    /// Look up an agent by callsign.
    fn agent_by_name(&self, name: &str) -> Option<Agent>;
    /// All agents, by callsign.
    fn agents(&self) -> Vec<Agent>;
    /// Replace an agent.
    fn update_agent(&self, agent: Agent) -> Result<(), StoreError>;

    // -- Notes --

    /// Insert a note.
    fn insert_note(&self, note: Note) -> Result<(), StoreError>;
    /// Look up a note.
    fn note(&self, id: &NoteId) -> Result<Note, StoreError>;
    /// Notes for a project, newest first.
    fn notes_for_project(&self, project_id: &ProjectId) -> Vec<Note>;

    // -- Messages --

    /// Insert a message.
    fn insert_message(&self, message: ThreadMessage) -> Result<(), StoreError>;
    /// Look up a message.
    fn message(&self, id: &MessageId) -> Result<ThreadMessage, StoreError>;
    /// All messages, newest first.
    fn messages(&self) -> Vec<ThreadMessage>;
    /// Replace a message.
    fn update_message(&self, message: ThreadMessage) -> Result<(), StoreError>;

    // -- Activity --

    /// Append an activity-log entry.
    fn append_activity(&self, entry: ActivityEntry) -> Result<(), StoreError>;
    /// The most recent activity entries, newest first.
    fn recent_activity(&self, limit: usize) -> Vec<ActivityEntry>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use opshub_core::ids::ProjectId;

    #[test]
    fn empty_filter_matches_all() {
        let t = Task::new(ProjectId::from("p1"), "t");
        assert!(TaskFilter::default().matches(&t));
    }

    #[test]
    fn filter_by_project_and_status() {
        let t = Task::new(ProjectId::from("p1"), "t");
        let f = TaskFilter {
            project_id: Some(ProjectId::from("p2")),
            ..TaskFilter::default()
        };
        assert!(!f.matches(&t));

        let f = TaskFilter {
            project_id: Some(ProjectId::from("p1")),
            status: Some(TaskStatus::Pending),
            ..TaskFilter::default()
        };
        assert!(f.matches(&t));
    }

    #[test]
    fn filter_by_assignee() {
        let mut t = Task::new(ProjectId::from("p1"), "t");
        t.assignee = Some("Scout".into());
        let f = TaskFilter {
            assignee: Some("Scout".into()),
            ..TaskFilter::default()
        };
        assert!(f.matches(&t));

        let f = TaskFilter {
            assignee: Some("Relay".into()),
            ..TaskFilter::default()
        };
        assert!(!f.matches(&t));
    }
}

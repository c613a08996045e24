//! In-memory record store.
//!
//! One `parking_lot::RwLock`-guarded table per record type. Lookups
//! clone records out; updates replace whole records by ID. Ordering:
//! insertion order is preserved per table and listings reverse it
//! (newest first), except assignments which read oldest first.

use parking_lot::RwLock;
use std::collections::HashMap;

use opshub_core::agent::Agent;
use opshub_core::comms::{Note, ThreadMessage};
use opshub_core::ids::{AgentId, MessageId, NoteId, ProjectId, TaskId};
use opshub_core::project::Project;
use opshub_core::task::{ActivityEntry, Assignment, Task};

use crate::error::StoreError;
use crate::store::{RecordStore, TaskFilter};

/// A keyed table that remembers insertion order.
struct Table<K, V> {
    rows: HashMap<K, V>,
    order: Vec<K>,
}

impl<K: Clone + Eq + std::hash::Hash, V: Clone> Table<K, V> {
    fn new() -> Self {
        Self {
            rows: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn insert(&mut self, key: K, value: V) {
        if self.rows.insert(key.clone(), value).is_none() {
            self.order.push(key);
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        self.rows.get(key).cloned()
    }

    fn replace(&mut self, key: &K, value: V) -> bool {
        match self.rows.get_mut(key) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Rows in insertion order.
    fn iter_ordered(&self) -> impl Iterator<Item = &V> {
        self.order.iter().filter_map(|k| self.rows.get(k))
    }
}

/// In-memory [`RecordStore`] implementation.
pub struct MemoryStore {
    projects: RwLock<Table<ProjectId, Project>>,
    tasks: RwLock<Table<TaskId, Task>>,
    assignments: RwLock<Table<opshub_core::ids::AssignmentId, Assignment>>,
    agents: RwLock<Table<AgentId, Agent>>,
    notes: RwLock<Table<NoteId, Note>>,
    messages: RwLock<Table<MessageId, ThreadMessage>>,
    activity: RwLock<Vec<ActivityEntry>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(Table::new()),
            tasks: RwLock::new(Table::new()),
            assignments: RwLock::new(Table::new()),
            agents: RwLock::new(Table::new()),
            notes: RwLock::new(Table::new()),
            messages: RwLock::new(Table::new()),
            activity: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryStore {
    fn insert_project(&self, project: Project) -> Result<(), StoreError> {
        self.projects.write().insert(project.id.clone(), project);
        Ok(())
    }

    fn project(&self, id: &ProjectId) -> Result<Project, StoreError> {
        self.projects
            .read()
            .get(id)
            .ok_or_else(|| StoreError::not_found("project", id.as_str()))
    }

    fn projects(&self) -> Vec<Project> {
        let mut out: Vec<Project> = self.projects.read().iter_ordered().cloned().collect();
        out.reverse();
        out
    }

    fn update_project(&self, project: Project) -> Result<(), StoreError> {
        let id = project.id.clone();
        if self.projects.write().replace(&id, project) {
            Ok(())
        } else {
            Err(StoreError::not_found("project", id.as_str()))
        }
    }

    fn insert_task(&self, task: Task) -> Result<(), StoreError> {
        self.tasks.write().insert(task.id.clone(), task);
        Ok(())
    }

    fn task(&self, id: &TaskId) -> Result<Task, StoreError> {
        self.tasks
            .read()
            .get(id)
            .ok_or_else(|| StoreError::not_found("task", id.as_str()))
    }

    fn tasks(&self, filter: &TaskFilter) -> Vec<Task> {
        let mut out: Vec<Task> = self
            .tasks
            .read()
            .iter_ordered()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        out.reverse();
        out
    }

    fn update_task(&self, task: Task) -> Result<(), StoreError> {
        let id = task.id.clone();
        if self.tasks.write().replace(&id, task) {
            Ok(())
        } else {
            Err(StoreError::not_found("task", id.as_str()))
        }
    }

    fn insert_assignment(&self, assignment: Assignment) -> Result<(), StoreError> {
        self.assignments
            .write()
            .insert(assignment.id.clone(), assignment);
        Ok(())
    }

    fn assignments_for_task(&self, task_id: &TaskId) -> Vec<Assignment> {
        self.assignments
            .read()
            .iter_ordered()
            .filter(|a| a.task_id == *task_id)
            .cloned()
            .collect()
    }

    fn latest_assignment(&self, task_id: &TaskId) -> Option<Assignment> {
        self.assignments
            .read()
            .iter_ordered()
            .filter(|a| a.task_id == *task_id)
            .last()
            .cloned()
    }

    fn update_assignment(&self, assignment: Assignment) -> Result<(), StoreError> {
        let id = assignment.id.clone();
        if self.assignments.write().replace(&id, assignment) {
            Ok(())
        } else {
            Err(StoreError::not_found("assignment", id.as_str()))
        }
    }

    fn insert_agent(&self, agent: Agent) -> Result<(), StoreError> {
        let mut agents = self.agents.write();
        if agents.iter_ordered().any(|a| a.name == agent.name) {
            return Err(StoreError::Conflict(format!(
                "agent name taken: {}",
                agent.name
            )));
        }
        agents.insert(agent.id.clone(), agent);
        Ok(())
    }

    fn agent(&self, id: &AgentId) -> Result<Agent, StoreError> {
        self.agents
            .read()
            .get(id)
            .ok_or_else(|| StoreError::not_found("agent", id.as_str()))
    }

    fn agent_by_name(&self, name: &str) -> Option<Agent> {
        self.agents
            .read()
            .iter_ordered()
            .find(|a| a.name == name)
            .cloned()
    }

    fn agents(&self) -> Vec<Agent> {
        let mut out: Vec<Agent> = self.agents.read().iter_ordered().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    fn update_agent(&self, agent: Agent) -> Result<(), StoreError> {
        let id = agent.id.clone();
        if self.agents.write().replace(&id, agent) {
            Ok(())
        } else {
            Err(StoreError::not_found("agent", id.as_str()))
        }
    }

    fn insert_note(&self, note: Note) -> Result<(), StoreError> {
        self.notes.write().insert(note.id.clone(), note);
        Ok(())
    }

    fn note(&self, id: &NoteId) -> Result<Note, StoreError> {
        self.notes
            .read()
            .get(id)
            .ok_or_else(|| StoreError::not_found("note", id.as_str()))
    }

    fn notes_for_project(&self, project_id: &ProjectId) -> Vec<Note> {
        let mut out: Vec<Note> = self
            .notes
            .read()
            .iter_ordered()
            .filter(|n| n.project_id == *project_id)
            .cloned()
            .collect();
        out.reverse();
        out
    }

    fn insert_message(&self, message: ThreadMessage) -> Result<(), StoreError> {
        self.messages.write().insert(message.id.clone(), message);
        Ok(())
    }

    fn message(&self, id: &MessageId) -> Result<ThreadMessage, StoreError> {
        self.messages
            .read()
            .get(id)
            .ok_or_else(|| StoreError::not_found("message", id.as_str()))
    }

    fn messages(&self) -> Vec<ThreadMessage> {
        let mut out: Vec<ThreadMessage> = self.messages.read().iter_ordered().cloned().collect();
        out.reverse();
        out
    }

    fn update_message(&self, message: ThreadMessage) -> Result<(), StoreError> {
        let id = message.id.clone();
        if self.messages.write().replace(&id, message) {
            Ok(())
        } else {
            Err(StoreError::not_found("message", id.as_str()))
        }
    }

    fn append_activity(&self, entry: ActivityEntry) -> Result<(), StoreError> {
        self.activity.write().push(entry);
        Ok(())
    }

    fn recent_activity(&self, limit: usize) -> Vec<ActivityEntry> {
        let activity = self.activity.read();
        activity.iter().rev().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use opshub_core::ids::ActivityId;

    fn store_with_project() -> (MemoryStore, Project) {
        let store = MemoryStore::new();
        let project = Project::new("Mesh rollout");
        store.insert_project(project.clone()).unwrap();
        (store, project)
    }

    #[test]
    fn project_lookup_and_missing() {
        let (store, project) = store_with_project();
        assert_eq!(store.project(&project.id).unwrap().name, "Mesh rollout");
        let missing = store.project(&ProjectId::from("nope"));
        assert_matches!(missing, Err(StoreError::NotFound { kind: "project", .. }));
    }

    #[test]
    fn task_listing_is_newest_first_and_filtered() {
        let (store, project) = store_with_project();
        let t1 = Task::new(project.id.clone(), "first");
        let t2 = Task::new(project.id.clone(), "second");
        store.insert_task(t1).unwrap();
        store.insert_task(t2).unwrap();

        let all = store.tasks(&TaskFilter::default());
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "second");

        let other = store.tasks(&TaskFilter {
            project_id: Some(ProjectId::from("other")),
            ..TaskFilter::default()
        });
        assert!(other.is_empty());
    }

    #[test]
    fn update_missing_task_fails() {
        let (store, project) = store_with_project();
        let task = Task::new(project.id, "t");
        assert_matches!(
            store.update_task(task),
            Err(StoreError::NotFound { kind: "task", .. })
        );
    }

    #[test]
    fn latest_assignment_wins() {
        let (store, project) = store_with_project();
        let task = Task::new(project.id, "t");
        store.insert_task(task.clone()).unwrap();

        let a1 = Assignment::open(task.id.clone(), "Scout", "ATLAS", None);
        let a2 = Assignment::open(task.id.clone(), "Relay", "ATLAS", None);
        store.insert_assignment(a1).unwrap();
        store.insert_assignment(a2.clone()).unwrap();

        assert_eq!(store.assignments_for_task(&task.id).len(), 2);
        let latest = store.latest_assignment(&task.id).unwrap();
        assert_eq!(latest.id, a2.id);
        assert_eq!(latest.assigned_to, "Relay");
    }

    #[test]
    fn agent_name_is_unique() {
        let store = MemoryStore::new();
        store.insert_agent(Agent::register("Scout")).unwrap();
        assert_matches!(
            store.insert_agent(Agent::register("Scout")),
            Err(StoreError::Conflict(_))
        );
        assert!(store.agent_by_name("Scout").is_some());
        assert!(store.agent_by_name("Relay").is_none());
    }

    #[test]
    fn recent_activity_is_bounded_and_newest_first() {
        let (store, project) = store_with_project();
        for i in 0..5 {
            store
                .append_activity(ActivityEntry {
                    id: ActivityId::new(),
                    project_id: project.id.clone(),
                    task_id: None,
                    actor: "Scout".into(),
                    action: format!("step{i}"),
                    detail: None,
                    created_at: chrono::Utc::now(),
                })
                .unwrap();
        }
        let recent = store.recent_activity(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].action, "step4");
        assert_eq!(recent[2].action, "step2");
    }
}

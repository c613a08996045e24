//! The `state` snapshot sent to a client when it subscribes.

use serde::Serialize;

use opshub_core::agent::Agent;
use opshub_core::task::{ActivityEntry, Task};
use opshub_store::{RecordStore, TaskFilter};

/// Current world state: enough for a UI to render before live events.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// Open tasks (everything not done), newest first.
    pub tasks: Vec<Task>,
    /// All known agents.
    pub agents: Vec<Agent>,
    /// Most recent activity entries, newest first.
    pub activity: Vec<ActivityEntry>,
}

impl StateSnapshot {
    /// Collect a snapshot from the store.
    pub fn collect(store: &dyn RecordStore, activity_limit: usize) -> Self {
        Self {
            tasks: store
                .tasks(&TaskFilter::default())
                .into_iter()
                .filter(Task::is_open)
                .collect(),
            agents: store.agents(),
            activity: store.recent_activity(activity_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opshub_core::ids::ProjectId;
    use opshub_core::project::Project;
    use opshub_core::task::TaskStatus;
    use opshub_store::MemoryStore;

    #[test]
    fn snapshot_excludes_done_tasks() {
        let store = MemoryStore::new();
        let project = Project::new("Mesh rollout");
        store.insert_project(project.clone()).unwrap();

        let open = Task::new(project.id.clone(), "open work");
        store.insert_task(open).unwrap();
        let mut done = Task::new(project.id.clone(), "finished work");
        done.status = TaskStatus::Done;
        store.insert_task(done).unwrap();

        let snap = StateSnapshot::collect(&store, 10);
        assert_eq!(snap.tasks.len(), 1);
        assert_eq!(snap.tasks[0].title, "open work");
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let store = MemoryStore::new();
        let snap = StateSnapshot::collect(&store, 10);
        let v = serde_json::to_value(&snap).unwrap();
        assert!(v.get("tasks").is_some());
        assert!(v.get("agents").is_some());
        assert!(v.get("activity").is_some());
    }

    #[test]
    fn empty_project_id_unused() {
        // Snapshot over an empty store is empty, not an error.
        let store = MemoryStore::new();
        let snap = StateSnapshot::collect(&store, 10);
        assert!(snap.tasks.is_empty());
        assert!(snap.agents.is_empty());
        let _ = ProjectId::new();
    }
}

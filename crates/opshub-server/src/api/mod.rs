//! HTTP API handlers.
//!
//! Every mutation persists through the record store and publishes a
//! domain event; the realtime hub and the notification pipeline pick
//! the events up from the bus, so handlers never talk to either
//! directly.

mod agents;
mod messages;
mod notes;
mod projects;
mod status;
mod tasks;

pub use agents::{get_agents, register_agent};
pub use messages::{create_message, create_reply, get_messages, toggle_upvote};
pub use notes::{create_note, get_notes};
pub use projects::{create_project, get_project, get_projects};
pub use status::get_status;
pub use tasks::{assign_task, create_task, get_task, get_tasks, report_task, reopen_task, verify_task};

/// Default actor recorded when a request names none.
pub(crate) const DEFAULT_ACTOR: &str = "operator";

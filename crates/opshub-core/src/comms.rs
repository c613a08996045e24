//! Notes and threaded messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, NoteId, ProjectId};

/// A free-form note attached to a project.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Unique note ID.
    pub id: NoteId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Who wrote it (agent callsign or operator handle).
    pub author: String,
    /// Note body.
    pub body: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Note {
    /// Create a note.
    pub fn new(
        project_id: ProjectId,
        author: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: NoteId::new(),
            project_id,
            author: author.into(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }
}

/// A reply inside a message thread.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    /// Who replied.
    pub author: String,
    /// Reply body.
    pub body: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A top-level message on the shared board, with replies and upvotes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadMessage {
    /// Unique message ID.
    pub id: MessageId,
    /// Owning project, if scoped to one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    /// Who wrote it.
    pub author: String,
    /// Message body.
    pub body: String,
    /// Replies in arrival order.
    pub replies: Vec<Reply>,
    /// Names that have upvoted. Each name counts at most once.
    pub upvotes: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl ThreadMessage {
    /// Create a top-level message with no replies or upvotes.
    pub fn new(
        project_id: Option<ProjectId>,
        author: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            project_id,
            author: author.into(),
            body: body.into(),
            replies: Vec::new(),
            upvotes: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Append a reply.
    pub fn add_reply(&mut self, author: impl Into<String>, body: impl Into<String>) {
        self.replies.push(Reply {
            author: author.into(),
            body: body.into(),
            created_at: Utc::now(),
        });
    }

    /// Toggle an upvote for `voter`. Returns true if the vote is now
    /// present, false if it was removed.
    pub fn toggle_upvote(&mut self, voter: &str) -> bool {
        if let Some(pos) = self.upvotes.iter().position(|v| v == voter) {
            let _ = self.upvotes.remove(pos);
            false
        } else {
            self.upvotes.push(voter.to_owned());
            true
        }
    }
}

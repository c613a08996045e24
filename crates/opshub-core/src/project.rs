//! Project records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::ids::ProjectId;

/// Lifecycle status of a project.
///
/// `NotStarted`, `InProgress`, and `Completed` are derived from the
/// project's tasks on every task transition. `Blocked` and `OnHold` are
/// operator-set hold states that derivation never overrides.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// No task has finished yet.
    #[default]
    NotStarted,
    /// At least one task done, but not all.
    InProgress,
    /// All tasks done.
    Completed,
    /// Held by an operator pending something external.
    Blocked,
    /// Explicitly paused by an operator.
    OnHold,
}

impl ProjectStatus {
    /// Wire/storage string for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
            Self::OnHold => "on_hold",
        }
    }

    /// Whether this is an operator-set hold state that auto-derivation
    /// must leave alone.
    pub fn is_held(self) -> bool {
        matches!(self, Self::Blocked | Self::OnHold)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "blocked" => Ok(Self::Blocked),
            "on_hold" => Ok(Self::OnHold),
            other => Err(CoreError::UnknownVariant {
                kind: "project status",
                value: other.to_owned(),
            }),
        }
    }
}

/// A project owning tasks, notes, and an activity log.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Unique project ID.
    pub id: ProjectId,
    /// Display name.
    pub name: String,
    /// Longer description, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Current lifecycle status.
    pub status: ProjectStatus,
    /// Rounded percentage of tasks done, 0–100. Recomputed on every
    /// task transition, never set directly.
    pub progress: u8,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a fresh project with zero progress.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ProjectId::new(),
            name: name.into(),
            description: None,
            status: ProjectStatus::NotStarted,
            progress: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

//! Pure lifecycle rules.
//!
//! These functions are the single source of truth for status derivation
//! and progress rollup. They take plain values and return plain values;
//! the task service applies the results and persists them.

use crate::project::ProjectStatus;
use crate::task::TaskStatus;

/// Derive a task status from a progress report.
///
/// An explicit status in the report always wins. Otherwise progress
/// drives the transition: 100 means done, anything in between means
/// in-progress, and zero leaves the current status untouched (a report
/// with no progress is not a regression).
pub fn derive_status(current: TaskStatus, progress: u8, explicit: Option<TaskStatus>) -> TaskStatus {
    if let Some(status) = explicit {
        return status;
    }
    if progress >= 100 {
        TaskStatus::Done
    } else if progress > 0 {
        TaskStatus::InProgress
    } else {
        current
    }
}

/// Roll up project progress as the rounded percentage of done tasks.
///
/// A project with no tasks sits at zero.
pub fn project_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (done as f64 / total as f64) * 100.0;
    // Bounded by construction since done <= total.
    pct.round() as u8
}

/// Derive a project status from its tasks.
///
/// Operator-set hold states (blocked, on hold) are never overridden by
/// derivation, and a project with zero tasks keeps its current status.
/// Otherwise: no tasks done means not started, all done means completed,
/// anything in between is in progress. Reopening a task therefore drops
/// a completed project back on the next recompute (to in-progress while
/// other tasks remain done, to not-started when none do).
pub fn derive_project_status(current: ProjectStatus, done: usize, total: usize) -> ProjectStatus {
    if current.is_held() || total == 0 {
        return current;
    }
    if done == 0 {
        ProjectStatus::NotStarted
    } else if done == total {
        ProjectStatus::Completed
    } else {
        ProjectStatus::InProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_100_is_done() {
        assert_eq!(derive_status(TaskStatus::Assigned, 100, None), TaskStatus::Done);
        assert_eq!(derive_status(TaskStatus::InProgress, 100, None), TaskStatus::Done);
    }

    #[test]
    fn partial_progress_is_in_progress() {
        assert_eq!(derive_status(TaskStatus::Assigned, 1, None), TaskStatus::InProgress);
        assert_eq!(derive_status(TaskStatus::Assigned, 99, None), TaskStatus::InProgress);
    }

    #[test]
    fn zero_progress_keeps_current() {
        assert_eq!(derive_status(TaskStatus::Assigned, 0, None), TaskStatus::Assigned);
        assert_eq!(derive_status(TaskStatus::Blocked, 0, None), TaskStatus::Blocked);
    }

    #[test]
    fn explicit_status_wins() {
        // Even a 100% report is overridden by an explicit status.
        assert_eq!(
            derive_status(TaskStatus::InProgress, 100, Some(TaskStatus::Blocked)),
            TaskStatus::Blocked
        );
        assert_eq!(
            derive_status(TaskStatus::Blocked, 0, Some(TaskStatus::InProgress)),
            TaskStatus::InProgress
        );
    }

    #[test]
    fn empty_project_is_zero_percent() {
        assert_eq!(project_progress(0, 0), 0);
    }

    #[test]
    fn progress_rounds_to_nearest() {
        assert_eq!(project_progress(1, 3), 33);
        assert_eq!(project_progress(2, 3), 67);
        assert_eq!(project_progress(3, 3), 100);
        assert_eq!(project_progress(1, 2), 50);
    }

    #[test]
    fn all_done_completes_project() {
        assert_eq!(
            derive_project_status(ProjectStatus::InProgress, 4, 4),
            ProjectStatus::Completed
        );
    }

    #[test]
    fn nothing_done_is_not_started() {
        assert_eq!(
            derive_project_status(ProjectStatus::InProgress, 0, 4),
            ProjectStatus::NotStarted
        );
    }

    #[test]
    fn reopen_drops_completed_back_to_in_progress() {
        assert_eq!(
            derive_project_status(ProjectStatus::Completed, 3, 4),
            ProjectStatus::InProgress
        );
    }

    #[test]
    fn hold_states_are_sticky() {
        assert_eq!(
            derive_project_status(ProjectStatus::OnHold, 4, 4),
            ProjectStatus::OnHold
        );
        assert_eq!(
            derive_project_status(ProjectStatus::Blocked, 0, 4),
            ProjectStatus::Blocked
        );
    }

    #[test]
    fn empty_project_never_auto_transitions() {
        assert_eq!(
            derive_project_status(ProjectStatus::NotStarted, 0, 0),
            ProjectStatus::NotStarted
        );
        assert_eq!(
            derive_project_status(ProjectStatus::Completed, 0, 0),
            ProjectStatus::Completed
        );
    }
}

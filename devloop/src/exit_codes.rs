//! Stable exit codes for devloop CLI commands.

use crate::core::types::ProjectStatus;

/// Command succeeded; the workflow completed or nothing was left to do.
pub const OK: i32 = 0;
/// Invalid input, config or persisted state, or an I/O failure.
pub const INVALID: i32 = 1;
/// The workflow is waiting for a human answer (`devloop answer`).
pub const NEEDS_INPUT: i32 = 2;
/// The workflow ended in the `error` status.
pub const FAILED: i32 = 3;

/// Exit code reported for a workflow left in `status`.
pub fn for_status(status: ProjectStatus) -> i32 {
    match status {
        ProjectStatus::NeedsHumanInput => NEEDS_INPUT,
        ProjectStatus::Error => FAILED,
        ProjectStatus::Initial | ProjectStatus::InProgress | ProjectStatus::Complete => OK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_stable_codes() {
        assert_eq!(for_status(ProjectStatus::Complete), OK);
        assert_eq!(for_status(ProjectStatus::NeedsHumanInput), NEEDS_INPUT);
        assert_eq!(for_status(ProjectStatus::Error), FAILED);
    }
}

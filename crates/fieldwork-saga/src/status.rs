use std::fmt;

use serde::{Deserialize, Serialize};

/// Progress of a task or task collection.
///
/// `Failed`, `Reverting` and `Reverted` keep the processing error around;
/// `Error` keeps the reverting error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    Started,
    Success,
    Failed,
    Reverting,
    Reverted,
    Error,
}

impl TaskStatus {
    /// Whether no operation is mid-flight and side effects are stable.
    ///
    /// `Error` counts as clean: the effects are stuck, not moving.
    #[must_use]
    pub fn is_clean(self) -> bool {
        matches!(
            self,
            Self::NotStarted | Self::Success | Self::Reverted | Self::Error
        )
    }

    /// Whether the processing error is the one worth reporting.
    #[must_use]
    pub(crate) fn reports_processing_error(self) -> bool {
        matches!(self, Self::Failed | Self::Reverting | Self::Reverted)
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::Started => "Started. In progress",
            Self::Success => "Completed successfully",
            Self::Failed => "Failed to complete. Not reverted",
            Self::Reverting => "Failed. Reverting in progress",
            Self::Reverted => "Reverted",
            Self::Error => "Failed to revert properly",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not-started",
            Self::Started => "started",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Reverting => "reverting",
            Self::Reverted => "reverted",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_statuses_are_stable_ones() {
        let clean: Vec<_> = [
            TaskStatus::NotStarted,
            TaskStatus::Started,
            TaskStatus::Success,
            TaskStatus::Failed,
            TaskStatus::Reverting,
            TaskStatus::Reverted,
            TaskStatus::Error,
        ]
        .into_iter()
        .filter(|status| status.is_clean())
        .collect();

        assert_eq!(
            clean,
            vec![
                TaskStatus::NotStarted,
                TaskStatus::Success,
                TaskStatus::Reverted,
                TaskStatus::Error
            ]
        );
    }

    #[test]
    fn default_is_not_started() {
        assert_eq!(TaskStatus::default(), TaskStatus::NotStarted);
    }

    #[test]
    fn display_uses_kebab_case() {
        assert_eq!(TaskStatus::NotStarted.to_string(), "not-started");
        assert_eq!(TaskStatus::Reverted.to_string(), "reverted");
    }

    #[test]
    fn label_describes_revert_error() {
        assert_eq!(TaskStatus::Error.label(), "Failed to revert properly");
    }
}

use fieldwork_operations::OperationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Operation(#[from] OperationError),
}

impl CliError {
    /// Per-task summary of a transition that did not complete.
    pub(crate) fn audit(&self) -> Option<&str> {
        match self {
            Self::Operation(OperationError::TransitionFailed { audit, .. }) if !audit.is_empty() => {
                Some(audit)
            }
            Self::Operation(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use fieldwork_core::CollectId;
    use fieldwork_saga::TaskStatus;

    use super::*;

    #[test]
    fn operation_error_converts_via_from() {
        let cli_err: CliError = OperationError::CollectNotFound(CollectId(4)).into();

        assert!(matches!(
            cli_err,
            CliError::Operation(OperationError::CollectNotFound(CollectId(4)))
        ));
        assert_eq!(cli_err.to_string(), "collect 4 does not exist");
    }

    #[test]
    fn failed_transition_exposes_its_audit() {
        let cli_err: CliError = OperationError::TransitionFailed {
            collection: "end_collect",
            status: TaskStatus::Reverted,
            audit: "↩ disable_survey_form\n✗ download_survey_data".to_string(),
            source: None,
        }
        .into();

        assert_eq!(
            cli_err.audit(),
            Some("↩ disable_survey_form\n✗ download_survey_data")
        );
    }

    #[test]
    fn other_errors_have_no_audit() {
        let cli_err: CliError = OperationError::MissingToken.into();

        assert!(cli_err.audit().is_none());
    }
}

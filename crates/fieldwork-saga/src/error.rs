use std::fmt::Debug;

use thiserror::Error;

/// Why a task or collection did not reach the status it was driven towards.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskError<E: Debug> {
    /// A required input key was absent when the task started.
    #[error("task '{task}' requires input '{key}'")]
    MissingInput {
        task: &'static str,
        key: &'static str,
    },

    /// The task completed without producing a required output key.
    #[error("task '{task}' did not produce output '{key}'")]
    MissingOutput {
        task: &'static str,
        key: &'static str,
    },

    /// A task could not be built from the collection's plan.
    #[error("failed to instantiate task #{index} of '{collection}'")]
    Instantiation {
        collection: &'static str,
        index: usize,
        #[source]
        source: E,
    },

    /// The forward action of a task failed.
    #[error("task '{task}' failed")]
    Failed {
        task: &'static str,
        #[source]
        source: E,
    },

    /// The compensating action of a task failed.
    #[error("failed to revert task '{task}'")]
    RevertFailed {
        task: &'static str,
        #[source]
        source: E,
    },
}

impl<E: Debug> TaskError<E> {
    /// Whether the error is a programming or configuration mistake rather
    /// than a failure of the side effect itself.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::MissingInput { .. } | Self::MissingOutput { .. } | Self::Instantiation { .. }
        )
    }

    /// The collaborator error underneath, when there is one.
    #[must_use]
    pub fn inner(&self) -> Option<&E> {
        match self {
            Self::Instantiation { source, .. }
            | Self::Failed { source, .. }
            | Self::RevertFailed { source, .. } => Some(source),
            Self::MissingInput { .. } | Self::MissingOutput { .. } => None,
        }
    }
}

/// Error from driving a workflow state machine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WorkflowError<E: Debug> {
    #[error("unknown workflow state '{state}'")]
    UnknownState { state: String },

    #[error("workflow state '{state}' is registered more than once")]
    DuplicateState { state: String },

    #[error("failed to read the current state of the aggregate")]
    Read(#[source] E),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct TestError(&'static str);

    #[test]
    fn missing_input_names_task_and_key() {
        let err: TaskError<TestError> = TaskError::MissingInput {
            task: "upload_form",
            key: "xform",
        };

        let msg = err.to_string();

        assert!(msg.contains("upload_form"));
        assert!(msg.contains("xform"));
        assert!(err.is_precondition());
        assert!(err.inner().is_none());
    }

    #[test]
    fn failed_error_exposes_source() {
        let err = TaskError::Failed {
            task: "disable_form",
            source: TestError("HTTP 500"),
        };

        let source = std::error::Error::source(&err).map(ToString::to_string);

        assert_eq!(source.as_deref(), Some("HTTP 500"));
        assert!(!err.is_precondition());
        assert_eq!(err.inner().map(|e| e.0), Some("HTTP 500"));
    }

    #[test]
    fn instantiation_is_a_precondition_failure() {
        let err = TaskError::Instantiation {
            collection: "end_collect",
            index: 3,
            source: TestError("bad template"),
        };

        assert!(err.is_precondition());
        assert!(err.to_string().contains("#3"));
    }
}

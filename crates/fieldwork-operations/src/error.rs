use std::path::PathBuf;
use std::sync::Arc;

use fieldwork_core::{CollectId, CollectStatus, CoreError, FormKind};
use fieldwork_saga::{Direction, TaskError, TaskStatus, WorkflowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("collect {0} does not exist")]
    CollectNotFound(CollectId),

    #[error("collect {collect} is {actual}, expected {expected}")]
    UnexpectedStatus {
        collect: CollectId,
        expected: CollectStatus,
        actual: CollectStatus,
    },

    #[error("collect {collect} has no {kind} form on the server")]
    MissingForm { collect: CollectId, kind: FormKind },

    #[error("a transition is already running for collect {0}")]
    TransitionInProgress(CollectId),

    #[error("failed to create transition lock '{path}'")]
    LockFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("nothing to {direction} for collect {collect}, already {status}")]
    NothingToDo {
        collect: CollectId,
        direction: Direction,
        status: CollectStatus,
    },

    #[error("unknown collect status '{0}'")]
    UnknownStatus(String),

    #[error("invalid collect workflow: {0}")]
    Workflow(String),

    #[error("'{collection}' did not complete, ended {status}")]
    TransitionFailed {
        collection: &'static str,
        status: TaskStatus,
        audit: String,
        #[source]
        source: Option<Arc<TaskError<OperationError>>>,
    },

    #[error("moving collect {collect} to {target} halted at {reached}")]
    TransformHalted {
        collect: CollectId,
        target: CollectStatus,
        reached: CollectStatus,
    },

    #[error("task value '{key}' is missing or of the wrong kind")]
    MissingValue { key: &'static str },

    #[error("form service answered {status}: {message}")]
    FormService { status: u16, message: String },

    #[error("form service request failed")]
    Http(#[from] reqwest::Error),

    #[error("invalid form service URL '{url}'")]
    InvalidUrl { url: String },

    #[error("failed to read store file '{path}'")]
    StoreRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write store file '{path}'")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse store file '{path}'")]
    StoreParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("collect counter '{path}' holds '{content}', expected a number")]
    InvalidCounter { path: PathBuf, content: String },

    #[error("collect {0} already exists")]
    CollectExists(CollectId),

    #[error("failed to serialize data")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to read form template '{path}'")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write document '{path}'")]
    DocumentWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove document '{path}'")]
    DocumentRemove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("document path '{path}' escapes the documents directory")]
    InvalidDocumentPath { path: PathBuf },

    #[error("failed to read configuration file '{path}'")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file '{path}'")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no form service token configured; set server.token or FIELDWORK_TOKEN")]
    MissingToken,

    /// Raised by an armed [`Faults`](crate::providers::Faults) in the
    /// in-memory providers, never by a real collaborator. Dry runs use it to
    /// rehearse a rollback.
    #[error("injected failure: {0}")]
    Injected(String),
}

pub type Result<T> = std::result::Result<T, OperationError>;

impl From<WorkflowError<OperationError>> for OperationError {
    fn from(err: WorkflowError<OperationError>) -> Self {
        match err {
            WorkflowError::Read(source) => source,
            WorkflowError::UnknownState { state } => Self::UnknownStatus(state),
            other => Self::Workflow(other.to_string()),
        }
    }
}

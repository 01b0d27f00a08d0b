use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown collect status '{0}'")]
    UnknownStatus(String),

    #[error("submission field '{field}' is invalid: {reason}")]
    InvalidSubmission { field: &'static str, reason: String },

    #[error("scan submission refers to unknown target '{0}'")]
    UnknownTarget(String),

    #[error("could not find a free target identifier after {attempts} attempts")]
    IdentifiersExhausted { attempts: usize },
}

pub type Result<T> = std::result::Result<T, CoreError>;

//! Error types for normalization, stages and pipeline runs

use std::time::Duration;
use thiserror::Error;

/// Errors produced while turning input into a [`Payload`](crate::Payload).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// The input bytes were not valid JSON
    #[error("Parse error: {0}")]
    Parse(String),

    /// The input value does not have the required shape
    #[error("Type error: {0}")]
    Type(String),

    /// Header and rows disagree
    #[error("Shape error: {0}")]
    Shape(String),
}

impl From<serde_json::Error> for NormalizeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// An unrecoverable condition raised by a stage.
///
/// This is the only error kind that crosses a stage boundary. Returning it from
/// [`Stage::process`](crate::Stage::process) or
/// [`Stage::finish`](crate::Stage::finish) cancels the whole run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// A fatal condition described by the stage
    #[error("{0}")]
    Fatal(String),

    /// An IO error occurred
    #[error("IO error: {0}")]
    Io(String),

    /// The stage failed to normalize its input
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// The run was cancelled while the stage was waiting to emit
    #[error("pipeline cancelled")]
    Cancelled,
}

impl StageError {
    /// Shorthand for [`StageError::Fatal`].
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }
}

impl From<std::io::Error> for StageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// The outcome of a failed pipeline run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A stage reported a fatal error
    #[error("stage '{stage}' failed: {source}")]
    Stage {
        /// Label of the failing stage
        stage: String,
        /// What the stage reported
        source: StageError,
    },

    /// A stage call exceeded its deadline
    #[error("stage '{stage}' timed out after {after:?}")]
    Timeout {
        /// Label of the stage
        stage: String,
        /// The deadline that was exceeded
        after: Duration,
    },

    /// A stage worker panicked
    #[error("stage '{stage}' panicked: {message}")]
    Panicked {
        /// Label of the stage
        stage: String,
        /// Panic message, when one could be recovered
        message: String,
    },

    /// The run was stopped by an external shutdown signal
    #[error("pipeline shut down")]
    Shutdown,

    /// The pipeline has no stages
    #[error("pipeline has no stages")]
    NoStages,
}

/// Result type for normalization
pub type NormalizeResult<T> = std::result::Result<T, NormalizeError>;

/// Result type for stage calls
pub type StageResult<T> = std::result::Result<T, StageError>;

//! Error types for worker invocation and result translation

use std::time::Duration;
use thiserror::Error;

/// Result type for Process Invoker operations
pub type Result<T> = std::result::Result<T, InvokeError>;

/// Errors that can occur while staging, running, or supervising a worker
#[derive(Error, Debug)]
pub enum InvokeError {
    /// A temporary file could not be created or written
    #[error("Failed to stage {what}: {reason}")]
    Staging { what: &'static str, reason: String },

    /// The configured worker program is not among the embedded resources
    #[error("Worker program not found in embedded resources: {0}")]
    WorkerMissing(String),

    /// The interpreter could not be started
    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    /// The worker's output stream or exit status could not be collected
    #[error("Failed to collect worker output: {0}")]
    Output(String),

    /// The worker did not exit within its budget and was killed
    #[error("Worker timed out after {budget:?}")]
    Timeout { budget: Duration },

    /// The worker exited with a non-zero status or was killed by a signal
    #[error("Worker failed ({}):\n{output}", describe_exit(.exit_code))]
    WorkerFailed {
        exit_code: Option<i32>,
        output: String,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl InvokeError {
    pub(crate) fn staging(what: &'static str, err: impl std::fmt::Display) -> Self {
        InvokeError::Staging {
            what,
            reason: err.to_string(),
        }
    }
}

/// The worker reported a failure, or its output could not be decoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AnalysisError {
    /// Human-readable message, usually the worker's own
    pub message: String,
    /// Diagnostic trace reported by the worker, if any
    pub traceback: Option<String>,
}

impl AnalysisError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: None,
        }
    }

    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = Some(traceback.into());
        self
    }
}

/// Any failure of a complete analysis: invocation or translation
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
}

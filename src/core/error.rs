//! Error taxonomy for the run pipeline.
//!
//! Only `Capability` is absorbed locally (by the worker that made the call);
//! every other variant aborts the run.

use thiserror::Error;

use super::safety::SafetyViolation;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing credentials or invalid input, raised before any stage starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A single external call failed
    #[error("Capability '{capability}' failed: {message}")]
    Capability { capability: String, message: String },

    /// Malformed interrupt/resume exchange
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The action budget or run timeout was reached
    #[error("Budget exceeded: {0}")]
    BudgetExceeded(#[from] SafetyViolation),

    /// An artifact could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl PipelineError {
    pub fn capability(capability: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::Capability {
            capability: capability.into(),
            message: error.to_string(),
        }
    }

    /// Only capability failures are scoped to the calling worker
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Capability { .. })
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

//! Error taxonomy for a single dispatch.
//!
//! Every failure that reaches `main` is one of three kinds, each with its
//! own exit code. Nothing is retried.

use crate::provider::ProviderError;
use thiserror::Error;

/// Exit code for a failed provider call or agent run.
pub const EXIT_INVOCATION: i32 = 1;
/// Exit code for bad input or configuration.
pub const EXIT_USAGE: i32 = 2;

/// A dispatch failure, surfaced directly to the caller.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The query was empty or otherwise unusable.
    #[error("Input error: {0}")]
    Input(String),

    /// Missing credential, unknown provider or unreadable config.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The LLM call or the agent loop failed.
    #[error("Invocation error: {0}")]
    Invocation(String),
}

impl DispatchError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            DispatchError::Input(_) | DispatchError::Configuration(_) => EXIT_USAGE,
            DispatchError::Invocation(_) => EXIT_INVOCATION,
        }
    }
}

impl From<ProviderError> for DispatchError {
    fn from(err: ProviderError) -> Self {
        DispatchError::Invocation(err.to_string())
    }
}

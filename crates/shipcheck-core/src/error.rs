//! Error types for stage execution.

use std::io;
use thiserror::Error;

/// Failures that abort a stage without a clean exit status.
///
/// A command that runs to completion and exits non-zero is not an error
/// here; the runner records it as a failed stage report instead. These
/// variants cover everything that prevents an exit status from being
/// observed in the first place.
#[derive(Debug, Error)]
pub enum StageError {
    /// The command could not be located or started.
    #[error("stage `{stage}`: failed to run `{command}`: {source}")]
    Launch {
        stage: String,
        command: String,
        #[source]
        source: io::Error,
    },

    /// The command outlived its time limit and was killed.
    #[error("stage `{stage}` timed out after {limit_secs}s")]
    Timeout { stage: String, limit_secs: u64 },

    /// The runner was interrupted while the command was running.
    /// The child has been killed; no orphan is left behind.
    #[error("stage `{stage}` interrupted")]
    Interrupted { stage: String },
}

impl StageError {
    /// Name of the stage the error belongs to.
    pub fn stage(&self) -> &str {
        match self {
            StageError::Launch { stage, .. }
            | StageError::Timeout { stage, .. }
            | StageError::Interrupted { stage } => stage,
        }
    }
}

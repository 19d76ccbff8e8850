//! Error types and exit-status mapping for engine subprocess communication.

use serde::Serialize;
use thiserror::Error;

/// How the engine subprocess terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitStatus {
    /// Exit code 0.
    Success,
    /// Exit code -11: the process was killed by SIGSEGV.
    Segfault,
    /// Any other non-zero exit code.
    Failed(i32),
}

impl ExitStatus {
    /// Classify a raw process exit code per the engine protocol (§6): 0 is
    /// success, -11 (SIGSEGV) or any other non-zero code is a crash.
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => ExitStatus::Success,
            -11 => ExitStatus::Segfault,
            other => ExitStatus::Failed(other),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }
}

/// Errors that can occur while driving the external partition engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The configured engine binary does not exist or is not executable.
    #[error("engine binary not found: {0}")]
    BinaryNotFound(String),

    /// Failed to spawn the engine subprocess.
    #[error("failed to start engine process: {0}")]
    ProcessStart(#[source] std::io::Error),

    /// The engine subprocess crashed (SIGSEGV) or returned non-zero.
    #[error("engine process failed with status {status:?}: {message}")]
    ProcessFailed { status: ExitStatus, message: String },

    /// The engine did not return within its configured timeout.
    #[error("engine timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Failure materializing the edge-list / types input files, or reading
    /// the `biDCSBMcomms<i>.tsv` / `.score` output files.
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A sweep's output file did not parse as expected.
    #[error("malformed engine output: {0}")]
    MalformedOutput(String),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<EngineError> for bisbm_core::Error {
    fn from(err: EngineError) -> Self {
        bisbm_core::Error::Engine(err.to_string())
    }
}

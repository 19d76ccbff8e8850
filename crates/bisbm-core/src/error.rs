//! Unified error type for the biSBM search crates.
//!
//! [`Error`] covers every failure kind named for the Kₐ/K_b search: bad
//! constructor/setter arguments, malformed edge lists, engine-subprocess
//! failures, and I/O failures around the restricted-partition table or the
//! temporary edge-list file. Domain crates (`bisbm-engine-common`,
//! `bisbm-mdl`) convert their own errors into this one at API boundaries so
//! callers only ever match on a single enum.
//!
//! # Example
//!
//! ```ignore
//! use bisbm_core::{Error, Result};
//!
//! fn build_affinity(edgelist: &[(usize, usize)], mb: &[usize]) -> Result<()> {
//!     if edgelist.is_empty() {
//!         return Err(Error::Format("empty edge list".into()));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all biSBM search operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Constructor or setter precondition violated (bad Kₐ/K_b, bad i_th, bad types).
    #[error("argument error: {0}")]
    Argument(String),

    /// Edge list contains an intra-type edge, an unparseable field, or the wrong delimiter.
    #[error("format error: {0}")]
    Format(String),

    /// The external partition engine crashed or returned non-zero.
    #[error("engine error: {0}")]
    Engine(String),

    /// Temp file or q-table file I/O failure.
    #[error("resource error: {0}")]
    Resource(String),

    /// I/O errors underlying a resource failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Descent reached (1, 1) without an earlier confirmed local minimum.
    ///
    /// Not fatal: carried on the success path attached to the final summary,
    /// never raised through `?`.
    #[error("convergence warning: {0}")]
    Convergence(String),
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Argument(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Argument(s.to_string())
    }
}

//! # bisbm-mdl: MDL model-selection driver for biSBM community counts
//!
//! Infers the number of communities `(Kₐ, K_b)` in a bipartite network under
//! the degree-corrected bipartite stochastic block model by minimum
//! description length. Given an edge list and a starting upper bound
//! `(K̂ₐ, K̂_b)`, [`SearchDriver`] walks the `(Kₐ, K_b)` lattice by successive
//! affinity-matrix merges, re-partitioning at each candidate point via a
//! pluggable [`bisbm_engine_common::EngineAdapter`], until it confirms a
//! local minimum of the description length.
//!
//! ## Modules
//!
//! - [`matrix_ops`] - the block-affinity matrix, profile likelihood, and the
//!   row/column merge operator.
//! - [`description_length`] - diff-mode and absolute-mode description length.
//! - [`state_store`] - memoization of confident points and the transient trace.
//! - [`config`] - public construction parameters.
//! - [`search_driver`] - the merge-descent orchestration itself.
//!
//! ## Example
//!
//! ```ignore
//! use bisbm_mdl::{Config, SearchDriver};
//! use std::sync::Arc;
//!
//! let config = Config::new(edges, 10, 10, 0.1)?;
//! let mut driver = SearchDriver::construct(Arc::new(engine), config)?;
//! let confident = driver.iterate()?;
//! let summary = driver.summary()?;
//! ```

pub mod config;
pub mod description_length;
pub mod matrix_ops;
pub mod search_driver;
pub mod state_store;

pub use config::Config;
pub use description_length::{DegreeDlKind, DlKindConfig, EdgeDlKind, PartitionDlKind};
pub use matrix_ops::AffinityMatrix;
pub use search_driver::{SearchDriver, Summary};
pub use state_store::{ConfidentPoint, StateStore};

/// Initialize a `tracing` subscriber writing to stderr, honoring `RUST_LOG`.
///
/// A top-level command shell embedding this driver is expected to call this
/// once at startup; library code never installs a subscriber on a caller's
/// behalf except through this opt-in helper.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_tracing_is_idempotent() {
        super::init_tracing();
        super::init_tracing();
    }
}

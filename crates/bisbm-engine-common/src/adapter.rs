//! The `EngineAdapter` contract (§4.4, §6): given an edge-list file and a
//! target `(Kₐ, K_b)`, synchronously produce a block-membership vector.
//!
//! The adapter is opaque to the driver: it may shell out to a subprocess
//! (the reference [`crate::subprocess::SubprocessEngine`]) or call in-process
//! code. The driver treats every call as a sample from a stochastic
//! partition procedure and is the one responsible for fanning a single point
//! evaluation out across `MAX_SWEEPS` independent calls.

use crate::error::EngineResult;
use bisbm_core::Membership;
use std::path::Path;

/// A pluggable community-detection engine invoked once per sweep.
pub trait EngineAdapter: Send + Sync {
    /// Produce one membership vector of length `na + nb` for the given
    /// `(ka, kb)`, reading the 0-indexed edge list at `edgelist_path`.
    fn call(
        &self,
        edgelist_path: &Path,
        na: usize,
        nb: usize,
        ka: usize,
        kb: usize,
    ) -> EngineResult<Membership>;
}

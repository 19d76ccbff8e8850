//! Public construction parameters for [`crate::SearchDriver`] (§6).

use std::time::Duration;

use bisbm_core::{EdgeList, Error, Result};

use crate::description_length::DlKindConfig;

/// Construction parameters for a search run.
///
/// Preconditions (checked in [`Config::new`]): `na > 0`, `nb > 0`,
/// `Kₐ ≤ na`, `K_b ≤ nb`, `0 ≤ i_th < 1`.
#[derive(Clone)]
pub struct Config {
    pub(crate) edges: EdgeList,
    pub(crate) init_ka: usize,
    pub(crate) init_kb: usize,
    pub(crate) i_th: f64,
    pub(crate) dl_kind: DlKindConfig,
    pub(crate) max_sweeps: usize,
    pub(crate) n_cores: usize,
    pub(crate) engine_timeout: Duration,
    pub(crate) q_table_bound: usize,
}

impl Config {
    /// `init_ka`/`init_kb` are the upper-bound starting point `(K̂ₐ, K̂_b)`
    /// the descent begins from; `i_th` is the initial adaptive threshold.
    pub fn new(edges: EdgeList, init_ka: usize, init_kb: usize, i_th: f64) -> Result<Self> {
        if init_ka == 0 || init_ka > edges.na() {
            return Err(Error::Argument(format!(
                "init_ka={init_ka} must be in [1, na={}]",
                edges.na()
            )));
        }
        if init_kb == 0 || init_kb > edges.nb() {
            return Err(Error::Argument(format!(
                "init_kb={init_kb} must be in [1, nb={}]",
                edges.nb()
            )));
        }
        if !(0.0..1.0).contains(&i_th) {
            return Err(Error::Argument(format!(
                "i_th={i_th} must satisfy 0 <= i_th < 1"
            )));
        }
        Ok(Self {
            edges,
            init_ka,
            init_kb,
            i_th,
            dl_kind: DlKindConfig::default(),
            max_sweeps: 1,
            n_cores: 1,
            engine_timeout: Duration::from_secs(3600),
            q_table_bound: 1_000_000,
        })
    }

    pub fn with_dl_kind(mut self, dl_kind: DlKindConfig) -> Self {
        self.dl_kind = dl_kind;
        self
    }

    /// Number of independent partition sweeps the driver requests per point.
    pub fn with_max_sweeps(mut self, max_sweeps: usize) -> Self {
        self.max_sweeps = max_sweeps.max(1);
        self
    }

    /// Bounded worker count for `ParallelExecutor`; `1` means sequential
    /// evaluation with short-circuit-on-improvement (§4.4).
    pub fn with_n_cores(mut self, n_cores: usize) -> Self {
        self.n_cores = n_cores.max(1);
        self
    }

    pub fn with_engine_timeout(mut self, timeout: Duration) -> Self {
        self.engine_timeout = timeout;
        self
    }

    /// Ceiling on the restricted-partition table's `n_max` (see
    /// `RestrictedPartitionTable::build`'s `bound` argument).
    pub fn with_q_table_bound(mut self, bound: usize) -> Self {
        self.q_table_bound = bound;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_edges() -> EdgeList {
        EdgeList::new(4, 4, vec![(0, 4), (1, 5), (2, 6), (3, 7)]).unwrap()
    }

    #[test]
    fn new_accepts_valid_construction() {
        let cfg = Config::new(sample_edges(), 4, 4, 0.1).unwrap();
        assert_eq!(cfg.init_ka, 4);
        assert_eq!(cfg.init_kb, 4);
    }

    #[test]
    fn new_rejects_ka_above_na() {
        assert!(Config::new(sample_edges(), 5, 4, 0.1).is_err());
    }

    #[test]
    fn new_rejects_zero_ka() {
        assert!(Config::new(sample_edges(), 0, 4, 0.1).is_err());
    }

    #[test]
    fn new_rejects_i_th_out_of_range() {
        assert!(Config::new(sample_edges(), 4, 4, 1.0).is_err());
        assert!(Config::new(sample_edges(), 4, 4, -0.1).is_err());
    }

    #[test]
    fn builder_methods_apply_defaults_sensibly() {
        let cfg = Config::new(sample_edges(), 4, 4, 0.1)
            .unwrap()
            .with_max_sweeps(0)
            .with_n_cores(0);
        assert_eq!(cfg.max_sweeps, 1);
        assert_eq!(cfg.n_cores, 1);
    }
}

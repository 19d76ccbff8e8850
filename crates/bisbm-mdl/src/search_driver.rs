//! The merge-and-refine MDL search (§4.7): orchestrates MatrixOps,
//! DescriptionLength, EngineAdapter, ParallelExecutor, and StateStore to walk
//! the `(Kₐ, K_b)` lattice down from an initial upper bound to the point
//! minimizing description length.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bisbm_core::{validate_membership, Error, Membership, RestrictedPartitionTable, Result};
use bisbm_engine_common::{EngineAdapter, ParallelExecutor};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::NamedTempFile;

use crate::config::Config;
use crate::description_length::{self, DlKindConfig};
use crate::matrix_ops::{self, AffinityMatrix};
use crate::state_store::{ConfidentPoint, StateStore};

/// The result of [`SearchDriver::summary`]: the current argmin-DL point.
#[derive(Debug, Clone)]
pub struct Summary {
    pub ka: usize,
    pub kb: usize,
    pub desc_len: f64,
    pub mb: Membership,
    /// Set when the descent reached (1, 1) (§7 ConvergenceWarning): non-fatal,
    /// surfaced alongside the result rather than raised through `?`.
    pub warning: Option<String>,
}

/// Orchestrates the MDL descent over `(Kₐ, K_b)`.
pub struct SearchDriver {
    edges: bisbm_core::EdgeList,
    engine: Arc<dyn EngineAdapter>,
    dl_kind: DlKindConfig,
    q_table: RestrictedPartitionTable,
    max_sweeps: usize,
    n_cores: usize,
    engine_timeout: Duration,
    rt: tokio::runtime::Runtime,

    init_ka: usize,
    init_kb: usize,
    init_i_th: f64,

    ka: usize,
    kb: usize,
    m_e_rs: AffinityMatrix,
    current_mb: Membership,
    i_0: f64,
    adaptive_ratio: f64,
    init_italic_i: f64,
    k_th_nb: usize,
    size_rows_to_run: usize,

    state: StateStore,
    rng: StdRng,
    edgelist_file: Option<NamedTempFile>,
    last_warning: Option<String>,
}

impl SearchDriver {
    pub fn construct(engine: Arc<dyn EngineAdapter>, config: Config) -> Result<Self> {
        let q_table = RestrictedPartitionTable::build(config.edges.e(), config.q_table_bound)?;
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.n_cores.max(1))
            .enable_time()
            .build()
            .map_err(|e| Error::Resource(format!("failed to start driver runtime: {e}")))?;
        Ok(Self {
            edges: config.edges,
            engine,
            dl_kind: config.dl_kind,
            q_table,
            max_sweeps: config.max_sweeps,
            n_cores: config.n_cores,
            engine_timeout: config.engine_timeout,
            rt,
            init_ka: config.init_ka,
            init_kb: config.init_kb,
            init_i_th: config.i_th,
            ka: config.init_ka,
            kb: config.init_kb,
            m_e_rs: Vec::new(),
            current_mb: Vec::new(),
            i_0: config.i_th,
            adaptive_ratio: 0.9,
            init_italic_i: 0.0,
            k_th_nb: 1,
            size_rows_to_run: 1,
            state: StateStore::new(),
            rng: StdRng::from_entropy(),
            edgelist_file: None,
            last_warning: None,
        })
    }

    pub fn set_k_th_neighbor_to_search(&mut self, k: usize) {
        self.k_th_nb = k.max(1);
    }

    pub fn set_adaptive_ratio(&mut self, r: f64) {
        self.adaptive_ratio = r;
    }

    pub fn set_size_rows_to_run(&mut self, n: usize) {
        self.size_rows_to_run = n.max(1);
    }

    /// Run the full descent to termination, returning the confident
    /// `(Kₐ, K_b) -> desc_len` map in visit order.
    pub fn iterate(&mut self) -> Result<IndexMap<(usize, usize), f64>> {
        if self.state.is_empty() {
            self.initialize()?;
        }

        while (self.ka, self.kb) != (1, 1) {
            let (new_ka, new_kb, new_m_e_rs, merge_pair) = self.propose_merge()?;
            let new_m_e_r = matrix_ops::row_sums(&new_m_e_rs);
            let new_italic_i = matrix_ops::italic_i(&new_m_e_rs, &new_m_e_r, self.edges.e());
            let diff = new_italic_i - self.init_italic_i;

            if diff.abs() > self.i_0 * self.init_italic_i {
                self.ka = new_ka;
                self.kb = new_kb;
                self.m_e_rs = new_m_e_rs;

                let desc_len = self.calc_and_update((new_ka, new_kb), None, false)?;
                if !self.state.is_global_minimum(desc_len) {
                    tracing::info!(
                        i_0 = self.i_0,
                        ratio = self.adaptive_ratio,
                        "merge overshot the MDL minimum; tightening adaptive threshold"
                    );
                    self.i_0 *= self.adaptive_ratio;
                    self.back_to_argmin()?;
                }

                if self.check_local_minimum()? {
                    return self.finalize();
                }
            } else {
                self.update_transient(new_ka, new_kb, new_m_e_rs, merge_pair);
            }
        }

        self.check_random_bipartite()?;
        self.finalize()
    }

    /// Force (re-)evaluation of a specific point, bypassing the descent loop.
    pub fn compute_and_update(&mut self, ka: usize, kb: usize, recompute: bool) -> Result<f64> {
        if recompute {
            self.state.remove((ka, kb));
        }
        self.calc_and_update((ka, kb), None, recompute)
    }

    /// The current argmin-DL point, its description length, and membership.
    pub fn summary(&self) -> Result<Summary> {
        let point = self
            .state
            .argmin_desc_len()
            .ok_or_else(|| Error::Argument("no confident points have been committed yet".into()))?;
        let record = self.state.fetch(point).expect("argmin point must be committed");
        Ok(Summary {
            ka: point.0,
            kb: point.1,
            desc_len: record.desc_len,
            mb: record.mb.clone(),
            warning: self.last_warning.clone(),
        })
    }

    /// Reset all state to the values supplied at construction (§7, OQ-5:
    /// constructor defaults, not a hardcoded `(10, 10, 0.1)`).
    pub fn clean(&mut self) {
        self.state.clear();
        self.ka = self.init_ka;
        self.kb = self.init_kb;
        self.i_0 = self.init_i_th;
        self.adaptive_ratio = 0.9;
        self.init_italic_i = 0.0;
        self.current_mb.clear();
        self.m_e_rs.clear();
        self.last_warning = None;
    }

    // -- internal --

    fn initialize(&mut self) -> Result<()> {
        let point = (self.ka, self.kb);
        let mb = self.evaluate_point(point, None)?;
        validate_membership(&self.edges, &mb, point.0, point.1)?;
        let (m_e_rs, m_e_r) = matrix_ops::build_m_e_rs(&self.edges, &mb, point.0, point.1)?;
        let italic_i = matrix_ops::italic_i(&m_e_rs, &m_e_r, self.edges.e());
        let desc_len = self.absolute_dl(&mb, point.0, point.1)?;

        self.init_italic_i = italic_i;
        self.m_e_rs = m_e_rs.clone();
        self.current_mb = mb.clone();
        self.state.commit(
            point,
            ConfidentPoint {
                desc_len,
                m_e_rs,
                italic_i,
                mb,
            },
        );
        tracing::info!(ka = point.0, kb = point.1, desc_len, "initialized search at starting point");
        Ok(())
    }

    fn propose_merge(&mut self) -> Result<(usize, usize, AffinityMatrix, (usize, usize))> {
        let n_candidates = (self.ka + self.kb) * self.size_rows_to_run;
        let mut best: Option<(f64, (usize, usize, AffinityMatrix, (usize, usize)))> = None;
        for _ in 0..n_candidates {
            let (new_ka, new_kb, new_m, pair) =
                matrix_ops::merge_matrix(self.ka, self.kb, &self.m_e_rs, &mut self.rng)?;
            let m_e_r = matrix_ops::row_sums(&new_m);
            let italic_i = matrix_ops::italic_i(&new_m, &m_e_r, self.edges.e());
            let diff = italic_i - self.init_italic_i;
            let replace = match &best {
                None => true,
                Some((best_diff, _)) => diff > *best_diff,
            };
            if replace {
                best = Some((diff, (new_ka, new_kb, new_m, pair)));
            }
        }
        Ok(best.expect("n_candidates is always >= 1").1)
    }

    fn update_transient(
        &mut self,
        new_ka: usize,
        new_kb: usize,
        new_m_e_rs: AffinityMatrix,
        merge_pair: (usize, usize),
    ) {
        let (lo, hi) = if merge_pair.0 < merge_pair.1 {
            merge_pair
        } else {
            (merge_pair.1, merge_pair.0)
        };
        let new_mb: Membership = self
            .current_mb
            .iter()
            .map(|&block| {
                if block == hi {
                    lo
                } else if block < hi {
                    block
                } else {
                    block - 1
                }
            })
            .collect();
        self.state.record_transient((new_ka, new_kb), new_mb.clone());
        self.current_mb = new_mb;
        self.ka = new_ka;
        self.kb = new_kb;
        self.m_e_rs = new_m_e_rs;
    }

    fn back_to_argmin(&mut self) -> Result<()> {
        let point = self
            .state
            .argmin_desc_len()
            .ok_or_else(|| Error::Argument("no confident points recorded to roll back to".into()))?;
        let record = self.state.fetch(point).expect("argmin point must be committed").clone();
        self.ka = point.0;
        self.kb = point.1;
        self.m_e_rs = record.m_e_rs;
        self.current_mb = record.mb;
        self.init_italic_i = record.italic_i;
        Ok(())
    }

    fn check_local_minimum(&mut self) -> Result<bool> {
        let point = (self.ka, self.kb);
        let d = self
            .state
            .fetch(point)
            .expect("point must be committed before the neighborhood test")
            .desc_len;
        let k = self.k_th_nb as isize;

        let mut improved = false;
        'outer: for da in -k..=k {
            for db in -k..=k {
                if da == 0 && db == 0 {
                    continue;
                }
                let na_ = self.ka as isize + da;
                let nb_ = self.kb as isize + db;
                if na_ < 1 || nb_ < 1 {
                    continue;
                }
                let neighbor = (na_ as usize, nb_ as usize);
                let desc_len = self.calc_and_update(neighbor, Some(d), false)?;
                if desc_len < d {
                    improved = true;
                    break 'outer;
                }
            }
        }

        if improved {
            self.back_to_argmin()?;
            Ok(false)
        } else {
            Ok(true)
        }
    }

    fn check_random_bipartite(&mut self) -> Result<()> {
        for corner in [(1, 1), (1, 2), (2, 1), (2, 2)] {
            if corner.0 > self.edges.na() || corner.1 > self.edges.nb() {
                continue;
            }
            self.calc_and_update(corner, None, true)?;
        }
        let argmin = self
            .state
            .argmin_desc_len()
            .ok_or_else(|| Error::Argument("no confident points recorded at termination".into()))?;
        let message = if argmin == (1, 1) {
            "descent reached (1, 1) and it remained the MDL optimum".to_string()
        } else {
            format!("descent reached (1, 1) but {argmin:?} is now the MDL optimum; consider a smaller i_th")
        };
        tracing::warn!(?argmin, "{message}");
        self.last_warning = Some(message);
        Ok(())
    }

    fn finalize(&mut self) -> Result<IndexMap<(usize, usize), f64>> {
        if let Some(file) = self.edgelist_file.take() {
            let _ = file.close();
        }
        let argmin = self.state.argmin_desc_len();
        tracing::info!(?argmin, "search finalized");
        Ok(self.state.confident_desc_len_map())
    }

    /// Evaluate `point`, committing the result unless it is already cached
    /// (or `force` requests a fresh evaluation). On `EngineError`, falls back
    /// to a prior confident result at this point if one exists (§7).
    fn calc_and_update(&mut self, point: (usize, usize), old_desc_len: Option<f64>, force: bool) -> Result<f64> {
        if !force {
            if let Some(record) = self.state.fetch(point) {
                tracing::debug!(?point, "fetched cached confident result");
                return Ok(record.desc_len);
            }
        }

        let mb = match self.evaluate_point(point, old_desc_len) {
            Ok(mb) => mb,
            Err(e @ Error::Engine(_)) => {
                if let Some(record) = self.state.fetch(point) {
                    tracing::warn!(?point, error = %e, "engine failed; keeping prior confident result");
                    return Ok(record.desc_len);
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        validate_membership(&self.edges, &mb, point.0, point.1)?;
        let (m_e_rs, m_e_r) = matrix_ops::build_m_e_rs(&self.edges, &mb, point.0, point.1)?;
        let italic_i = matrix_ops::italic_i(&m_e_rs, &m_e_r, self.edges.e());
        let desc_len = self.absolute_dl(&mb, point.0, point.1)?;

        self.state.commit(
            point,
            ConfidentPoint {
                desc_len,
                m_e_rs,
                italic_i,
                mb: mb.clone(),
            },
        );
        self.init_italic_i = italic_i;
        self.current_mb = mb;
        tracing::info!(ka = point.0, kb = point.1, desc_len, "committed confident point");
        Ok(desc_len)
    }

    fn absolute_dl(&self, mb: &Membership, ka: usize, kb: usize) -> Result<f64> {
        description_length::desc_len_absolute(
            self.edges.na(),
            self.edges.nb(),
            self.edges.e(),
            ka,
            kb,
            &self.edges,
            mb,
            &self.dl_kind,
            &self.q_table,
        )
    }

    /// Request up to `max_sweeps` independent partitions at `point` and
    /// return the one with the lowest absolute-mode description length
    /// (§4.4). Sequential mode short-circuits once a sweep beats
    /// `old_desc_len`; parallel mode fans out via `ParallelExecutor` and
    /// always reduces over every returned sweep.
    fn evaluate_point(&mut self, point: (usize, usize), old_desc_len: Option<f64>) -> Result<Membership> {
        let (ka, kb) = point;
        let edgelist_path = self.edgelist_path()?;
        let na = self.edges.na();
        let nb = self.edges.nb();

        let candidates: Vec<(Membership, f64)> = if self.n_cores > 1 {
            let engine = self.engine.clone();
            let path = edgelist_path.clone();
            let inputs: Vec<usize> = (0..self.max_sweeps).collect();
            let executor = ParallelExecutor::new(self.n_cores);
            let timeout = self.engine_timeout;
            let results = self
                .rt
                .block_on(executor.map(timeout, inputs, move |_| engine.call(&path, na, nb, ka, kb)));

            let mut out = Vec::new();
            for result in results {
                match result {
                    Ok(mb) => {
                        let dl = self.absolute_dl(&mb, ka, kb)?;
                        out.push((mb, dl));
                    }
                    Err(e) => tracing::warn!(error = %e, "sweep failed"),
                }
            }
            if out.is_empty() {
                return Err(Error::Engine("every parallel sweep failed".into()));
            }
            out
        } else {
            let mut out = Vec::new();
            for _ in 0..self.max_sweeps {
                let mb = self.engine.call(&edgelist_path, na, nb, ka, kb)?;
                let dl = self.absolute_dl(&mb, ka, kb)?;
                let beats_old = old_desc_len.map(|old| dl < old).unwrap_or(false);
                out.push((mb, dl));
                if beats_old {
                    break;
                }
            }
            out
        };

        let (best_mb, _) = candidates
            .into_iter()
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .expect("at least one sweep must have produced a result");
        Ok(best_mb)
    }

    fn edgelist_path(&mut self) -> Result<PathBuf> {
        if let Some(file) = &self.edgelist_file {
            return Ok(file.path().to_path_buf());
        }
        let mut file = NamedTempFile::new().map_err(Error::Io)?;
        for &(src, dst) in self.edges.edges() {
            writeln!(file, "{src}\t{dst}").map_err(Error::Io)?;
        }
        file.flush().map_err(Error::Io)?;
        let path = file.path().to_path_buf();
        self.edgelist_file = Some(file);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bisbm_core::EdgeList;
    use bisbm_engine_common::EngineResult;
    use std::path::Path;

    /// An in-process engine that always returns the same membership,
    /// regardless of (ka, kb) -- enough to exercise the driver's plumbing.
    struct FixedEngine {
        mb: Membership,
    }

    impl EngineAdapter for FixedEngine {
        fn call(&self, _edgelist_path: &Path, _na: usize, _nb: usize, _ka: usize, _kb: usize) -> EngineResult<Membership> {
            Ok(self.mb.clone())
        }
    }

    fn complete_bipartite(na: usize, nb: usize) -> EdgeList {
        let mut edges = Vec::new();
        for a in 0..na {
            for b in na..na + nb {
                edges.push((a, b));
            }
        }
        EdgeList::new(na, nb, edges).unwrap()
    }

    #[test]
    fn construct_builds_q_table_and_starting_point() {
        let edges = complete_bipartite(4, 4);
        let config = Config::new(edges, 2, 2, 0.1).unwrap();
        let mb = vec![0, 0, 1, 1, 2, 2, 3, 3];
        let engine = Arc::new(FixedEngine { mb });
        let driver = SearchDriver::construct(engine, config).unwrap();
        assert_eq!((driver.ka, driver.kb), (2, 2));
        assert!(driver.state.is_empty());
    }

    #[test]
    fn initialize_commits_the_starting_point() {
        let edges = complete_bipartite(4, 4);
        let config = Config::new(edges, 2, 2, 0.1).unwrap();
        let mb = vec![0, 0, 1, 1, 2, 2, 3, 3];
        let engine = Arc::new(FixedEngine { mb });
        let mut driver = SearchDriver::construct(engine, config).unwrap();
        driver.initialize().unwrap();
        assert!(driver.state.fetch((2, 2)).is_some());
        assert!(driver.init_italic_i >= 0.0);
    }

    #[test]
    fn summary_fails_before_any_commit() {
        let edges = complete_bipartite(4, 4);
        let config = Config::new(edges, 2, 2, 0.1).unwrap();
        let engine = Arc::new(FixedEngine { mb: vec![0, 0, 1, 1, 2, 2, 3, 3] });
        let driver = SearchDriver::construct(engine, config).unwrap();
        assert!(driver.summary().is_err());
    }

    #[test]
    fn clean_resets_to_constructor_supplied_defaults() {
        let edges = complete_bipartite(4, 4);
        let config = Config::new(edges, 3, 2, 0.2).unwrap();
        let engine = Arc::new(FixedEngine { mb: vec![0, 0, 0, 1, 1, 1, 1] });
        let mut driver = SearchDriver::construct(engine, config).unwrap();
        driver.i_0 = 0.05;
        driver.ka = 1;
        driver.kb = 1;
        driver.clean();
        assert_eq!((driver.ka, driver.kb), (3, 2));
        assert_eq!(driver.i_0, 0.2);
        assert!(driver.state.is_empty());
    }

    #[test]
    fn back_to_argmin_restores_init_italic_i_from_the_rollback_target() {
        // Key invariant (§4.7): after every committed point, init_italic_i
        // must equal italic_I of that point. A rollback lands the driver on
        // a different committed point than the one just evaluated, so its
        // italic_I must come back with it rather than staying pinned to
        // whatever was last computed.
        let edges = complete_bipartite(4, 4);
        let config = Config::new(edges, 2, 2, 0.1).unwrap();
        let engine = Arc::new(FixedEngine { mb: vec![0, 0, 1, 1, 2, 2, 3, 3] });
        let mut driver = SearchDriver::construct(engine, config).unwrap();
        driver.initialize().unwrap();

        driver.state.commit(
            (1, 1),
            ConfidentPoint {
                desc_len: -100.0,
                m_e_rs: vec![vec![0, 4], vec![4, 0]],
                italic_i: 0.42,
                mb: vec![0, 0, 0, 0, 1, 1, 1, 1],
            },
        );
        driver.init_italic_i = 999.0;

        driver.back_to_argmin().unwrap();
        assert_eq!((driver.ka, driver.kb), (1, 1));
        assert_eq!(driver.init_italic_i, 0.42);
    }

    #[test]
    fn update_transient_relabels_merged_block() {
        let edges = complete_bipartite(4, 4);
        let config = Config::new(edges, 2, 2, 0.1).unwrap();
        let engine = Arc::new(FixedEngine { mb: vec![0, 0, 1, 1, 2, 2, 3, 3] });
        let mut driver = SearchDriver::construct(engine, config).unwrap();
        driver.current_mb = vec![0, 1, 2, 0, 1, 2];
        driver.ka = 3;
        driver.kb = 0;
        driver.update_transient(2, 0, vec![vec![0; 2]; 2], (0, 2));
        // block 2 (hi) -> 0 (lo); block 1 stays 1 (since 1 < 2); block 0 -> 0.
        assert_eq!(driver.current_mb, vec![0, 1, 0, 0, 1, 0]);
    }

    #[test]
    fn evaluate_point_sequential_short_circuits_on_improvement() {
        let edges = complete_bipartite(4, 4);
        let config = Config::new(edges, 2, 2, 0.1).unwrap().with_max_sweeps(5);
        let engine = Arc::new(FixedEngine { mb: vec![0, 0, 1, 1, 2, 2, 3, 3] });
        let mut driver = SearchDriver::construct(engine, config).unwrap();
        let mb = driver.evaluate_point((2, 2), Some(f64::INFINITY)).unwrap();
        assert_eq!(mb.len(), 8);
    }
}

//! Memoization of confident results per `(Kₐ, K_b)` and a separate transient
//! trace (§4.6). Insertion order is preserved so the driver's walk can be
//! reproduced for diagnostics; `indexmap` is the direct Rust analogue of the
//! insertion-ordered mapping the original search keeps its confident points
//! in.

use bisbm_core::Membership;
use indexmap::IndexMap;

use crate::matrix_ops::AffinityMatrix;

/// A committed, "confident" result at a given `(Kₐ, K_b)`.
#[derive(Debug, Clone)]
pub struct ConfidentPoint {
    pub desc_len: f64,
    pub m_e_rs: AffinityMatrix,
    pub italic_i: f64,
    pub mb: Membership,
}

/// Ordered map of confident points plus a separate ordered trace of
/// provisional (transient) memberships (§4.6).
#[derive(Default)]
pub struct StateStore {
    confident: IndexMap<(usize, usize), ConfidentPoint>,
    trace: IndexMap<(usize, usize), Membership>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `record` as the confident result at `point`, overwriting any
    /// prior value (commits are never stale: the caller only commits a
    /// recompute it intends to keep).
    pub fn commit(&mut self, point: (usize, usize), record: ConfidentPoint) {
        self.confident.insert(point, record);
    }

    pub fn fetch(&self, point: (usize, usize)) -> Option<&ConfidentPoint> {
        self.confident.get(&point)
    }

    pub fn remove(&mut self, point: (usize, usize)) {
        self.confident.shift_remove(&point);
    }

    /// The committed point with the lowest description length. Ties keep
    /// the first-inserted point, matching a stable sort over insertion order.
    pub fn argmin_desc_len(&self) -> Option<(usize, usize)> {
        self.confident
            .iter()
            .min_by(|a, b| a.1.desc_len.partial_cmp(&b.1.desc_len).unwrap())
            .map(|(point, _)| *point)
    }

    /// True if no committed point beats `desc_len` (so a point just
    /// committed with this DL is, or ties, the current global minimum).
    pub fn is_global_minimum(&self, desc_len: f64) -> bool {
        !self.confident.values().any(|r| r.desc_len < desc_len)
    }

    pub fn record_transient(&mut self, point: (usize, usize), mb: Membership) {
        self.trace.insert(point, mb);
    }

    pub fn transient(&self, point: (usize, usize)) -> Option<&Membership> {
        self.trace.get(&point)
    }

    pub fn clear(&mut self) {
        self.confident.clear();
        self.trace.clear();
    }

    pub fn len(&self) -> usize {
        self.confident.len()
    }

    pub fn is_empty(&self) -> bool {
        self.confident.is_empty()
    }

    /// The `(Kₐ, K_b) -> desc_len` view returned by `iterate()`, in
    /// insertion (i.e. visit) order.
    pub fn confident_desc_len_map(&self) -> IndexMap<(usize, usize), f64> {
        self.confident
            .iter()
            .map(|(point, record)| (*point, record.desc_len))
            .collect()
    }
}

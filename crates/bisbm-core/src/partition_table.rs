//! Restricted integer partition table `q(n, k)`: the number of ways to write
//! `n` as an unordered sum of positive integers each `<= k`.
//!
//! Built once via the recurrence `q(n, k) = q(n, k-1) + q(n-k, k)` with base
//! cases `q(0, k) = 1` and `q(n, 0) = 0` for `n > 0`, then frozen: the only
//! writer is the build phase, after which the table is a read-only view that
//! workers can share freely (a memory-mapped file once persisted).
//!
//! Cells are only ever consumed as `log q(n, k)` downstream, so a
//! byte-valued table would be sufficient in principle; we use `u32` instead
//! (see `DESIGN.md`) so a caller cannot silently saturate into a wrong log
//! value for the block sizes this search actually visits.

use crate::error::{Error, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

enum Storage {
    Owned(Vec<u32>),
    Mapped(Mmap),
}

/// `q(n, k)` for `n, k` in `[0, n_max]`, built once and read many times.
pub struct RestrictedPartitionTable {
    n_max: usize,
    storage: Storage,
}

impl RestrictedPartitionTable {
    /// Build the full table for `n, k in [0, n_max]`.
    ///
    /// `bound` is the implementation-configured ceiling on `n_max` (the
    /// table is `(n_max+1)^2` cells); exceeding it is a [`Error::Resource`],
    /// not a panic, since it usually means the caller passed an
    /// unexpectedly large edge count rather than a programming error.
    pub fn build(n_max: usize, bound: usize) -> Result<Self> {
        if n_max > bound {
            return Err(Error::Resource(format!(
                "q-table n_max {n_max} exceeds configured bound {bound}"
            )));
        }
        let dim = n_max + 1;
        let mut cells = vec![0u32; dim * dim];
        for k in 0..dim {
            cells[k] = 1; // q(0, k) = 1
        }
        for n in 1..dim {
            for k in 1..dim {
                let without_k = cells[n * dim + (k - 1)];
                let with_k = if n >= k { cells[(n - k) * dim + k] } else { 0 };
                cells[n * dim + k] = without_k.saturating_add(with_k);
            }
        }
        tracing::debug!(n_max, "built restricted-partition table");
        Ok(Self {
            n_max,
            storage: Storage::Owned(cells),
        })
    }

    /// `q(n, k)`. Both arguments must be within the built bound.
    pub fn q(&self, n: usize, k: usize) -> Result<u32> {
        if n > self.n_max || k > self.n_max {
            return Err(Error::Argument(format!(
                "q({n}, {k}) requested outside built bound {}",
                self.n_max
            )));
        }
        let dim = self.n_max + 1;
        let idx = n * dim + k;
        match &self.storage {
            Storage::Owned(cells) => Ok(cells[idx]),
            Storage::Mapped(mmap) => {
                let offset = idx * 4;
                let bytes: [u8; 4] = mmap[offset..offset + 4].try_into().unwrap();
                Ok(u32::from_le_bytes(bytes))
            }
        }
    }

    pub fn n_max(&self) -> usize {
        self.n_max
    }

    /// Persist as a row-major, little-endian `u32` memory map at `path`.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path).map_err(Error::Io)?;
        match &self.storage {
            Storage::Owned(cells) => {
                for cell in cells {
                    file.write_all(&cell.to_le_bytes()).map_err(Error::Io)?;
                }
            }
            Storage::Mapped(mmap) => file.write_all(mmap).map_err(Error::Io)?,
        }
        Ok(())
    }

    /// Reopen a table previously written by [`Self::persist`] as a read-only
    /// memory-mapped view, without recomputing the recurrence.
    pub fn open_mapped(path: impl AsRef<Path>, n_max: usize) -> Result<Self> {
        let file = File::open(path).map_err(Error::Io)?;
        // SAFETY: the file is exclusively produced by `persist` in this
        // process's lifetime, and is never mutated while mapped.
        let mmap = unsafe { Mmap::map(&file) }.map_err(Error::Io)?;
        let dim = n_max + 1;
        if mmap.len() != dim * dim * 4 {
            return Err(Error::Resource(format!(
                "q-table file size {} does not match n_max {n_max}",
                mmap.len()
            )));
        }
        Ok(Self {
            n_max,
            storage: Storage::Mapped(mmap),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // The defining recurrence, re-checked against the built table for
        // arbitrary (n, k) rather than the hand-picked cases above.
        #[test]
        fn recurrence_holds_for_arbitrary_n_k(n in 1usize..30, k in 1usize..30) {
            let bound = n.max(k);
            let t = RestrictedPartitionTable::build(bound, 10_000).unwrap();
            let without_k = t.q(n, k - 1).unwrap();
            let with_k = if n >= k { t.q(n - k, k).unwrap() } else { 0 };
            prop_assert_eq!(t.q(n, k).unwrap(), without_k.saturating_add(with_k));
        }

        // q(n, k) is non-decreasing in k: allowing larger parts never
        // removes a previously-countable partition.
        #[test]
        fn q_is_nondecreasing_in_k(n in 0usize..30, k in 1usize..30) {
            let bound = n.max(k);
            let t = RestrictedPartitionTable::build(bound, 10_000).unwrap();
            prop_assert!(t.q(n, k).unwrap() >= t.q(n, k - 1).unwrap());
        }
    }

    #[test]
    fn base_cases() {
        let t = RestrictedPartitionTable::build(10, 10_000).unwrap();
        for k in 0..=10 {
            assert_eq!(t.q(0, k).unwrap(), 1, "q(0, {k}) must be 1");
        }
        for n in 1..=10 {
            assert_eq!(t.q(n, 0).unwrap(), 0, "q({n}, 0) must be 0");
        }
    }

    #[test]
    fn known_values() {
        let t = RestrictedPartitionTable::build(10, 10_000).unwrap();
        // partitions of 4 into parts <= 2: 2+2, 2+1+1, 1+1+1+1
        assert_eq!(t.q(4, 2).unwrap(), 3);
        // partitions of 5 into parts <= 5 = all partitions of 5
        assert_eq!(t.q(5, 5).unwrap(), 7);
    }

    #[test]
    fn rejects_out_of_bound_query() {
        let t = RestrictedPartitionTable::build(5, 10_000).unwrap();
        assert!(t.q(6, 0).is_err());
        assert!(t.q(0, 6).is_err());
    }

    #[test]
    fn rejects_n_max_past_configured_bound() {
        assert!(RestrictedPartitionTable::build(200, 100).is_err());
    }

    #[test]
    fn mmap_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.bin");
        let built = RestrictedPartitionTable::build(100, 10_000).unwrap();
        built.persist(&path).unwrap();
        let reopened = RestrictedPartitionTable::open_mapped(&path, 100).unwrap();
        for n in 0..=100 {
            for k in 0..=100 {
                assert_eq!(built.q(n, k).unwrap(), reopened.q(n, k).unwrap());
            }
        }
    }
}

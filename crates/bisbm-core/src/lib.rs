//! # bisbm-core: data model and shared types for biSBM Kₐ/K_b search
//!
//! Provides the bipartite edge-list model, the unified error type, and the
//! restricted-partition table `q(n, k)` used by the description-length
//! calculator's model-entropy terms.
//!
//! ## Modules
//!
//! - [`graph`] - edge-list parsing and the type-a/type-b partition model.
//! - [`error`] - the unified [`Error`] enum shared across the workspace.
//! - [`partition_table`] - `q(n, k)`, built once and frozen behind a
//!   memory-mapped view.

pub mod error;
pub mod graph;
pub mod partition_table;

pub use error::{Error, Result};
pub use graph::{parse_edgelist, parse_types, EdgeList};
pub use partition_table::RestrictedPartitionTable;

/// A block membership assignment: `mb[node] = block id`.
///
/// Invariant: `max(mb) + 1 == ka + kb`, with type-a nodes mapping into
/// `[0, ka)` and type-b nodes into `[ka, ka + kb)`.
pub type Membership = Vec<usize>;

/// Verify the block-membership invariant (§3, §8 P2) for a given `(ka, kb)`.
pub fn validate_membership(edges: &EdgeList, mb: &Membership, ka: usize, kb: usize) -> Result<()> {
    if mb.len() != edges.n() {
        return Err(Error::Argument(format!(
            "membership length {} does not match node count {}",
            mb.len(),
            edges.n()
        )));
    }
    let max_block = mb.iter().copied().max();
    if max_block != Some(ka + kb - 1) {
        return Err(Error::Argument(format!(
            "max(mb) + 1 = {:?} does not equal ka + kb = {}",
            max_block.map(|m| m + 1),
            ka + kb
        )));
    }
    for (node, &block) in mb.iter().enumerate() {
        if edges.is_type_a(node) {
            if block >= ka {
                return Err(Error::Argument(format!(
                    "type-a node {node} maps to block {block}, outside [0, {ka})"
                )));
            }
        } else if block < ka || block >= ka + kb {
            return Err(Error::Argument(format!(
                "type-b node {node} maps to block {block}, outside [{ka}, {})",
                ka + kb
            )));
        }
    }
    Ok(())
}

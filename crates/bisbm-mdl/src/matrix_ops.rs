//! Block-affinity matrix construction, profile likelihood, and the merge
//! operator (§4.2).

use bisbm_core::{EdgeList, Error, Membership, Result};
use rand::Rng;

/// A symmetric block-affinity matrix, `m_e_rs[r][s]` = edge count between
/// blocks `r` and `s`.
pub type AffinityMatrix = Vec<Vec<u64>>;

/// Row sums of an [`AffinityMatrix`]: total half-edges incident to each block.
pub fn row_sums(m_e_rs: &AffinityMatrix) -> Vec<u64> {
    m_e_rs.iter().map(|row| row.iter().sum()).collect()
}

/// Build `m_e_rs` and `m_e_r` from an edge list and a membership assignment.
///
/// Every edge must connect a type-a block (`< ka`) to a type-b block
/// (`>= ka`); an edge landing inside one side's block range is a
/// [`Error::Format`], since that can only happen for an `mb` that does not
/// actually respect the type-a/type-b split.
pub fn build_m_e_rs(
    edges: &EdgeList,
    mb: &Membership,
    ka: usize,
    kb: usize,
) -> Result<(AffinityMatrix, Vec<u64>)> {
    let k = ka + kb;
    if mb.len() != edges.n() {
        return Err(Error::Argument(format!(
            "membership length {} does not match node count {}",
            mb.len(),
            edges.n()
        )));
    }
    let mut m_e_rs = vec![vec![0u64; k]; k];
    for &(src, dst) in edges.edges() {
        let (r, s) = (mb[src], mb[dst]);
        if r >= k || s >= k {
            return Err(Error::Argument(format!(
                "block id {r} or {s} outside [0, {k})"
            )));
        }
        if (r < ka) == (s < ka) {
            return Err(Error::Format(format!(
                "intra-type edge in block space: blocks {r} and {s} are on the same side"
            )));
        }
        m_e_rs[r][s] += 1;
        m_e_rs[s][r] += 1;
    }
    let m_e_r = row_sums(&m_e_rs);
    Ok((m_e_rs, m_e_r))
}

/// The profile likelihood (italic-I) of §3: non-negative, increasing with
/// stronger modular structure. Summands with `m_rs = 0` are omitted.
pub fn italic_i(m_e_rs: &AffinityMatrix, m_e_r: &[u64], e: usize) -> f64 {
    if e == 0 {
        return 0.0;
    }
    let two_e = 2.0 * e as f64;
    let k = m_e_rs.len();
    let mut total = 0.0;
    for (r, row) in m_e_rs.iter().enumerate().take(k) {
        for (s, &m_rs) in row.iter().enumerate().take(k) {
            if m_rs == 0 {
                continue;
            }
            let m_rs = m_rs as f64;
            total += (m_rs / two_e) * (m_rs * two_e / (m_e_r[r] as f64 * m_e_r[s] as f64)).ln();
        }
    }
    total
}

/// Merge two blocks on one side of the partition, chosen by a weighted coin
/// flip over `(ka, kb)` (forced to the non-singleton side when one side has
/// only one block).
///
/// Returns the new `(ka, kb)`, the collapsed matrix, and the pre-merge block
/// ids (in the original labeling, unordered) that were merged.
pub fn merge_matrix<R: Rng>(
    ka: usize,
    kb: usize,
    m_e_rs: &AffinityMatrix,
    rng: &mut R,
) -> Result<(usize, usize, AffinityMatrix, (usize, usize))> {
    if ka == 0 || kb == 0 {
        return Err(Error::Argument("ka and kb must be positive".into()));
    }
    let k = ka + kb;
    if m_e_rs.len() != k || m_e_rs.iter().any(|row| row.len() != k) {
        return Err(Error::Argument(
            "m_e_rs shape does not match ka + kb".into(),
        ));
    }

    let merge_side_a = if ka == 1 {
        false
    } else if kb == 1 {
        true
    } else {
        rng.gen_range(0..k) < ka
    };

    let (side_lo, side_hi) = if merge_side_a { (0, ka) } else { (ka, k) };
    let mut perm: Vec<usize> = (side_lo..side_hi).collect();
    shuffle(&mut perm, rng);
    let merge_pair = (perm[0], perm[1]);

    let new_ka = if merge_side_a { ka - 1 } else { ka };
    let new_kb = if merge_side_a { kb } else { kb - 1 };
    let new_k = new_ka + new_kb;

    let merged_base = if merge_side_a { 0 } else { new_ka };
    let mut remap = vec![usize::MAX; k];
    remap[perm[0]] = merged_base;
    remap[perm[1]] = merged_base;
    for (offset, &old) in perm[2..].iter().enumerate() {
        remap[old] = merged_base + 1 + offset;
    }
    let (other_lo, other_hi) = if merge_side_a { (ka, k) } else { (0, ka) };
    let other_base = if merge_side_a { new_ka } else { 0 };
    for (offset, old) in (other_lo..other_hi).enumerate() {
        remap[old] = other_base + offset;
    }

    let mut merged = vec![vec![0u64; new_k]; new_k];
    for (r, row) in m_e_rs.iter().enumerate() {
        for (s, &val) in row.iter().enumerate() {
            if val == 0 {
                continue;
            }
            merged[remap[r]][remap[s]] += val;
        }
    }

    Ok((new_ka, new_kb, merged, merge_pair))
}

fn shuffle<R: Rng>(items: &mut [usize], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

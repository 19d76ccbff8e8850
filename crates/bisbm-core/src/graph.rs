//! Bipartite edge-list data model.
//!
//! An edge list `E` over nodes partitioned into type-a (`na` nodes) and
//! type-b (`nb` nodes). Every edge crosses types; an intra-type edge is a
//! format error. Nodes are 0-indexed: type-a nodes occupy `[0, na)`,
//! type-b nodes occupy `[na, na + nb)`.

use crate::error::{Error, Result};
use serde::Serialize;
use std::io::BufRead;

/// A validated bipartite edge list.
#[derive(Debug, Clone, Serialize)]
pub struct EdgeList {
    na: usize,
    nb: usize,
    edges: Vec<(usize, usize)>,
}

impl EdgeList {
    /// Construct from raw 0-indexed edges, checking every edge crosses types.
    pub fn new(na: usize, nb: usize, edges: Vec<(usize, usize)>) -> Result<Self> {
        if na == 0 {
            return Err(Error::Argument("na must be positive".into()));
        }
        if nb == 0 {
            return Err(Error::Argument("nb must be positive".into()));
        }
        let n = na + nb;
        for &(src, dst) in &edges {
            if src >= n || dst >= n {
                return Err(Error::Format(format!(
                    "edge ({src}, {dst}) references a node outside [0, {n})"
                )));
            }
            if (src < na) == (dst < na) {
                return Err(Error::Format(format!(
                    "intra-type edge ({src}, {dst}): both endpoints are on the same side"
                )));
            }
        }
        Ok(Self { na, nb, edges })
    }

    pub fn na(&self) -> usize {
        self.na
    }

    pub fn nb(&self) -> usize {
        self.nb
    }

    pub fn n(&self) -> usize {
        self.na + self.nb
    }

    pub fn e(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// True if `node` is a type-a node (`node < na`).
    pub fn is_type_a(&self, node: usize) -> bool {
        node < self.na
    }
}

/// Parse a tab- (or caller-chosen delimiter-) separated edge list.
///
/// Blank lines and a trailing `\r` are tolerated. A line that does not split
/// into exactly two integer fields is a [`Error::Format`].
pub fn parse_edgelist(reader: impl BufRead, delimiter: char) -> Result<Vec<(usize, usize)>> {
    let mut edges = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(Error::Io)?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split(delimiter);
        let src = fields.next();
        let dst = fields.next();
        let (src, dst) = match (src, dst) {
            (Some(s), Some(d)) if fields.next().is_none() => (s, d),
            _ => {
                return Err(Error::Format(format!(
                    "line {}: expected exactly two fields separated by {delimiter:?}, got {line:?}",
                    lineno + 1
                )))
            }
        };
        let src: usize = src.trim().parse().map_err(|_| {
            Error::Format(format!("line {}: non-integer node id {src:?}", lineno + 1))
        })?;
        let dst: usize = dst.trim().parse().map_err(|_| {
            Error::Format(format!("line {}: non-integer node id {dst:?}", lineno + 1))
        })?;
        edges.push((src, dst));
    }
    Ok(edges)
}

/// Parse a types file: one `1` (type-a) or `2` (type-b) per line, in node-id order.
///
/// Returns `(na, nb)`.
pub fn parse_types(reader: impl BufRead) -> Result<(usize, usize)> {
    let mut na = 0usize;
    let mut nb = 0usize;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(Error::Io)?;
        let line = line.trim();
        match line {
            "1" => na += 1,
            "2" => nb += 1,
            "" => continue,
            other => {
                return Err(Error::Format(format!(
                    "line {}: expected \"1\" or \"2\", got {other:?}",
                    lineno + 1
                )))
            }
        }
    }
    Ok((na, nb))
}

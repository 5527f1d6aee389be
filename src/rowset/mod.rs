//! Row-set collection: per-node ranges over one shared row-index buffer.
//!
//! Active tree nodes own disjoint contiguous ranges of a single
//! process-wide buffer of row ids. Splitting a node re-orders rows within
//! its range only; at all times the union of active leaf ranges equals the
//! root range.

use crate::core::context::Context;
use crate::core::types::{NodeIndex, RowIndex};
use rayon::prelude::*;

/// A node's contiguous range inside the shared buffer, as offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elem {
    /// First buffer offset owned by the node.
    pub begin: usize,
    /// One past the last buffer offset owned by the node.
    pub end: usize,
}

impl Elem {
    /// Number of rows in the range.
    #[inline]
    pub fn size(&self) -> usize {
        self.end - self.begin
    }
}

/// Ordered per-node ranges over a shared row-index buffer.
#[derive(Debug, Clone, Default)]
pub struct RowSetCollection {
    buf: Vec<RowIndex>,
    elems: Vec<Option<Elem>>,
}

impl RowSetCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes the identity range `[base_rowid, base_rowid + n)` as the
    /// root node's rows (node 0). Large fills run on the context's pool.
    pub fn init(&mut self, ctx: &Context, n: usize, base_rowid: RowIndex) {
        self.buf.resize(n, 0);
        if n >= 1024 {
            ctx.pool().install(|| {
                self.buf.par_iter_mut().enumerate().for_each(|(i, r)| {
                    *r = base_rowid + i;
                });
            });
        } else {
            for (i, r) in self.buf.iter_mut().enumerate() {
                *r = base_rowid + i;
            }
        }
        self.elems.clear();
        self.elems.push(Some(Elem { begin: 0, end: n }));
    }

    /// The shared row-index buffer.
    #[inline]
    pub fn data(&self) -> &[RowIndex] {
        &self.buf
    }

    /// Mutable access to the shared buffer, for the partition merge phase.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [RowIndex] {
        &mut self.buf
    }

    /// The range of a node. Panics if the node has no range (programmer
    /// error per the partitioning contract).
    pub fn elem(&self, nid: NodeIndex) -> Elem {
        self.elems
            .get(nid)
            .copied()
            .flatten()
            .unwrap_or_else(|| panic!("node {nid} has no row range"))
    }

    /// Whether the node currently owns a range.
    pub fn contains(&self, nid: NodeIndex) -> bool {
        matches!(self.elems.get(nid), Some(Some(_)))
    }

    /// The rows of a node, in their current buffer order.
    pub fn rows(&self, nid: NodeIndex) -> &[RowIndex] {
        let e = self.elem(nid);
        &self.buf[e.begin..e.end]
    }

    /// Node ids that currently own a range (active leaves).
    pub fn active_nodes(&self) -> Vec<NodeIndex> {
        self.elems
            .iter()
            .enumerate()
            .filter_map(|(nid, e)| e.map(|_| nid))
            .collect()
    }

    /// Splits `parent`'s range contiguously into `[begin, begin + n_left)`
    /// and `[begin + n_left, end)` and attaches them to the child node ids.
    /// The parent stops being an active leaf.
    ///
    /// # Panics
    /// When `n_left + n_right != parent.size()` or the parent owns no range.
    pub fn add_split(
        &mut self,
        parent: NodeIndex,
        left: NodeIndex,
        right: NodeIndex,
        n_left: usize,
        n_right: usize,
    ) {
        let e = self.elem(parent);
        assert_eq!(
            n_left + n_right,
            e.size(),
            "add_split: child sizes must cover the parent range"
        );
        let needed = left.max(right) + 1;
        if self.elems.len() < needed {
            self.elems.resize(needed, None);
        }
        self.elems[parent] = None;
        self.elems[left] = Some(Elem {
            begin: e.begin,
            end: e.begin + n_left,
        });
        self.elems[right] = Some(Elem {
            begin: e.begin + n_left,
            end: e.end,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::new(2).unwrap()
    }

    #[test]
    fn test_init_identity() {
        let mut rs = RowSetCollection::new();
        rs.init(&ctx(), 5, 10);
        assert_eq!(rs.rows(0), &[10, 11, 12, 13, 14]);
        assert_eq!(rs.elem(0).size(), 5);
    }

    #[test]
    fn test_init_large_runs_on_context_pool() {
        let mut rs = RowSetCollection::new();
        rs.init(&ctx(), 4096, 7);
        assert_eq!(rs.data()[0], 7);
        assert_eq!(rs.data()[4095], 7 + 4095);
        assert!(rs.data().windows(2).all(|w| w[1] == w[0] + 1));
    }

    #[test]
    fn test_add_split_ranges() {
        let mut rs = RowSetCollection::new();
        rs.init(&ctx(), 6, 0);
        rs.add_split(0, 1, 2, 4, 2);
        assert!(!rs.contains(0));
        assert_eq!(rs.elem(1), Elem { begin: 0, end: 4 });
        assert_eq!(rs.elem(2), Elem { begin: 4, end: 6 });

        rs.add_split(1, 3, 4, 1, 3);
        let active = rs.active_nodes();
        assert_eq!(active, vec![2, 3, 4]);

        // union of active leaves covers the root range, disjointly
        let mut covered = vec![false; 6];
        for nid in active {
            let e = rs.elem(nid);
            for i in e.begin..e.end {
                assert!(!covered[i]);
                covered[i] = true;
            }
        }
        assert!(covered.iter().all(|&c| c));
    }

    #[test]
    #[should_panic(expected = "child sizes")]
    fn test_add_split_size_mismatch_panics() {
        let mut rs = RowSetCollection::new();
        rs.init(&ctx(), 4, 0);
        rs.add_split(0, 1, 2, 3, 2);
    }

    #[test]
    fn test_empty_child_range() {
        let mut rs = RowSetCollection::new();
        rs.init(&ctx(), 4, 0);
        rs.add_split(0, 1, 2, 0, 4);
        assert_eq!(rs.elem(1).size(), 0);
        assert_eq!(rs.elem(2).size(), 4);
        assert!(rs.rows(1).is_empty());
    }
}

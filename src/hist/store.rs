//! Histogram storage: elementwise region operations and the node pool.
//!
//! A histogram is a dense `Array1` of gradient pairs, one per global bin.
//! Regions for distinct nodes are disjoint allocations handed out by
//! [`HistogramPool`], which recycles freed regions and caps the number of
//! live histograms with least-recently-used eviction.

use crate::core::constants::DEFAULT_HIST_POOL_SIZE;
use crate::core::types::{GradientPair, GradientSum, NodeIndex};
use ndarray::Array1;
use std::collections::HashMap;

/// One node's histogram: a gradient pair per global bin.
pub type HistRow<T> = Array1<GradientPair<T>>;

/// Allocates a zeroed histogram of `n_bins` pairs.
pub fn alloc_hist<T: GradientSum>(n_bins: usize) -> HistRow<T> {
    Array1::from_elem(n_bins, GradientPair::zero())
}

/// Fills a histogram with zeros.
pub fn init_hist<T: GradientSum>(hist: &mut HistRow<T>) {
    hist.fill(GradientPair::zero());
}

/// Copies `src` into `dst`. Sizes must match.
pub fn copy_hist<T: GradientSum>(dst: &mut HistRow<T>, src: &HistRow<T>) {
    assert_eq!(dst.len(), src.len(), "histogram size mismatch");
    dst.assign(src);
}

/// Pair-wise `dst[i] = a[i] - b[i]`. Sizes must match.
pub fn subtract_hist<T: GradientSum>(dst: &mut HistRow<T>, a: &HistRow<T>, b: &HistRow<T>) {
    assert_eq!(a.len(), b.len(), "histogram size mismatch");
    assert_eq!(dst.len(), a.len(), "histogram size mismatch");
    for (d, (&x, &y)) in dst.iter_mut().zip(a.iter().zip(b.iter())) {
        *d = x - y;
    }
}

/// Sums every bin of a histogram into one pair.
pub fn sum_hist<T: GradientSum>(hist: &HistRow<T>) -> GradientPair<T> {
    hist.iter().fold(GradientPair::zero(), |acc, &p| acc + p)
}

/// Bounded pool of per-node histogram regions.
///
/// Nodes acquire zeroed regions on demand; released regions go back to a
/// free list, and once `capacity` regions are live the least recently
/// touched node is evicted to make room. Regions for distinct live nodes
/// never alias.
#[derive(Debug)]
pub struct HistogramPool<T: GradientSum> {
    n_bins: usize,
    capacity: usize,
    slots: Vec<HistRow<T>>,
    node_to_slot: HashMap<NodeIndex, usize>,
    free_slots: Vec<usize>,
    last_used: HashMap<NodeIndex, u64>,
    clock: u64,
}

impl<T: GradientSum> HistogramPool<T> {
    /// Creates a pool for histograms of `n_bins` pairs with the default
    /// cache bound.
    pub fn new(n_bins: usize) -> Self {
        Self::with_capacity(n_bins, DEFAULT_HIST_POOL_SIZE)
    }

    /// Creates a pool for histograms of `n_bins` pairs, caching at most
    /// `capacity` of them.
    pub fn with_capacity(n_bins: usize, capacity: usize) -> Self {
        assert!(capacity > 0, "histogram pool capacity must be positive");
        HistogramPool {
            n_bins,
            capacity,
            slots: Vec::new(),
            node_to_slot: HashMap::new(),
            free_slots: Vec::new(),
            last_used: HashMap::new(),
            clock: 0,
        }
    }

    /// Global bin count of every pooled histogram.
    #[inline]
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// True when `nid` currently owns a region.
    pub fn contains(&self, nid: NodeIndex) -> bool {
        self.node_to_slot.contains_key(&nid)
    }

    fn touch(&mut self, nid: NodeIndex) {
        self.clock += 1;
        self.last_used.insert(nid, self.clock);
    }

    /// Ensures a zeroed region for `nid`, recycling or evicting as needed.
    pub fn acquire(&mut self, nid: NodeIndex) {
        if let Some(&slot) = self.node_to_slot.get(&nid) {
            init_hist(&mut self.slots[slot]);
            self.touch(nid);
            return;
        }
        let slot = if let Some(slot) = self.free_slots.pop() {
            init_hist(&mut self.slots[slot]);
            slot
        } else if self.node_to_slot.len() < self.capacity {
            self.slots.push(alloc_hist(self.n_bins));
            self.slots.len() - 1
        } else {
            let victim = self
                .node_to_slot
                .keys()
                .min_by_key(|n| self.last_used.get(n).copied().unwrap_or(0))
                .copied();
            let victim = match victim {
                Some(v) => v,
                None => unreachable!("capacity > 0 implies a mapped node"),
            };
            log::debug!("histogram pool: evicting node {}", victim);
            let slot = self.node_to_slot.remove(&victim).unwrap_or(0);
            self.last_used.remove(&victim);
            init_hist(&mut self.slots[slot]);
            slot
        };
        self.node_to_slot.insert(nid, slot);
        self.touch(nid);
    }

    /// The node's histogram, if live.
    pub fn get(&self, nid: NodeIndex) -> Option<&HistRow<T>> {
        self.node_to_slot.get(&nid).map(|&s| &self.slots[s])
    }

    /// Mutable access to the node's histogram, if live.
    pub fn get_mut(&mut self, nid: NodeIndex) -> Option<&mut HistRow<T>> {
        if let Some(&slot) = self.node_to_slot.get(&nid) {
            self.touch(nid);
            Some(&mut self.slots[slot])
        } else {
            None
        }
    }

    /// Returns the node's region to the free list.
    pub fn release(&mut self, nid: NodeIndex) {
        if let Some(slot) = self.node_to_slot.remove(&nid) {
            self.last_used.remove(&nid);
            self.free_slots.push(slot);
        }
    }

    /// Derives `child = parent - sibling` into the child's region.
    ///
    /// All three nodes must be live; the child region is overwritten.
    pub fn subtraction_trick(&mut self, child: NodeIndex, sibling: NodeIndex, parent: NodeIndex) {
        let child_slot = self.slot_of(child);
        let sibling_slot = self.slot_of(sibling);
        let parent_slot = self.slot_of(parent);
        assert!(
            child_slot != sibling_slot && child_slot != parent_slot && sibling_slot != parent_slot,
            "subtraction trick requires three distinct regions"
        );
        // Move the child region out so the other two can be borrowed shared.
        let mut dst = std::mem::replace(&mut self.slots[child_slot], Array1::from_vec(Vec::new()));
        subtract_hist(&mut dst, &self.slots[parent_slot], &self.slots[sibling_slot]);
        self.slots[child_slot] = dst;
        self.touch(child);
    }

    fn slot_of(&self, nid: NodeIndex) -> usize {
        match self.node_to_slot.get(&nid) {
            Some(&s) => s,
            None => panic!("node {} has no live histogram", nid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn filled(vals: &[(f64, f64)]) -> HistRow<f64> {
        vals.iter().map(|&(g, h)| GradientPair::new(g, h)).collect()
    }

    #[test]
    fn test_subtract_and_sum() {
        let a = filled(&[(3.0, 1.0), (2.0, 2.0)]);
        let b = filled(&[(1.0, 0.5), (0.5, 1.0)]);
        let mut d = alloc_hist::<f64>(2);
        subtract_hist(&mut d, &a, &b);
        assert_eq!(d[0], GradientPair::new(2.0, 0.5));
        assert_eq!(d[1], GradientPair::new(1.5, 1.0));

        let s = sum_hist(&d);
        assert_relative_eq!(s.grad, 3.5);
        assert_relative_eq!(s.hess, 1.5);
    }

    #[test]
    #[should_panic(expected = "size mismatch")]
    fn test_subtract_size_mismatch_panics() {
        let a = alloc_hist::<f64>(2);
        let b = alloc_hist::<f64>(3);
        let mut d = alloc_hist::<f64>(2);
        subtract_hist(&mut d, &a, &b);
    }

    #[test]
    fn test_pool_acquire_zeroes_and_recycles() {
        let mut pool: HistogramPool<f64> = HistogramPool::with_capacity(4, 8);
        pool.acquire(0);
        pool.get_mut(0).unwrap()[1] = GradientPair::new(1.0, 2.0);
        pool.release(0);

        pool.acquire(5);
        // recycled region comes back zeroed
        assert_eq!(pool.get(5).unwrap()[1], GradientPair::zero());
        assert!(!pool.contains(0));
    }

    #[test]
    fn test_pool_lru_eviction() {
        let mut pool: HistogramPool<f64> = HistogramPool::with_capacity(2, 2);
        pool.acquire(1);
        pool.acquire(2);
        pool.get_mut(1); // node 2 is now the oldest
        pool.acquire(3);
        assert!(pool.contains(1));
        assert!(!pool.contains(2));
        assert!(pool.contains(3));
    }

    #[test]
    fn test_pool_subtraction_trick() {
        let mut pool: HistogramPool<f64> = HistogramPool::with_capacity(2, 4);
        pool.acquire(0);
        pool.acquire(1);
        pool.acquire(2);
        copy_hist(pool.get_mut(0).unwrap(), &filled(&[(4.0, 4.0), (2.0, 2.0)]));
        copy_hist(pool.get_mut(1).unwrap(), &filled(&[(1.0, 3.0), (0.5, 1.0)]));
        pool.subtraction_trick(2, 1, 0);
        let r = pool.get(2).unwrap();
        assert_eq!(r[0], GradientPair::new(3.0, 1.0));
        assert_eq!(r[1], GradientPair::new(1.5, 1.0));
    }
}

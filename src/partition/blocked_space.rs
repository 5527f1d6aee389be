//! Blocked 2-D task space over (node, row-range) pairs.
//!
//! Each active node's row range is chopped into fixed-size blocks; one
//! (node, block) pair is one task. Scheduling is a static assignment of
//! tasks over the context pool.

use crate::core::context::Context;
use rayon::prelude::*;
use std::ops::Range;

/// A flattened blocked space: `tasks[i] = (node_in_set, local row range)`.
#[derive(Debug, Clone)]
pub struct BlockedSpace2d {
    tasks: Vec<(usize, Range<usize>)>,
    first_task: Vec<usize>,
    block_size: usize,
}

impl BlockedSpace2d {
    /// Builds the space for `n_nodes` nodes whose sizes come from `size_fn`,
    /// chopped into blocks of `block_size` rows.
    ///
    /// Ranges are local to the node (`0..size`), so the same space drives
    /// both the partition pass and the merge pass.
    pub fn new(n_nodes: usize, size_fn: impl Fn(usize) -> usize, block_size: usize) -> Self {
        let mut tasks = Vec::new();
        let mut first_task = Vec::with_capacity(n_nodes + 1);
        for node in 0..n_nodes {
            first_task.push(tasks.len());
            let size = size_fn(node);
            let mut begin = 0;
            while begin < size {
                let end = (begin + block_size).min(size);
                tasks.push((node, begin..end));
                begin = end;
            }
        }
        first_task.push(tasks.len());
        BlockedSpace2d {
            tasks,
            first_task,
            block_size,
        }
    }

    /// Total number of tasks.
    #[inline]
    pub fn size(&self) -> usize {
        self.tasks.len()
    }

    /// Number of tasks belonging to `node`.
    #[inline]
    pub fn n_tasks_of(&self, node: usize) -> usize {
        self.first_task[node + 1] - self.first_task[node]
    }

    /// Flat task id of the block of `node` starting at local row `begin`.
    #[inline]
    pub fn task_idx(&self, node: usize, begin: usize) -> usize {
        self.first_task[node] + begin / self.block_size
    }

    /// The `(node, range)` of a flat task id.
    #[inline]
    pub fn task(&self, idx: usize) -> (usize, Range<usize>) {
        let (node, ref r) = self.tasks[idx];
        (node, r.clone())
    }
}

/// Runs `f(node_in_set, local_range)` for every task on the context pool.
///
/// Tasks of one node never overlap, and `f` only receives disjoint ranges,
/// so implementations may write to per-task scratch without locks.
pub fn parallel_for_2d<F>(ctx: &Context, space: &BlockedSpace2d, f: F)
where
    F: Fn(usize, Range<usize>) + Send + Sync,
{
    ctx.pool().install(|| {
        space
            .tasks
            .par_iter()
            .for_each(|(node, r)| f(*node, r.clone()));
    });
}

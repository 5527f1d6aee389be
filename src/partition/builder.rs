//! Parallel partition builder: mask/partition, offsets, merge.
//!
//! Each (node, block) task partitions its block of row indices into
//! left-destined and right-destined scratch buffers. After all tasks
//! finish, exclusive prefix sums over per-block left counts give every
//! block its destination offset inside the node's range, and the merge
//! phase copies the scratch into the shared row-index buffer. The shared
//! buffer itself is never written during the mask phase, so a build is
//! atomic from the row set's perspective until `add_split` is applied.

use crate::core::constants::PARTITION_BLOCK_SIZE;
use crate::core::types::RowIndex;
use std::cell::UnsafeCell;

#[derive(Debug, Default)]
struct BlockInfo {
    left: Vec<RowIndex>,
    right: Vec<RowIndex>,
    left_offset: usize,
    right_offset: usize,
}

/// Per-task scratch cell. Tasks are assigned disjoint ids by the blocked
/// space, so each cell has exactly one writer during a parallel phase.
#[derive(Default)]
struct TaskCell(UnsafeCell<BlockInfo>);

// SAFETY: a cell is only accessed mutably through its unique task id inside
// one parallel phase, and phases are separated by the pool's join.
unsafe impl Sync for TaskCell {}

/// Builds per-node left/right partitions over a blocked task space.
#[derive(Default)]
pub struct PartitionBuilder {
    tasks: Vec<TaskCell>,
    /// Exclusive prefix of task counts per node, length `n_nodes + 1`.
    node_task_offsets: Vec<usize>,
    /// Per-node (n_left, n_right) totals, filled by `calculate_row_offsets`.
    totals: Vec<(usize, usize)>,
}

impl PartitionBuilder {
    /// Creates an empty builder; call [`init`](Self::init) per batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes the scratch for a batch of `n_nodes` nodes with `n_tasks`
    /// total blocks. `n_tasks_fn(node)` reports the node's block count.
    pub fn init(&mut self, n_tasks: usize, n_nodes: usize, n_tasks_fn: impl Fn(usize) -> usize) {
        self.tasks.clear();
        self.tasks.resize_with(n_tasks, TaskCell::default);
        self.node_task_offsets.clear();
        self.node_task_offsets.push(0);
        for node in 0..n_nodes {
            let prev = *self.node_task_offsets.last().unwrap_or(&0);
            self.node_task_offsets.push(prev + n_tasks_fn(node));
        }
        debug_assert_eq!(*self.node_task_offsets.last().unwrap_or(&0), n_tasks);
        self.totals = vec![(0, 0); n_nodes];
    }

    /// Flat task id of the block of `node_in_set` starting at local row
    /// `begin`.
    #[inline]
    pub fn task_idx(&self, node_in_set: usize, begin: usize) -> usize {
        self.node_task_offsets[node_in_set] + begin / PARTITION_BLOCK_SIZE
    }

    #[allow(clippy::mut_from_ref)]
    #[inline]
    unsafe fn task_mut(&self, task_id: usize) -> &mut BlockInfo {
        &mut *self.tasks[task_id].0.get()
    }

    /// Reserves a task's scratch. Must be called by the task's owner before
    /// partitioning into it.
    pub fn allocate_for_task(&self, task_id: usize) {
        // SAFETY: unique writer per task id during a parallel phase.
        let info = unsafe { self.task_mut(task_id) };
        info.left.clear();
        info.right.clear();
        info.left.reserve(PARTITION_BLOCK_SIZE);
        info.right.reserve(PARTITION_BLOCK_SIZE);
    }

    /// Partitions one block of rows into the task's left/right scratch.
    ///
    /// `rows` is the block's slice of the parent's current row order;
    /// `go_left` encodes the split decision (bin threshold, category
    /// bitset, or aggregated mask bits) including the default direction.
    pub fn partition_range(
        &self,
        task_id: usize,
        rows: &[RowIndex],
        go_left: impl Fn(RowIndex) -> bool,
    ) {
        // SAFETY: unique writer per task id during a parallel phase.
        let info = unsafe { self.task_mut(task_id) };
        for &rid in rows {
            if go_left(rid) {
                info.left.push(rid);
            } else {
                info.right.push(rid);
            }
        }
    }

    /// Computes each task's destination offsets inside its node's range.
    ///
    /// Left blocks pack forward from the range start in task order; right
    /// blocks fill the tail, mirroring from the end of the range.
    pub fn calculate_row_offsets(&mut self) {
        let n_nodes = self.totals.len();
        for node in 0..n_nodes {
            let begin = self.node_task_offsets[node];
            let end = self.node_task_offsets[node + 1];

            let mut n_left = 0usize;
            let mut n_right = 0usize;
            for t in begin..end {
                // SAFETY: parallel phases are complete; exclusive &mut self.
                let info = unsafe { self.task_mut(t) };
                info.left_offset = n_left;
                n_left += info.left.len();
                n_right += info.right.len();
            }
            let mut right_cursor = n_left;
            for t in begin..end {
                let info = unsafe { self.task_mut(t) };
                info.right_offset = right_cursor;
                right_cursor += info.right.len();
            }
            self.totals[node] = (n_left, n_right);
        }
    }

    /// Copies one task's left and right scratch into its final positions.
    ///
    /// # Safety
    /// `dst` must point at the start of the owning node's range in the
    /// shared row-index buffer and stay valid for the node's full size;
    /// offsets must have been computed by `calculate_row_offsets`. Distinct
    /// tasks write disjoint destination sub-ranges.
    pub unsafe fn merge_to_array(&self, task_id: usize, dst: *mut RowIndex) {
        let info = &*self.tasks[task_id].0.get();
        std::ptr::copy_nonoverlapping(info.left.as_ptr(), dst.add(info.left_offset), info.left.len());
        std::ptr::copy_nonoverlapping(
            info.right.as_ptr(),
            dst.add(info.right_offset),
            info.right.len(),
        );
    }

    /// Rows routed left for the node, after `calculate_row_offsets`.
    #[inline]
    pub fn n_left_elems(&self, node_in_set: usize) -> usize {
        self.totals[node_in_set].0
    }

    /// Rows routed right for the node, after `calculate_row_offsets`.
    #[inline]
    pub fn n_right_elems(&self, node_in_set: usize) -> usize {
        self.totals[node_in_set].1
    }
}

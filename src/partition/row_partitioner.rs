//! Row partitioner: drives the partition phases for a batch of splits.
//!
//! One partitioner owns the row-set collection for a tree, the partition
//! builder scratch, and (for column-split data) the bit-exchange helper.
//! `update_position` applies a batch of chosen splits: it derives integer
//! split conditions, partitions every node's rows over a blocked task
//! space, compacts the results back into the shared row-index buffer, and
//! installs the child ranges.

use crate::collective::Collective;
use crate::core::constants::PARTITION_BLOCK_SIZE;
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::types::{NodeIndex, RowIndex};
use crate::matrix::BinnedMatrix;
use crate::partition::blocked_space::{parallel_for_2d, BlockedSpace2d};
use crate::partition::builder::PartitionBuilder;
use crate::partition::column_split::ColumnSplitHelper;
use crate::partition::split::{decide_row, find_split_conditions, SplitEntry};
use crate::partition::SendPtr;
use crate::rowset::RowSetCollection;
use std::sync::Arc;

/// Per-tree row partitioner.
pub struct RowPartitioner {
    base_rowid: RowIndex,
    row_set: RowSetCollection,
    builder: PartitionBuilder,
    column_split: Option<(ColumnSplitHelper, Arc<dyn Collective>)>,
}

impl RowPartitioner {
    /// Creates a partitioner for `n_rows` rows starting at `base_rowid`.
    ///
    /// # Arguments
    /// * `ctx` - Execution context (identity init runs on its pool)
    /// * `n_rows` - Row count of this data partition
    /// * `base_rowid` - First global row id of this partition
    /// * `column_split` - Collective handle when the data is split by
    ///   column across workers; `None` for the local path
    pub fn new(
        ctx: &Context,
        n_rows: usize,
        base_rowid: RowIndex,
        column_split: Option<Arc<dyn Collective>>,
    ) -> Self {
        let mut p = RowPartitioner {
            base_rowid,
            row_set: RowSetCollection::new(),
            builder: PartitionBuilder::new(),
            column_split: None,
        };
        p.reset(ctx, n_rows, base_rowid, column_split);
        p
    }

    /// Re-initializes for a new tree: identity root range, fresh scratch.
    pub fn reset(
        &mut self,
        ctx: &Context,
        n_rows: usize,
        base_rowid: RowIndex,
        column_split: Option<Arc<dyn Collective>>,
    ) {
        self.base_rowid = base_rowid;
        self.row_set.init(ctx, n_rows, base_rowid);
        self.column_split =
            column_split.map(|coll| (ColumnSplitHelper::new(n_rows), coll));
    }

    /// First global row id of this partition.
    pub fn base_rowid(&self) -> RowIndex {
        self.base_rowid
    }

    /// The row-set collection (current node ranges).
    pub fn row_set(&self) -> &RowSetCollection {
        &self.row_set
    }

    /// The rows of one node, in current buffer order.
    pub fn node_rows(&self, nid: NodeIndex) -> &[RowIndex] {
        self.row_set.rows(nid)
    }

    /// Applies a batch of splits, re-ordering each split node's rows into a
    /// left block followed by a right block and attaching the child ranges.
    pub fn update_position(
        &mut self,
        ctx: &Context,
        matrix: &BinnedMatrix,
        splits: &[SplitEntry],
    ) -> Result<()> {
        if splits.is_empty() {
            return Ok(());
        }
        assert_eq!(
            self.base_rowid,
            matrix.base_rowid(),
            "partitioner and matrix disagree on base_rowid"
        );

        // 1. Find the integer split condition for each split.
        let split_conditions = find_split_conditions(splits, matrix);

        // 2. Blocked space over (node_in_set, row block) and scratch sizing.
        let row_set = &self.row_set;
        let space = BlockedSpace2d::new(
            splits.len(),
            |i| row_set.elem(splits[i].nid).size(),
            PARTITION_BLOCK_SIZE,
        );
        self.builder
            .init(space.size(), splits.len(), |i| space.n_tasks_of(i));

        // 3. Partition every block into per-task scratch; the shared buffer
        // is untouched until the merge.
        match &mut self.column_split {
            Some((helper, collective)) => {
                helper.partition(
                    ctx,
                    collective.as_ref(),
                    &space,
                    matrix,
                    splits,
                    &split_conditions,
                    &self.builder,
                    &self.row_set,
                )?;
            }
            None => {
                let builder = &self.builder;
                let base_rowid = self.base_rowid;
                let row_set = &self.row_set;
                parallel_for_2d(ctx, &space, |node_in_set, r| {
                    let split = &splits[node_in_set];
                    let cond = split_conditions[node_in_set];
                    let task_id = builder.task_idx(node_in_set, r.start);
                    builder.allocate_for_task(task_id);
                    let rows = &row_set.rows(split.nid)[r];
                    builder.partition_range(task_id, rows, |rid: RowIndex| {
                        match decide_row(matrix, split, cond, rid - base_rowid) {
                            Some(go_left) => go_left,
                            None => split.default_left,
                        }
                    });
                });
            }
        }

        // 4. Per-node destination offsets for every block.
        self.builder.calculate_row_offsets();

        // 5. Merge per-task scratch into the shared buffer; destination
        // sub-ranges are disjoint across tasks.
        let node_begins: Vec<usize> = splits
            .iter()
            .map(|s| self.row_set.elem(s.nid).begin)
            .collect();
        let builder = &self.builder;
        let buf_ptr = SendPtr(self.row_set.data_mut().as_mut_ptr());
        parallel_for_2d(ctx, &space, |node_in_set, r| {
            // capture the SendPtr wrapper whole, not its raw-pointer field
            let buf_ptr = &buf_ptr;
            let task_id = builder.task_idx(node_in_set, r.start);
            // SAFETY: offsets were just computed, tasks write disjoint
            // destination ranges inside their node's range.
            unsafe {
                builder.merge_to_array(task_id, buf_ptr.0.add(node_begins[node_in_set]));
            }
        });

        // 6. Install the child ranges.
        for (i, split) in splits.iter().enumerate() {
            let n_left = self.builder.n_left_elems(i);
            let n_right = self.builder.n_right_elems(i);
            log::trace!(
                "split node {}: n_left={} n_right={}",
                split.nid,
                n_left,
                n_right
            );
            self.row_set
                .add_split(split.nid, split.left_child, split.right_child, n_left, n_right);
        }
        Ok(())
    }
}

//! Column-split partitioning: exchange decision bits across workers.
//!
//! When the matrix is split by column, no single worker sees all features.
//! Each worker first records, for every row of every node being split,
//! whether *its* columns put the row right (decision bit) and whether it
//! lacks the split feature's value entirely (missing bit). Decision bits
//! are OR-reduced across workers because each row's defining feature lives
//! on exactly one worker; missing bits are AND-reduced because a row is
//! globally missing only if no worker has a value for it. A second pass
//! partitions rows by the aggregated bits.

use crate::collective::{Collective, ReduceOp};
use crate::core::bitfield::{check_bit, set_bit, BitField};
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::types::RowIndex;
use crate::matrix::BinnedMatrix;
use crate::partition::blocked_space::{parallel_for_2d, BlockedSpace2d};
use crate::partition::builder::PartitionBuilder;
use crate::partition::split::{decide_row, SplitEntry};
use crate::partition::SendPtr;
use crate::rowset::RowSetCollection;

/// Distributed variant of the partition pass for column-split data.
#[derive(Debug, Default)]
pub struct ColumnSplitHelper {
    n_rows: usize,
    decision: BitField,
    missing: BitField,
    tloc_decision: Vec<u8>,
    tloc_missing: Vec<u8>,
}

impl ColumnSplitHelper {
    /// Sizes the helper for `n_rows` rows on this data partition.
    pub fn new(n_rows: usize) -> Self {
        ColumnSplitHelper {
            n_rows,
            decision: BitField::with_size(n_rows),
            missing: BitField::with_size(n_rows),
            tloc_decision: Vec::new(),
            tloc_missing: Vec::new(),
        }
    }

    /// Runs the full column-split partition for one batch of splits,
    /// filling the partition builder's scratch exactly like the local path.
    #[allow(clippy::too_many_arguments)]
    pub fn partition(
        &mut self,
        ctx: &Context,
        collective: &dyn Collective,
        space: &BlockedSpace2d,
        matrix: &BinnedMatrix,
        splits: &[SplitEntry],
        split_conditions: &[i32],
        builder: &PartitionBuilder,
        row_set: &RowSetCollection,
    ) -> Result<()> {
        let base_rowid = matrix.base_rowid();
        let n_bytes = BitField::compute_storage_size(self.n_rows);
        let n_threads = ctx.threads();

        self.decision.clear();
        self.missing.clear();
        self.tloc_decision.clear();
        self.tloc_decision.resize(n_threads * n_bytes, 0);
        self.tloc_missing.clear();
        self.tloc_missing.resize(n_threads * n_bytes, 0);

        // Phase 1: record local decisions into thread-local replicas. A row
        // is scanned by exactly one task, and replicas are indexed by pool
        // thread, so writes never conflict.
        let dec_ptr = SendPtr(self.tloc_decision.as_mut_ptr());
        let mis_ptr = SendPtr(self.tloc_missing.as_mut_ptr());
        parallel_for_2d(ctx, space, |node_in_set, r| {
            // capture the SendPtr wrappers whole, not their raw-pointer fields
            let (dec_ptr, mis_ptr) = (&dec_ptr, &mis_ptr);
            let tidx = rayon::current_thread_index().unwrap_or(0);
            debug_assert!(tidx < n_threads);
            // SAFETY: each pool thread owns its own replica span, and a
            // thread never runs two tasks concurrently.
            let (decision, missing) = unsafe {
                (
                    std::slice::from_raw_parts_mut(dec_ptr.0.add(tidx * n_bytes), n_bytes),
                    std::slice::from_raw_parts_mut(mis_ptr.0.add(tidx * n_bytes), n_bytes),
                )
            };
            let split = &splits[node_in_set];
            let cond = split_conditions[node_in_set];
            let rows = &row_set.rows(split.nid)[r];
            for &rid in rows {
                let bit = rid - base_rowid;
                match decide_row(matrix, split, cond, bit) {
                    Some(go_left) => {
                        if !go_left {
                            set_bit(decision, bit);
                        }
                    }
                    None => set_bit(missing, bit),
                }
            }
        });

        // Phase 2: reduce thread-local replicas into the worker vectors.
        for t in 0..n_threads {
            let span = t * n_bytes..(t + 1) * n_bytes;
            self.decision.or_assign(&self.tloc_decision[span.clone()]);
            self.missing.or_assign(&self.tloc_missing[span]);
        }

        // Phase 3: aggregate across workers.
        log::debug!(
            "column-split allreduce: {} bytes x2, world={}",
            n_bytes,
            collective.world_size()
        );
        collective.allreduce_bits(self.decision.data_mut(), ReduceOp::BitwiseOr)?;
        collective.allreduce_bits(self.missing.data_mut(), ReduceOp::BitwiseAnd)?;

        // Phase 4: partition rows by the aggregated bits.
        let decision = &self.decision;
        let missing = &self.missing;
        parallel_for_2d(ctx, space, |node_in_set, r| {
            let split = &splits[node_in_set];
            let task_id = builder.task_idx(node_in_set, r.start);
            builder.allocate_for_task(task_id);
            let rows = &row_set.rows(split.nid)[r];
            builder.partition_range(task_id, rows, |rid: RowIndex| {
                let bit = rid - base_rowid;
                if check_bit(missing.data(), bit) {
                    split.default_left
                } else {
                    !check_bit(decision.data(), bit)
                }
            });
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collective::SingleWorker;
    use crate::core::constants::PARTITION_BLOCK_SIZE;
    use crate::matrix::BinnedMatrix;

    fn cuts(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32).collect()
    }

    #[test]
    fn test_single_worker_matches_bits() {
        // 4 rows, 1 feature with 4 bins; sparse layout so row 3 is missing
        let s = 4u32; // sentinel
        let matrix =
            BinnedMatrix::sparse(vec![0, 2, 3, s], vec![0, 4], cuts(4), 4, 1, 0).unwrap();
        let ctx = Context::new(2).unwrap();
        let mut row_set = RowSetCollection::new();
        row_set.init(&ctx, 4, 0);

        let splits = vec![SplitEntry::numeric(0, 1, 2, 0, 1.0, false)];
        let conds = vec![1i32];

        let space = BlockedSpace2d::new(1, |_| 4, PARTITION_BLOCK_SIZE);
        let mut builder = PartitionBuilder::new();
        builder.init(space.size(), 1, |n| space.n_tasks_of(n));

        let mut helper = ColumnSplitHelper::new(4);
        helper
            .partition(
                &ctx,
                &SingleWorker,
                &space,
                &matrix,
                &splits,
                &conds,
                &builder,
                &row_set,
            )
            .unwrap();
        builder.calculate_row_offsets();

        // bins 0,1 -> left; bins 2,3 -> right; missing row 3 -> right
        assert_eq!(builder.n_left_elems(0), 1);
        assert_eq!(builder.n_right_elems(0), 3);
    }
}

//! Row partitioning over a blocked (node, row-block) task space.

pub mod blocked_space;
pub mod builder;
pub mod column_split;
pub mod row_partitioner;
pub mod split;

pub use blocked_space::{parallel_for_2d, BlockedSpace2d};
pub use builder::PartitionBuilder;
pub use column_split::ColumnSplitHelper;
pub use row_partitioner::RowPartitioner;
pub use split::{decide_row, find_split_conditions, CategoryBitset, SplitEntry};

/// Raw pointer wrapper for handing disjoint write regions to pool tasks.
/// Callers guarantee the regions written through it never alias.
#[derive(Copy, Clone)]
pub(crate) struct SendPtr<T>(pub *mut T);

unsafe impl<T> Send for SendPtr<T> {}
unsafe impl<T> Sync for SendPtr<T> {}

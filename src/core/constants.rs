//! System constants for the histogram / partition core.

/// Number of rows per partition task block. Each (node, block) pair is one
/// independent unit of work during row partitioning.
pub const PARTITION_BLOCK_SIZE: usize = 2048;

/// Number of rows per private histogram block on the CPU build path.
/// Blocks are reduced in index order, so the result does not depend on the
/// thread count.
pub const HIST_BLOCK_SIZE: usize = 512;

/// Maximum number of private block histograms alive at once on the CPU
/// build path. Rows beyond one batch are processed in further batches, so
/// build scratch is bounded by `HIST_BLOCK_BATCH * n_bins` pairs no matter
/// how many rows a node has.
pub const HIST_BLOCK_BATCH: usize = 64;

/// Maximum per-feature bin count for the device builder's local-private
/// variant. Features wider than this fall back to the buffered variant.
pub const MAX_LOCAL_HIST_BINS: usize = 16;

/// Default bound on the number of node histograms kept cached at once.
pub const DEFAULT_HIST_POOL_SIZE: usize = 256;

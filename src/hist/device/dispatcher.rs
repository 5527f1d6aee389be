//! Kernel selection for the device histogram path.
//!
//! One dispatcher call plans a single histogram build: how wide the work
//! groups are, how the rows are blocked, and which of the three kernel
//! variants runs (buffered, buffered with local private bins, or atomic).

use crate::core::constants::MAX_LOCAL_HIST_BINS;
use crate::hist::device::DeviceProperties;
use serde::{Deserialize, Serialize};

/// Row blocking of the main build kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockParams {
    /// Rows swept by one block.
    pub size: usize,
    /// Number of blocks, each with a private histogram slice (buffered
    /// variants) or a slice of the atomic grid (atomic variant).
    pub nblocks: usize,
}

/// Planned kernel configuration for one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistDispatchConfig {
    /// Lanes per work group. Advisory in this executor: the lane sweep of
    /// the main kernels collapses to a per-block loop, so only `block`
    /// affects scheduling; a hardware backend would launch
    /// `nblocks x work_group_size` grids from the same plan.
    pub work_group_size: usize,
    /// Row blocking.
    pub block: BlockParams,
    /// Use the local-private-bins kernel (dense, narrow features only).
    pub use_local_hist: bool,
    /// Use the atomic kernel (no reduce step).
    pub use_atomics: bool,
}

/// Plans kernel configurations from input shape and device properties.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HistDispatcher {
    /// Test hook: force the atomic kernel regardless of the policy.
    pub force_atomic_use: bool,
}

impl HistDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plans one build.
    ///
    /// `max_n_blocks` caps the scratch the caller is willing to hold
    /// (`nblocks * n_bins` pair accumulators for the buffered variants).
    #[allow(clippy::too_many_arguments)]
    pub fn plan(
        &self,
        is_dense: bool,
        n_rows: usize,
        max_n_blocks: usize,
        n_bins: usize,
        n_columns: usize,
        max_num_bins: usize,
        min_num_bins: usize,
        properties: &DeviceProperties,
    ) -> HistDispatchConfig {
        let work_group_size = n_columns
            .next_power_of_two()
            .clamp(properties.sub_group_size, properties.max_work_group_size);

        let block_size = properties.max_work_group_size.max(1);
        let wanted = n_rows.div_ceil(block_size).max(1);
        let nblocks = wanted.min(max_n_blocks.max(1)).min(properties.max_compute_units.max(1));
        let block = BlockParams {
            size: n_rows.div_ceil(nblocks),
            nblocks,
        };

        // Atomics win when rows dwarf bins and the hardware can do the
        // 64-bit adds; local private bins need dense input and features
        // narrow enough to live in registers.
        let use_atomics = self.force_atomic_use
            || (properties.has_fp64_atomics && n_bins > 0 && n_rows >= 16 * n_bins);
        let use_local_hist = !use_atomics && is_dense && max_num_bins <= MAX_LOCAL_HIST_BINS;

        let config = HistDispatchConfig {
            work_group_size,
            block,
            use_local_hist,
            use_atomics,
        };
        log::debug!(
            "hist dispatch: rows={} bins={} cols={} bin widths=[{},{}] dense={} -> {:?}",
            n_rows,
            n_bins,
            n_columns,
            min_num_bins,
            max_num_bins,
            is_dense,
            config
        );
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> DeviceProperties {
        DeviceProperties {
            max_work_group_size: 256,
            sub_group_size: 8,
            has_fp64_atomics: true,
            max_compute_units: 16,
            local_mem_size: 64 * 1024,
        }
    }

    #[test]
    fn test_atomics_for_row_heavy_input() {
        let d = HistDispatcher::new();
        let c = d.plan(true, 1_000_000, 32, 256, 16, 16, 16, &props());
        assert!(c.use_atomics);
        assert!(!c.use_local_hist);
    }

    #[test]
    fn test_local_hist_for_narrow_dense() {
        let d = HistDispatcher::new();
        let c = d.plan(true, 1000, 32, 256, 16, 16, 4, &props());
        assert!(!c.use_atomics);
        assert!(c.use_local_hist);
    }

    #[test]
    fn test_buffered_for_wide_bins() {
        let d = HistDispatcher::new();
        let c = d.plan(true, 1000, 32, 4096, 16, 256, 4, &props());
        assert!(!c.use_atomics);
        assert!(!c.use_local_hist);
    }

    #[test]
    fn test_sparse_never_uses_local_hist() {
        let d = HistDispatcher::new();
        let c = d.plan(false, 1000, 32, 256, 16, 16, 16, &props());
        assert!(!c.use_local_hist);
    }

    #[test]
    fn test_force_atomic_hook() {
        let d = HistDispatcher {
            force_atomic_use: true,
        };
        let c = d.plan(true, 8, 32, 4096, 16, 256, 4, &props());
        assert!(c.use_atomics);
    }

    #[test]
    fn test_no_fp64_atomics_falls_back() {
        let mut p = props();
        p.has_fp64_atomics = false;
        let d = HistDispatcher::new();
        let c = d.plan(true, 1_000_000, 32, 256, 16, 256, 4, &props());
        assert!(c.use_atomics);
        let c = d.plan(true, 1_000_000, 32, 256, 16, 256, 4, &p);
        assert!(!c.use_atomics);
    }

    #[test]
    fn test_block_covers_all_rows() {
        let d = HistDispatcher::new();
        let c = d.plan(true, 1000, 4, 4096, 16, 256, 4, &props());
        assert!(c.block.size * c.block.nblocks >= 1000);
        assert!(c.block.nblocks <= 4);
    }
}

//! Device histogram builder, emulated on the context pool.
//!
//! The device path is expressed against an in-order [`DeviceQueue`] that
//! returns [`Event`] completion tokens. Kernels are submitted with their
//! dependencies and the caller chains fills, builds, reductions, and
//! subtractions exactly as it would against a hardware queue; the queue
//! here completes each submission before returning its token, which is a
//! valid schedule of any dependency graph over an in-order queue.

pub mod dispatcher;
mod kernels;

pub use dispatcher::{BlockParams, HistDispatchConfig, HistDispatcher};
pub use kernels::AtomicAdd;

use crate::core::context::Context;
use crate::core::types::{GradPair, GradientPair, GradientSum, RowIndex};
use crate::hist::store::HistRow;
use crate::matrix::{BinStorage, BinnedMatrix};
use std::cell::Cell;

/// Completion token of one submitted kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    seq: u64,
}

/// Capabilities of the executing device.
#[derive(Debug, Clone)]
pub struct DeviceProperties {
    /// Maximum lanes per work group.
    pub max_work_group_size: usize,
    /// Lanes per sub-group (minimum useful work-group width).
    pub sub_group_size: usize,
    /// Hardware support for 64-bit float atomics.
    pub has_fp64_atomics: bool,
    /// Parallel compute units.
    pub max_compute_units: usize,
    /// Bytes of work-group local memory.
    pub local_mem_size: usize,
}

impl Default for DeviceProperties {
    fn default() -> Self {
        DeviceProperties {
            max_work_group_size: 256,
            sub_group_size: 8,
            has_fp64_atomics: true,
            max_compute_units: num_cpus::get(),
            local_mem_size: 64 * 1024,
        }
    }
}

/// Single in-order submission queue.
///
/// Submissions run on the context pool and complete before their token is
/// returned, preserving every dependency the caller declares.
pub struct DeviceQueue {
    ctx: Context,
    completed: Cell<u64>,
}

impl DeviceQueue {
    /// Creates a queue over the context's pool.
    pub fn new(ctx: &Context) -> Self {
        DeviceQueue {
            ctx: ctx.clone(),
            completed: Cell::new(0),
        }
    }

    /// Submits one kernel after its dependencies and returns its token.
    pub fn submit(&self, deps: &[Event], kernel: impl FnOnce() + Send) -> Event {
        debug_assert!(
            deps.iter().all(|e| e.seq <= self.completed.get()),
            "dependency submitted to a different queue"
        );
        self.ctx.pool().install(kernel);
        let seq = self.completed.get() + 1;
        self.completed.set(seq);
        Event { seq }
    }

    /// Blocks until the event's kernel has finished.
    pub fn wait(&self, event: Event) {
        // in-order queue: everything up to `completed` is already done
        debug_assert!(event.seq <= self.completed.get());
    }
}

/// Asynchronous zero-fill of a histogram region.
pub fn fill_hist_async<T: GradientSum>(
    queue: &DeviceQueue,
    hist: &mut HistRow<T>,
    deps: &[Event],
) -> Event {
    queue.submit(deps, || {
        ndarray::Zip::from(hist).par_for_each(|p| *p = GradientPair::zero());
    })
}

/// Asynchronous copy between histogram regions of equal size.
pub fn copy_hist_async<T: GradientSum>(
    queue: &DeviceQueue,
    dst: &mut HistRow<T>,
    src: &HistRow<T>,
    deps: &[Event],
) -> Event {
    assert_eq!(dst.len(), src.len(), "histogram size mismatch");
    queue.submit(deps, || {
        ndarray::Zip::from(dst).and(src).par_for_each(|d, &s| *d = s);
    })
}

/// Asynchronous pair-wise `dst = a - b`.
pub fn subtract_hist_async<T: GradientSum>(
    queue: &DeviceQueue,
    dst: &mut HistRow<T>,
    a: &HistRow<T>,
    b: &HistRow<T>,
    deps: &[Event],
) -> Event {
    assert_eq!(a.len(), b.len(), "histogram size mismatch");
    assert_eq!(dst.len(), a.len(), "histogram size mismatch");
    queue.submit(deps, || {
        ndarray::Zip::from(dst)
            .and(a)
            .and(b)
            .par_for_each(|d, &x, &y| *d = x - y);
    })
}

/// Derives a sibling histogram from parent and built child, asynchronously.
pub fn subtraction_trick_async<T: GradientSum>(
    queue: &DeviceQueue,
    sibling: &mut HistRow<T>,
    built_child: &HistRow<T>,
    parent: &HistRow<T>,
    deps: &[Event],
) -> Event {
    subtract_hist_async(queue, sibling, parent, built_child, deps)
}

/// Work-group-parallel histogram builder.
///
/// Owns the `nblocks x n_bins` scratch for the buffered kernel variants
/// and replans the kernel configuration per call.
pub struct DeviceHistBuilder<T: AtomicAdd> {
    properties: DeviceProperties,
    dispatcher: HistDispatcher,
    max_n_blocks: usize,
    scratch: Vec<GradientPair<T>>,
}

impl<T: AtomicAdd> DeviceHistBuilder<T> {
    /// Creates a builder; `max_n_blocks` caps the buffered scratch at
    /// `max_n_blocks * n_bins` pair accumulators.
    pub fn new(properties: DeviceProperties, dispatcher: HistDispatcher, max_n_blocks: usize) -> Self {
        assert!(max_n_blocks > 0, "need at least one block");
        DeviceHistBuilder {
            properties,
            dispatcher,
            max_n_blocks,
            scratch: Vec::new(),
        }
    }

    /// Builds the node histogram and returns the token of the last kernel.
    ///
    /// The graph is fill -> main -> reduce for the buffered variants and
    /// fill -> main for the atomic variant. `gpairs` is indexed by
    /// partition-local row.
    pub fn build_hist(
        &mut self,
        queue: &DeviceQueue,
        matrix: &BinnedMatrix,
        rows: &[RowIndex],
        gpairs: &[GradPair],
        hist: &mut HistRow<T>,
        deps: &[Event],
    ) -> Event {
        let n_bins = matrix.n_bins();
        assert_eq!(hist.len(), n_bins, "histogram size mismatch");
        assert_eq!(gpairs.len(), matrix.n_rows(), "gradient vector size mismatch");

        let config = self.dispatcher.plan(
            matrix.is_dense(),
            rows.len(),
            self.max_n_blocks,
            n_bins,
            matrix.n_features(),
            matrix.max_num_bins(),
            matrix.min_num_bins(),
            &self.properties,
        );

        if config.use_atomics {
            let fill = fill_hist_async(queue, hist, deps);
            let hist_slice = contiguous_mut(hist);
            return queue.submit(&[fill], || match matrix.index() {
                BinStorage::U8(idx) if matrix.is_dense() => kernels::main_atomic_dense(
                    idx,
                    matrix.offsets(),
                    matrix.row_stride(),
                    matrix.base_rowid(),
                    rows,
                    gpairs,
                    hist_slice,
                ),
                BinStorage::U16(idx) if matrix.is_dense() => kernels::main_atomic_dense(
                    idx,
                    matrix.offsets(),
                    matrix.row_stride(),
                    matrix.base_rowid(),
                    rows,
                    gpairs,
                    hist_slice,
                ),
                BinStorage::U32(idx) if matrix.is_dense() => kernels::main_atomic_dense(
                    idx,
                    matrix.offsets(),
                    matrix.row_stride(),
                    matrix.base_rowid(),
                    rows,
                    gpairs,
                    hist_slice,
                ),
                BinStorage::U32(idx) => kernels::main_atomic_sparse(
                    idx,
                    matrix.row_stride(),
                    matrix.base_rowid(),
                    rows,
                    gpairs,
                    hist_slice,
                ),
                _ => unreachable!("sparse matrices store 32-bit bins"),
            });
        }

        self.scratch
            .resize(config.block.nblocks * n_bins, GradientPair::zero());
        let scratch = &mut self.scratch;

        let fill = queue.submit(deps, || kernels::fill_kernel(scratch));

        let scratch = &mut self.scratch;
        let block_size = config.block.size;
        let main = queue.submit(&[fill], || match matrix.index() {
            BinStorage::U8(idx) if matrix.is_dense() => dense_main(
                config.use_local_hist,
                idx,
                matrix,
                rows,
                gpairs,
                scratch,
                block_size,
            ),
            BinStorage::U16(idx) if matrix.is_dense() => dense_main(
                config.use_local_hist,
                idx,
                matrix,
                rows,
                gpairs,
                scratch,
                block_size,
            ),
            BinStorage::U32(idx) if matrix.is_dense() => dense_main(
                config.use_local_hist,
                idx,
                matrix,
                rows,
                gpairs,
                scratch,
                block_size,
            ),
            BinStorage::U32(idx) => kernels::main_buffered_sparse(
                idx,
                matrix.row_stride(),
                matrix.base_rowid(),
                rows,
                gpairs,
                scratch,
                n_bins,
                block_size,
            ),
            _ => unreachable!("sparse matrices store 32-bit bins"),
        });

        let scratch = &self.scratch;
        let hist_slice = contiguous_mut(hist);
        queue.submit(&[main], || {
            kernels::reduce_kernel(scratch, hist_slice, n_bins)
        })
    }
}

fn dense_main<T: GradientSum, B: crate::hist::builder::BinIdx>(
    use_local_hist: bool,
    idx: &[B],
    matrix: &BinnedMatrix,
    rows: &[RowIndex],
    gpairs: &[GradPair],
    scratch: &mut [GradientPair<T>],
    block_size: usize,
) {
    let n_bins = matrix.n_bins();
    if use_local_hist {
        kernels::main_local_dense(
            idx,
            matrix.offsets(),
            matrix.row_stride(),
            matrix.base_rowid(),
            rows,
            gpairs,
            scratch,
            n_bins,
            block_size,
        );
    } else {
        kernels::main_buffered_dense(
            idx,
            matrix.offsets(),
            matrix.row_stride(),
            matrix.base_rowid(),
            rows,
            gpairs,
            scratch,
            n_bins,
            block_size,
        );
    }
}

fn contiguous_mut<T: GradientSum>(hist: &mut HistRow<T>) -> &mut [GradientPair<T>] {
    match hist.as_slice_mut() {
        Some(s) => s,
        None => unreachable!("histogram regions are contiguous"),
    }
}

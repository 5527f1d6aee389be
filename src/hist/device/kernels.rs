//! Device kernel bodies, emulated as data-parallel loops on the pool.
//!
//! Each function is one kernel launch: the lane structure of the device
//! grid collapses to a loop, but the accumulation pattern (per-block
//! private slices, per-feature local bins, or global atomics) and the
//! reduction order are preserved exactly, so the numeric results match
//! what the corresponding device grid would produce.

use crate::core::constants::MAX_LOCAL_HIST_BINS;
use crate::core::types::{BinIndex, GradPair, GradientPair, GradientSum, RowIndex};
use crate::hist::builder::BinIdx;
use crate::partition::SendPtr;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Float type supporting a lock-free atomic add through its bit pattern.
pub trait AtomicAdd: GradientSum {
    /// Atomically adds `val` to the float at `ptr`.
    ///
    /// # Safety
    /// `ptr` must be valid and aligned for `Self`, and all concurrent
    /// access to the location must go through this function.
    unsafe fn atomic_add(ptr: *mut Self, val: Self);
}

impl AtomicAdd for f32 {
    #[inline]
    unsafe fn atomic_add(ptr: *mut Self, val: Self) {
        let atom = &*(ptr as *const AtomicU32);
        let mut current = atom.load(Ordering::Relaxed);
        loop {
            let next = (f32::from_bits(current) + val).to_bits();
            match atom.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return,
                Err(seen) => current = seen,
            }
        }
    }
}

impl AtomicAdd for f64 {
    #[inline]
    unsafe fn atomic_add(ptr: *mut Self, val: Self) {
        let atom = &*(ptr as *const AtomicU64);
        let mut current = atom.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + val).to_bits();
            match atom.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return,
                Err(seen) => current = seen,
            }
        }
    }
}

/// Fill kernel: zeroes a pair buffer.
pub(super) fn fill_kernel<T: GradientSum>(buf: &mut [GradientPair<T>]) {
    buf.par_iter_mut().for_each(|p| *p = GradientPair::zero());
}

/// Buffered main kernel over dense-encoded bins (variant A).
///
/// Block `b` owns `scratch[b * n_bins..(b + 1) * n_bins]` and sweeps rows
/// `[b * block_size, (b + 1) * block_size)` of the node's row list.
#[allow(clippy::too_many_arguments)]
pub(super) fn main_buffered_dense<T: GradientSum, B: BinIdx>(
    idx: &[B],
    offsets: &[BinIndex],
    row_stride: usize,
    base_rowid: RowIndex,
    rows: &[RowIndex],
    gpairs: &[GradPair],
    scratch: &mut [GradientPair<T>],
    n_bins: usize,
    block_size: usize,
) {
    scratch
        .par_chunks_mut(n_bins)
        .enumerate()
        .for_each(|(b, slice)| {
            let begin = b * block_size;
            let end = (begin + block_size).min(rows.len());
            for &rid in &rows[begin..end] {
                let local = rid - base_rowid;
                let pair = GradientPair::<T>::from_score_pair(gpairs[local]);
                let row = &idx[local * row_stride..(local + 1) * row_stride];
                for (f, cell) in row.iter().enumerate() {
                    slice[cell.bin() + offsets[f] as usize] += pair;
                }
            }
        });
}

/// Buffered main kernel over sparse global bins (variant A).
pub(super) fn main_buffered_sparse<T: GradientSum>(
    idx: &[u32],
    row_stride: usize,
    base_rowid: RowIndex,
    rows: &[RowIndex],
    gpairs: &[GradPair],
    scratch: &mut [GradientPair<T>],
    n_bins: usize,
    block_size: usize,
) {
    scratch
        .par_chunks_mut(n_bins)
        .enumerate()
        .for_each(|(b, slice)| {
            let begin = b * block_size;
            let end = (begin + block_size).min(rows.len());
            for &rid in &rows[begin..end] {
                let local = rid - base_rowid;
                let pair = GradientPair::<T>::from_score_pair(gpairs[local]);
                for &bin in &idx[local * row_stride..(local + 1) * row_stride] {
                    if (bin as usize) < n_bins {
                        slice[bin as usize] += pair;
                    }
                }
            }
        });
}

/// Local-private-bins main kernel (variant B, dense only).
///
/// Each block handles one feature at a time: the feature's bins are
/// accumulated in a lane-private array of at most [`MAX_LOCAL_HIST_BINS`]
/// entries over all of the block's rows, then flushed into the feature's
/// range of the block slice. Within a block every feature owns a disjoint
/// bin range, so the flush is race-free.
#[allow(clippy::too_many_arguments)]
pub(super) fn main_local_dense<T: GradientSum, B: BinIdx>(
    idx: &[B],
    offsets: &[BinIndex],
    row_stride: usize,
    base_rowid: RowIndex,
    rows: &[RowIndex],
    gpairs: &[GradPair],
    scratch: &mut [GradientPair<T>],
    n_bins: usize,
    block_size: usize,
) {
    scratch
        .par_chunks_mut(n_bins)
        .enumerate()
        .for_each(|(b, slice)| {
            let begin = b * block_size;
            let end = (begin + block_size).min(rows.len());
            for f in 0..row_stride {
                let off = offsets[f] as usize;
                let width = (offsets[f + 1] - offsets[f]) as usize;
                debug_assert!(width <= MAX_LOCAL_HIST_BINS);
                let mut local_bins = [GradientPair::<T>::zero(); MAX_LOCAL_HIST_BINS];
                for &rid in &rows[begin..end] {
                    let local = rid - base_rowid;
                    let pair = GradientPair::<T>::from_score_pair(gpairs[local]);
                    local_bins[idx[local * row_stride + f].bin()] += pair;
                }
                for (k, &acc) in local_bins[..width].iter().enumerate() {
                    slice[off + k] += acc;
                }
            }
        });
}

/// Reduce kernel: sums the `nblocks` scratch slices into `hist`.
///
/// Lanes parallelize over bins; each bin folds its block contributions in
/// block order, so the result does not depend on the lane count.
pub(super) fn reduce_kernel<T: GradientSum>(
    scratch: &[GradientPair<T>],
    hist: &mut [GradientPair<T>],
    n_bins: usize,
) {
    debug_assert!(n_bins == 0 || scratch.len() % n_bins == 0);
    hist.par_iter_mut().enumerate().for_each(|(bin, out)| {
        let mut acc = GradientPair::zero();
        for slice in scratch.chunks_exact(n_bins) {
            acc += slice[bin];
        }
        *out = acc;
    });
}

/// Atomic main kernel over dense-encoded bins (variant C).
///
/// One lane per (row, feature) pair; adds go straight into `hist` with
/// CAS-loop float atomics, so no reduce step follows.
pub(super) fn main_atomic_dense<T: AtomicAdd, B: BinIdx>(
    idx: &[B],
    offsets: &[BinIndex],
    row_stride: usize,
    base_rowid: RowIndex,
    rows: &[RowIndex],
    gpairs: &[GradPair],
    hist: &mut [GradientPair<T>],
) {
    let hist_ptr = SendPtr(hist.as_mut_ptr());
    rows.par_iter().for_each(|&rid| {
        // capture the SendPtr wrapper whole, not its raw-pointer field
        let hist_ptr = &hist_ptr;
        let local = rid - base_rowid;
        let pair = GradientPair::<T>::from_score_pair(gpairs[local]);
        let row = &idx[local * row_stride..(local + 1) * row_stride];
        for (f, cell) in row.iter().enumerate() {
            let bin = cell.bin() + offsets[f] as usize;
            // SAFETY: the dense constructor validates every local bin
            // against its feature's width, so bin < hist.len(); concurrent
            // access to the pair's fields goes through atomic_add only.
            unsafe {
                let slot = hist_ptr.0.add(bin);
                T::atomic_add(std::ptr::addr_of_mut!((*slot).grad), pair.grad);
                T::atomic_add(std::ptr::addr_of_mut!((*slot).hess), pair.hess);
            }
        }
    });
}

/// Atomic main kernel over sparse global bins (variant C).
pub(super) fn main_atomic_sparse<T: AtomicAdd>(
    idx: &[u32],
    row_stride: usize,
    base_rowid: RowIndex,
    rows: &[RowIndex],
    gpairs: &[GradPair],
    hist: &mut [GradientPair<T>],
) {
    let n_bins = hist.len();
    let hist_ptr = SendPtr(hist.as_mut_ptr());
    rows.par_iter().for_each(|&rid| {
        // capture the SendPtr wrapper whole, not its raw-pointer field
        let hist_ptr = &hist_ptr;
        let local = rid - base_rowid;
        let pair = GradientPair::<T>::from_score_pair(gpairs[local]);
        for &bin in &idx[local * row_stride..(local + 1) * row_stride] {
            if (bin as usize) < n_bins {
                // SAFETY: bounds checked above; field access is atomic.
                unsafe {
                    let slot = hist_ptr.0.add(bin as usize);
                    T::atomic_add(std::ptr::addr_of_mut!((*slot).grad), pair.grad);
                    T::atomic_add(std::ptr::addr_of_mut!((*slot).hess), pair.hess);
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_add_f32_concurrent() {
        let mut total = 0.0f32;
        let ptr = SendPtr(&mut total as *mut f32);
        (0..1000usize).into_par_iter().for_each(|_| {
            // capture the SendPtr wrapper whole, not its raw-pointer field
            let ptr = &ptr;
            unsafe { f32::atomic_add(ptr.0, 1.0) };
        });
        assert_eq!(total, 1000.0);
    }

    #[test]
    fn test_atomic_add_f64_concurrent() {
        let mut total = 0.0f64;
        let ptr = SendPtr(&mut total as *mut f64);
        (0..1000usize).into_par_iter().for_each(|i| {
            // capture the SendPtr wrapper whole, not its raw-pointer field
            let ptr = &ptr;
            unsafe { f64::atomic_add(ptr.0, i as f64) };
        });
        assert_eq!(total, 499500.0);
    }

    #[test]
    fn test_reduce_kernel_sums_in_block_order() {
        let scratch: Vec<GradientPair<f64>> = vec![
            GradientPair::new(1.0, 0.5),
            GradientPair::new(2.0, 1.0),
            GradientPair::new(10.0, 5.0),
            GradientPair::new(20.0, 10.0),
        ];
        let mut hist = vec![GradientPair::zero(); 2];
        reduce_kernel(&scratch, &mut hist, 2);
        assert_eq!(hist[0], GradientPair::new(11.0, 5.5));
        assert_eq!(hist[1], GradientPair::new(22.0, 11.0));
    }
}

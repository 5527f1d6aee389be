//! CPU histogram builder.
//!
//! Rows are processed in fixed-size blocks, each block accumulating into
//! its own private histogram; the block histograms are then reduced into
//! the output sequentially in block order. The reduction schedule depends
//! only on the block size, never on the pool's thread count, so a build is
//! bit-reproducible across thread counts. Blocks are built in batches of
//! at most [`HIST_BLOCK_BATCH`] so scratch stays bounded for any row
//! count.

use crate::core::constants::{HIST_BLOCK_BATCH, HIST_BLOCK_SIZE};
use crate::core::context::Context;
use crate::core::types::{GradPair, GradientPair, GradientSum, RowIndex};
use crate::hist::store::{alloc_hist, init_hist, HistRow};
use crate::matrix::{BinStorage, BinnedMatrix};
use rayon::prelude::*;
use std::marker::PhantomData;

/// Stored bin-index element; widened to `usize` once per cell read.
pub trait BinIdx: Copy + Send + Sync + 'static {
    /// The cell's bin as an array index.
    fn bin(self) -> usize;
}

impl BinIdx for u8 {
    #[inline(always)]
    fn bin(self) -> usize {
        self as usize
    }
}

impl BinIdx for u16 {
    #[inline(always)]
    fn bin(self) -> usize {
        self as usize
    }
}

impl BinIdx for u32 {
    #[inline(always)]
    fn bin(self) -> usize {
        self as usize
    }
}

/// Builds per-node histograms on the context pool.
///
/// `T` is the accumulation precision, independent of the single-precision
/// gradient input.
#[derive(Debug, Clone)]
pub struct HistBuilder<T: GradientSum> {
    force_read_by_column: bool,
    _precision: PhantomData<T>,
}

impl<T: GradientSum> Default for HistBuilder<T> {
    fn default() -> Self {
        Self::new(false)
    }
}

impl<T: GradientSum> HistBuilder<T> {
    /// Creates a builder. `force_read_by_column` switches the dense hot
    /// loop to column-major iteration; output is identical either way.
    pub fn new(force_read_by_column: bool) -> Self {
        HistBuilder {
            force_read_by_column,
            _precision: PhantomData,
        }
    }

    /// Accumulates the gradient pairs of `rows` into `hist`, one pair per
    /// global bin. `hist` is zeroed first and must span `matrix.n_bins()`.
    ///
    /// `gpairs` is indexed by partition-local row (`rid - base_rowid`).
    pub fn build_hist(
        &self,
        ctx: &Context,
        matrix: &BinnedMatrix,
        rows: &[RowIndex],
        gpairs: &[GradPair],
        hist: &mut HistRow<T>,
    ) {
        assert_eq!(hist.len(), matrix.n_bins(), "histogram size mismatch");
        assert_eq!(gpairs.len(), matrix.n_rows(), "gradient vector size mismatch");
        init_hist(hist);
        if rows.is_empty() {
            return;
        }

        // One batch of block histograms at a time keeps scratch at
        // HIST_BLOCK_BATCH * n_bins pairs regardless of the row count.
        for batch in rows.chunks(HIST_BLOCK_SIZE * HIST_BLOCK_BATCH) {
            let partials: Vec<HistRow<T>> = ctx.pool().install(|| {
                batch
                    .par_chunks(HIST_BLOCK_SIZE)
                    .map(|block| {
                        let mut partial = alloc_hist::<T>(matrix.n_bins());
                        self.build_block(matrix, block, gpairs, &mut partial);
                        partial
                    })
                    .collect()
            });

            // Fixed-order reduction: block order, independent of thread count.
            for partial in &partials {
                for (dst, src) in hist.iter_mut().zip(partial.iter()) {
                    *dst += *src;
                }
            }
        }
    }

    fn build_block(
        &self,
        matrix: &BinnedMatrix,
        rows: &[RowIndex],
        gpairs: &[GradPair],
        hist: &mut HistRow<T>,
    ) {
        if matrix.is_dense() {
            match matrix.index() {
                BinStorage::U8(idx) => self.build_block_dense(idx, matrix, rows, gpairs, hist),
                BinStorage::U16(idx) => self.build_block_dense(idx, matrix, rows, gpairs, hist),
                BinStorage::U32(idx) => self.build_block_dense(idx, matrix, rows, gpairs, hist),
            }
        } else {
            match matrix.index() {
                BinStorage::U32(idx) => build_block_sparse(idx, matrix, rows, gpairs, hist),
                // sparse construction always stores 32-bit global bins
                _ => unreachable!("sparse matrices store 32-bit bins"),
            }
        }
    }

    fn build_block_dense<B: BinIdx>(
        &self,
        idx: &[B],
        matrix: &BinnedMatrix,
        rows: &[RowIndex],
        gpairs: &[GradPair],
        hist: &mut HistRow<T>,
    ) {
        let stride = matrix.row_stride();
        let base = matrix.base_rowid();
        let offsets = matrix.offsets();
        let hist = match hist.as_slice_mut() {
            Some(h) => h,
            None => unreachable!("freshly allocated histograms are contiguous"),
        };
        if self.force_read_by_column {
            for f in 0..stride {
                let off = offsets[f] as usize;
                for &rid in rows {
                    let local = rid - base;
                    let pair = GradientPair::<T>::from_score_pair(gpairs[local]);
                    // SAFETY: the dense constructor validates every local
                    // bin against its feature's width, so the global bin
                    // stays below n_bins.
                    unsafe {
                        let bin = idx.get_unchecked(local * stride + f).bin() + off;
                        *hist.get_unchecked_mut(bin) += pair;
                    }
                }
            }
        } else {
            for &rid in rows {
                let local = rid - base;
                let pair = GradientPair::<T>::from_score_pair(gpairs[local]);
                let row = &idx[local * stride..(local + 1) * stride];
                for (f, cell) in row.iter().enumerate() {
                    // SAFETY: as above.
                    unsafe {
                        let bin = cell.bin() + *offsets.get_unchecked(f) as usize;
                        *hist.get_unchecked_mut(bin) += pair;
                    }
                }
            }
        }
    }
}

fn build_block_sparse<T: GradientSum>(
    idx: &[u32],
    matrix: &BinnedMatrix,
    rows: &[RowIndex],
    gpairs: &[GradPair],
    hist: &mut HistRow<T>,
) {
    let stride = matrix.row_stride();
    let base = matrix.base_rowid();
    let n_bins = matrix.n_bins();
    for &rid in rows {
        let local = rid - base;
        let pair = GradientPair::<T>::from_score_pair(gpairs[local]);
        for &bin in &idx[local * stride..(local + 1) * stride] {
            let bin = bin as usize;
            // global bins; the sentinel and padding land at or past n_bins
            if bin < n_bins {
                hist[bin] += pair;
            }
        }
    }
}

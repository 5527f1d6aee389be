//! Read-only binned feature matrix (quantized input contract).
//!
//! The matrix is produced by an external binning/sketching stage and is
//! immutable for the lifetime of a tree. It stores one bin index per
//! (row, slot) cell in the narrowest unsigned width that fits, plus the
//! per-feature cumulative bin offsets and the cut-point value of every
//! global bin.
//!
//! Two layouts exist:
//!
//! * **dense-encoded** — `row_stride == n_features`, stored values are
//!   *feature-local* bins; the global bin is `local + offsets[feature]`.
//!   Every cell is present.
//! * **sparse** — `row_stride` is the maximum non-missing row length,
//!   stored values are already *global* bins, and absent cells carry the
//!   sentinel bin `n_bins`. Sparse bin width is always 32 bits because the
//!   indices are global.

use crate::core::error::{HistError, Result};
use crate::core::types::{BinIndex, FeatureIndex, RowIndex};
use serde::{Deserialize, Serialize};

/// Storage width of the bin-index array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinTypeSize {
    /// 8-bit bin indices
    U8 = 1,
    /// 16-bit bin indices
    U16 = 2,
    /// 32-bit bin indices
    U32 = 4,
}

/// Bin-index array in its narrowest sufficient width.
#[derive(Debug, Clone)]
pub enum BinStorage {
    /// 8-bit bins (dense-encoded only)
    U8(Vec<u8>),
    /// 16-bit bins (dense-encoded only)
    U16(Vec<u16>),
    /// 32-bit bins (dense-encoded or global sparse)
    U32(Vec<u32>),
}

impl BinStorage {
    /// Storage width of this array.
    pub fn bin_type_size(&self) -> BinTypeSize {
        match self {
            BinStorage::U8(_) => BinTypeSize::U8,
            BinStorage::U16(_) => BinTypeSize::U16,
            BinStorage::U32(_) => BinTypeSize::U32,
        }
    }

    /// Number of stored cells.
    pub fn len(&self) -> usize {
        match self {
            BinStorage::U8(v) => v.len(),
            BinStorage::U16(v) => v.len(),
            BinStorage::U32(v) => v.len(),
        }
    }

    /// True when no cells are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widened read of cell `i`.
    #[inline]
    pub fn get(&self, i: usize) -> BinIndex {
        match self {
            BinStorage::U8(v) => v[i] as BinIndex,
            BinStorage::U16(v) => v[i] as BinIndex,
            BinStorage::U32(v) => v[i],
        }
    }
}

/// Immutable row-major binned matrix.
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    index: BinStorage,
    /// Cumulative per-feature bin offsets, length `n_features + 1`.
    offsets: Vec<BinIndex>,
    /// Upper cut-point value of each global bin, length `n_bins`.
    cut_values: Vec<f32>,
    n_rows: usize,
    n_features: usize,
    row_stride: usize,
    is_dense: bool,
    base_rowid: RowIndex,
    max_num_bins: usize,
    min_num_bins: usize,
}

impl BinnedMatrix {
    /// Creates a dense-encoded matrix.
    ///
    /// # Arguments
    /// * `index` - Feature-local bins, row-major, `n_rows * n_features` cells
    /// * `offsets` - Cumulative bin offsets, length `n_features + 1`
    /// * `cut_values` - Cut-point value per global bin, length `offsets[F]`
    /// * `n_rows` - Number of rows in this data partition
    /// * `base_rowid` - First global row id of this partition
    pub fn dense(
        index: BinStorage,
        offsets: Vec<BinIndex>,
        cut_values: Vec<f32>,
        n_rows: usize,
        base_rowid: RowIndex,
    ) -> Result<Self> {
        let n_features = Self::validate_offsets(&offsets, &cut_values)?;
        if index.len() != n_rows * n_features {
            return Err(HistError::dimension_mismatch(
                format!("{} index cells", n_rows * n_features),
                format!("{}", index.len()),
            ));
        }
        // Feature-local bins must fit their feature's width: the dense hot
        // loops index histograms without bounds checks on this guarantee.
        for cell in 0..index.len() {
            let f = cell % n_features;
            let width = offsets[f + 1] - offsets[f];
            let local = index.get(cell);
            if local >= width {
                return Err(HistError::invalid_parameter(
                    "index",
                    format!("{local}"),
                    format!("feature {f} has only {width} bins"),
                ));
            }
        }
        let (max_num_bins, min_num_bins) = Self::bin_extents(&offsets);
        Ok(BinnedMatrix {
            index,
            offsets,
            cut_values,
            n_rows,
            n_features,
            row_stride: n_features,
            is_dense: true,
            base_rowid,
            max_num_bins,
            min_num_bins,
        })
    }

    /// Creates a sparse matrix over global bins.
    ///
    /// Cells hold global bin indices; absent cells carry the sentinel
    /// `offsets[F]`. `row_stride` is the maximum non-missing row length.
    pub fn sparse(
        index: Vec<BinIndex>,
        offsets: Vec<BinIndex>,
        cut_values: Vec<f32>,
        n_rows: usize,
        row_stride: usize,
        base_rowid: RowIndex,
    ) -> Result<Self> {
        let n_features = Self::validate_offsets(&offsets, &cut_values)?;
        if index.len() != n_rows * row_stride {
            return Err(HistError::dimension_mismatch(
                format!("{} index cells", n_rows * row_stride),
                format!("{}", index.len()),
            ));
        }
        let (max_num_bins, min_num_bins) = Self::bin_extents(&offsets);
        Ok(BinnedMatrix {
            index: BinStorage::U32(index),
            offsets,
            cut_values,
            n_rows,
            n_features,
            row_stride,
            is_dense: false,
            base_rowid,
            max_num_bins,
            min_num_bins,
        })
    }

    fn validate_offsets(offsets: &[BinIndex], cut_values: &[f32]) -> Result<usize> {
        if offsets.len() < 2 || offsets[0] != 0 {
            return Err(HistError::invalid_parameter(
                "offsets",
                format!("{:?}", offsets),
                "must start at 0 and cover at least one feature",
            ));
        }
        if !offsets.windows(2).all(|w| w[0] <= w[1]) {
            return Err(HistError::invalid_parameter(
                "offsets",
                format!("{:?}", offsets),
                "must be non-decreasing",
            ));
        }
        let n_bins = *offsets.last().unwrap_or(&0) as usize;
        if cut_values.len() != n_bins {
            return Err(HistError::dimension_mismatch(
                format!("{} cut values", n_bins),
                format!("{}", cut_values.len()),
            ));
        }
        Ok(offsets.len() - 1)
    }

    fn bin_extents(offsets: &[BinIndex]) -> (usize, usize) {
        let widths = offsets.windows(2).map(|w| (w[1] - w[0]) as usize);
        let max = widths.clone().max().unwrap_or(0);
        let min = widths.min().unwrap_or(0);
        (max, min)
    }

    /// True for the dense-encoded layout.
    #[inline]
    pub fn is_dense(&self) -> bool {
        self.is_dense
    }

    /// Number of rows in this partition.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of features.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Cells per row (`n_features` when dense).
    #[inline]
    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// First global row id of this partition.
    #[inline]
    pub fn base_rowid(&self) -> RowIndex {
        self.base_rowid
    }

    /// Total global bin count `B = offsets[F]`.
    #[inline]
    pub fn n_bins(&self) -> usize {
        *self.offsets.last().unwrap_or(&0) as usize
    }

    /// Largest per-feature bin count.
    #[inline]
    pub fn max_num_bins(&self) -> usize {
        self.max_num_bins
    }

    /// Smallest per-feature bin count.
    #[inline]
    pub fn min_num_bins(&self) -> usize {
        self.min_num_bins
    }

    /// Cumulative per-feature bin offsets, length `n_features + 1`.
    #[inline]
    pub fn offsets(&self) -> &[BinIndex] {
        &self.offsets
    }

    /// Upper cut-point value of each global bin.
    #[inline]
    pub fn cut_values(&self) -> &[f32] {
        &self.cut_values
    }

    /// The raw bin-index array.
    #[inline]
    pub fn index(&self) -> &BinStorage {
        &self.index
    }

    /// True when `bin` is the missing sentinel (or padding past it).
    #[inline]
    pub fn is_missing_bin(&self, bin: BinIndex) -> bool {
        bin as usize >= self.n_bins()
    }

    /// Raw (stored) bin of cell `(row, slot)`; feature-local when dense,
    /// global when sparse. `row` is partition-local.
    #[inline]
    pub fn raw_bin(&self, row: usize, slot: usize) -> BinIndex {
        self.index.get(row * self.row_stride + slot)
    }

    /// Global bin of the given feature for a partition-local row, or `None`
    /// when the cell is missing.
    ///
    /// Dense-encoded cells are always present. Sparse rows are scanned for
    /// a global bin inside the feature's `[offsets[f], offsets[f+1])` range.
    pub fn bin_for_feature(&self, row: usize, feature: FeatureIndex) -> Option<BinIndex> {
        if self.is_dense {
            let local = self.raw_bin(row, feature);
            Some(local + self.offsets[feature])
        } else {
            let lo = self.offsets[feature];
            let hi = self.offsets[feature + 1];
            for slot in 0..self.row_stride {
                let bin = self.raw_bin(row, slot);
                if bin >= lo && bin < hi {
                    return Some(bin);
                }
            }
            None
        }
    }
}

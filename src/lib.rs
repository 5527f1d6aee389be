//! Histogram construction and row partitioning for histogram-based
//! gradient boosted decision tree training.
//!
//! The crate covers the two data-parallel cores of a hist-method tree
//! learner:
//!
//! * **Histogram build** — accumulating per-bin gradient pair sums for the
//!   rows of a tree node over a pre-binned feature matrix, on a CPU thread
//!   pool ([`hist::HistBuilder`]) or through a device-style kernel
//!   pipeline ([`hist::DeviceHistBuilder`]), with the subtraction trick
//!   for sibling nodes and a bounded per-node histogram pool.
//! * **Row partition** — re-ordering each split node's rows into left and
//!   right child ranges over a blocked task space
//!   ([`partition::RowPartitioner`]), including the bit-exchange path for
//!   column-split distributed data.
//!
//! Binning, split evaluation, and the tree structure itself live in
//! external collaborators; this crate consumes a [`matrix::BinnedMatrix`],
//! a gradient vector, and chosen [`partition::SplitEntry`] values.
//!
//! # Example
//!
//! ```
//! use boosthist::core::{Context, GradPair};
//! use boosthist::hist::{alloc_hist, HistBuilder};
//! use boosthist::matrix::{BinStorage, BinnedMatrix};
//! use boosthist::partition::{RowPartitioner, SplitEntry};
//!
//! # fn main() -> boosthist::core::Result<()> {
//! // 4 rows x 1 feature with 2 bins (cut values 0.5 and 1.5)
//! let matrix = BinnedMatrix::dense(
//!     BinStorage::U8(vec![0, 1, 0, 1]),
//!     vec![0, 2],
//!     vec![0.5, 1.5],
//!     4,
//!     0,
//! )?;
//! let gpairs = vec![GradPair::new(1.0, 0.5); 4];
//! let ctx = Context::new(2)?;
//!
//! let mut hist = alloc_hist::<f64>(matrix.n_bins());
//! let rows: Vec<usize> = (0..4).collect();
//! HistBuilder::<f64>::new(false).build_hist(&ctx, &matrix, &rows, &gpairs, &mut hist);
//! assert_eq!(hist[0].grad, 2.0);
//!
//! let mut partitioner = RowPartitioner::new(&ctx, 4, 0, None);
//! let splits = vec![SplitEntry::numeric(0, 1, 2, 0, 0.5, true)];
//! partitioner.update_position(&ctx, &matrix, &splits)?;
//! assert_eq!(partitioner.node_rows(1), &[0, 2]);
//! # Ok(())
//! # }
//! ```

pub mod collective;
pub mod core;
pub mod hist;
pub mod matrix;
pub mod partition;
pub mod rowset;

pub use crate::core::{Context, HistError, Result};
pub use crate::hist::{DeviceHistBuilder, HistBuilder, HistogramPool};
pub use crate::matrix::BinnedMatrix;
pub use crate::partition::{RowPartitioner, SplitEntry};
pub use crate::rowset::RowSetCollection;

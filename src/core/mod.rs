//! Fundamental types, constants, error handling, and execution context.

pub mod bitfield;
pub mod constants;
pub mod context;
pub mod error;
pub mod types;

pub use context::Context;
pub use error::{HistError, Result};
pub use types::{
    BinIndex, FeatureIndex, GradPair, GradientPair, GradientSum, Hist, NodeIndex, RowIndex, Score,
};

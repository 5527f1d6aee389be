//! Error handling for the histogram / partition core.
//!
//! Recoverable conditions (bad constructor arguments, collective transport
//! failures) are surfaced through [`Result`]. Programmer-error preconditions
//! such as mismatched histogram sizes or a `base_rowid` disagreement are
//! asserted and abort, mirroring the CHECK semantics of the reference
//! implementations.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum HistError {
    /// Invalid input parameters at the API boundary
    #[error("Invalid parameter: {parameter} = {value}, {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Dimension mismatch between related inputs
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    /// Out-of-bounds access
    #[error("Index out of bounds: index {index}, length {length}")]
    IndexOutOfBounds { index: usize, length: usize },

    /// Collective transport failure, propagated unchanged
    #[error("Collective error: {message}")]
    Collective { message: String },

    /// Thread pool construction / synchronization errors
    #[error("Threading error: {message}")]
    Threading { message: String },

    /// Internal library errors (should not occur in normal usage)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl HistError {
    /// Creates an invalid-parameter error.
    pub fn invalid_parameter<P, V, R>(parameter: P, value: V, reason: R) -> Self
    where
        P: Into<String>,
        V: Into<String>,
        R: Into<String>,
    {
        HistError::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Creates a dimension-mismatch error.
    pub fn dimension_mismatch<E, A>(expected: E, actual: A) -> Self
    where
        E: Into<String>,
        A: Into<String>,
    {
        HistError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a collective transport error.
    pub fn collective<M: Into<String>>(message: M) -> Self {
        HistError::Collective {
            message: message.into(),
        }
    }

    /// Creates a threading error.
    pub fn threading<M: Into<String>>(message: M) -> Self {
        HistError::Threading {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        HistError::Internal {
            message: message.into(),
        }
    }
}

/// Result type alias used throughout the library.
pub type Result<T> = std::result::Result<T, HistError>;

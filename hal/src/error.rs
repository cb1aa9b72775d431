//! Graphics error types.
//!
//! Validation errors are detected locally, before any backend call is made.
//! Backend failures are surfaced as-is through [`GraphicsError::BackendFailure`].

use thiserror::Error;

use crate::backend::BackendError;

/// Errors that can occur in the graphics system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// The format/usage combination cannot be represented by the active backend.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    /// A zero or over-capability size, or a bad mip level count.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),
    /// A subresource region or byte range exceeds the addressable extent,
    /// or is misaligned for a block-compressed format.
    #[error("out of range: {0}")]
    OutOfRange(String),
    /// The caller broke the API contract (disposed handle, query misuse, ...).
    #[error("precondition violation: {0}")]
    PreconditionViolation(String),
    /// An opaque failure reported by the underlying native API.
    #[error("backend failure: {0}")]
    BackendFailure(#[from] BackendError),
}

impl GraphicsError {
    /// Returns true if the error was detected by local validation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_) | Self::InvalidDimensions(_) | Self::OutOfRange(_)
        )
    }
}

/// Result alias used throughout the crate.
pub type GraphicsResult<T> = Result<T, GraphicsError>;

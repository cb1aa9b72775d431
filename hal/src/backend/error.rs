//! Backend error types.

use thiserror::Error;

/// Errors that can occur in backend operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Failed to initialize the backend.
    #[error("backend initialization failed: {0}")]
    InitializationFailed(String),
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// The requested feature is not supported.
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// The device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// Internal backend error.
    #[error("internal backend error: {0}")]
    Internal(String),
}

/// Result alias for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

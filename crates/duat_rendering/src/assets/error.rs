//! Asset load failures.
//!
//! Cloneable: every callback coalesced onto one load receives the same value.

use thiserror::Error;

/// Why an asset could not be produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The source has nothing under this key.
    #[error("asset not found: {0}")]
    NotFound(String),

    /// Bytes were read but are not a valid image.
    #[error("decode failed: {0}")]
    Decode(String),

    /// The load function panicked on a worker.
    #[error("loader worker panicked: {0}")]
    WorkerPanicked(String),

    /// The loader shut down before the load ran.
    #[error("loader shut down")]
    Shutdown,
}

/// Result alias for asset loads.
pub type LoadResult<T> = Result<T, LoadError>;

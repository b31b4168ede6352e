//! Error type shared by generation, storage and boundary computation.

use std::sync::{MutexGuard, PoisonError, RwLockReadGuard, RwLockWriteGuard};

/// Result alias defaulting to [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors `terrastream` can produce.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Bounds were non-finite or inverted.
    #[error("invalid bounds: {reason}")]
    InvalidBounds { reason: String },

    /// A grid was requested with zero points or zero resolution.
    #[error("invalid grid: {reason}")]
    InvalidGrid { reason: String },

    /// A page read used a zero page size.
    #[error("invalid page: {reason}")]
    InvalidPage { reason: String },

    /// The SQLite row store failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored row or schema blob could not be (de)serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Creating the store's parent directory failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Another thread panicked while holding the in-memory store lock.
    #[error("store lock poisoned")]
    LockPoisoned,
}

// Collapse every poisoned guard into `LockPoisoned`.
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}

impl<T> From<PoisonError<RwLockReadGuard<'_, T>>> for Error {
    fn from(_: PoisonError<RwLockReadGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}

impl<T> From<PoisonError<RwLockWriteGuard<'_, T>>> for Error {
    fn from(_: PoisonError<RwLockWriteGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}

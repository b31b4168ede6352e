//! Error types for the geospatial delivery service.
//!
//! This module defines the central `Error` enum, which captures all recoverable
//! and reportable error cases within the service. It implements
//! `From<Error>` for `tonic::Status` so handlers can propagate with `?`.
//!
//! ## Error Cases
//! - `ChannelError`: An internal communication failure between tasks or
//!   workers.
//! - `Generation`: Surface generation rejected its inputs.
//! - `Store`: The dataset store failed.
//! - `RequestCancelled`: The client went away mid-flight.
//! - `InvalidRequest`: The client request was malformed or exceeded bounds.
//! - `ServiceShutdown`: A request arrived while the service was shutting down.
//! - `ServiceOverloaded`: The worker queue was full.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the geospatial delivery service.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Internal channel send/receive failure (e.g., closed or full channel).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// Bounds or grid parameters could not be turned into a surface.
    #[error("Generation error: {0}")]
    Generation(#[source] terrastream::Error),

    /// Reading or writing the dataset store failed.
    #[error("Store error: {0}")]
    Store(#[source] terrastream::Error),

    /// The client aborted the request.
    #[error("Request cancelled by client")]
    RequestCancelled,

    /// The client request was invalid or exceeded constraints.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,

    /// Every worker is busy and the queue is full.
    #[error("Service is overloaded")]
    ServiceOverloaded,
}

impl From<terrastream::Error> for Error {
    fn from(err: terrastream::Error) -> Self {
        match err {
            terrastream::Error::InvalidBounds { .. } | terrastream::Error::InvalidGrid { .. } => {
                Self::Generation(err)
            }
            _ => Self::Store(err),
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {}", context))
            }
            Error::Generation(e) => Status::internal(format!("Generation error: {}", e)),
            Error::Store(e) => Status::internal(format!("Store error: {}", e)),
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
            Error::ServiceOverloaded => Status::unavailable("Service is overloaded, retry later"),
        }
    }
}

//! Work requests and the per-kind routines workers run to serve them.
//!
//! - [`request`] - The [`request::WorkRequest`] contract between handlers and
//!   workers.
//! - [`processor`] - Single-response batch generation and dataset paging.
//! - [`coordinator`] - Chunked delivery of a generated batch.
//! - [`live`] - Rate-limited live point streams.

pub mod coordinator;
pub mod live;
pub mod processor;
pub mod request;

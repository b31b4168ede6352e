//! Server-side components of the `terrastream` geospatial delivery service.
//!
//! ## Submodules
//!
//! - [`config`] - CLI/environment configuration and validation.
//! - [`pool`] - Fixed-size worker pool pulling from one shared queue.
//! - [`service`] - The `GeospatialService` gRPC implementation.
//! - [`streaming`] - Work requests, chunk emission, live streams and paging.
//! - [`telemetry`] - Logging, tracing and metrics initialization.

pub mod config;
pub mod pool;
pub mod service;
pub mod streaming;
pub mod telemetry;

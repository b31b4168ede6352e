//! gRPC service implementation and worker wiring.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC service entry point (`DeliveryService`).
//! - [`config`] - Shared store, engine and per-worker context types.

pub mod config;
pub mod handler;

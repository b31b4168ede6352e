//! Protocol crate for the `terrastream` gRPC service.
//!
//! - [`proto`] - Generated messages, client and server for
//!   `proto/terrastream.proto`, plus the encoded descriptor set used for
//!   reflection.
//! - [`Error`] - Service error type and its mapping onto [`tonic::Status`].
//! - Conversions between `terrastream` library types and wire messages, and
//!   the request defaults shared by client and server.

mod common;
pub use common::*;
// Public re-export so downstream crates can access the library via
// `terrastream_tonic_core::terrastream`
pub use terrastream;

pub mod proto {
    tonic::include_proto!("terrastream");
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("terrastream_descriptor");
}

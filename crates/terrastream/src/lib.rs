//! Synthetic geospatial surfaces and the pieces needed to ship them.
//!
//! - [`SurfaceGenerator`] samples deterministic-plus-noise scalar fields over
//!   a [`GeoBounds`] box.
//! - [`SurfacePipeline`] walks a [`GridSpec`] once and hands the resulting
//!   [`SurfaceBatch`] to a [`Projection`]: row ([`RowProjection`]), flattened
//!   ([`OptimizedProjection`]) or columnar ([`ColumnarProjection`]).
//! - [`ChunkedEncoder`] splits a batch into numbered [`DeliveryChunk`]s.
//! - [`LiveSampler`] emits single points at random coordinates for
//!   rate-limited streams.
//! - [`BoundaryEngine`] computes padded per-column ranges over a
//!   [`DatasetStore`] ([`SqliteStore`] or [`MemoryStore`]).

mod boundary;
mod bounds;
mod chunk;
mod clock;
mod error;
mod grid;
mod live;
mod pipeline;
mod store;
mod surface;

pub use crate::boundary::*;
pub use crate::bounds::*;
pub use crate::chunk::*;
pub use crate::clock::*;
pub use crate::error::*;
pub use crate::grid::*;
pub use crate::live::*;
pub use crate::pipeline::*;
pub use crate::store::*;
pub use crate::surface::*;

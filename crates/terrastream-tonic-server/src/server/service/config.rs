use std::sync::Arc;
use terrastream_tonic_core::terrastream::{
    BoundaryEngine, ChunkedEncoder, DatasetStore, SurfacePipeline, SystemClock,
};

/// Dataset store shared by every worker; one connection per operation.
pub type SharedStore = Arc<dyn DatasetStore>;

/// Boundary engine over the shared store.
pub type Engine = BoundaryEngine<SharedStore>;

/// Generation pipeline stamping points with the system clock.
pub type Pipeline = SurfacePipeline<SystemClock>;

/// Everything a worker needs to serve any [`WorkRequest`].
///
/// [`WorkRequest`]: crate::server::streaming::request::WorkRequest
pub struct WorkerContext {
    pub pipeline: Pipeline,
    pub encoder: ChunkedEncoder,
    pub engine: Arc<Engine>,
    pub max_points_per_second: u32,
    pub live_stream_duration: core::time::Duration,
    pub chunk_pause: core::time::Duration,
}

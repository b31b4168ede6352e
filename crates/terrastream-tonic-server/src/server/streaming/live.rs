use super::coordinator::should_stop;
use crate::server::{service::config::WorkerContext, telemetry::increment_points_delivered};
use rand::{SeedableRng, rngs::StdRng};
use terrastream_tonic_core::{
    LiveParams,
    proto::DataPoint,
    terrastream::{LiveSampler, SystemClock},
};
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Emits single points at the sampler's rate until the live window closes.
///
/// Cancellation is cooperative: the token and response channel are checked
/// before each point, and the sleep between points ends early if either
/// fires. A departed client ends the stream without an error.
///
/// Returns the number of points delivered.
pub async fn stream_live(
    _worker_id: usize,
    ctx: &WorkerContext,
    params: LiveParams,
    tx: mpsc::Sender<Result<DataPoint, Status>>,
    cancelled: CancellationToken,
) -> u64 {
    let mut sampler = LiveSampler::new(
        params.bounds,
        params.kind,
        params.requested_rate,
        ctx.max_points_per_second,
    );
    let interval = sampler.interval();
    let deadline = Instant::now() + ctx.live_stream_duration;
    let mut rng = StdRng::from_rng(&mut rand::rng());

    #[cfg(feature = "tracing")]
    tracing::debug!(
        kind = %params.kind,
        rate = sampler.points_per_second(),
        "Worker {_worker_id} starting live stream"
    );

    while Instant::now() < deadline {
        if should_stop(&cancelled, &tx) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "Worker {_worker_id} live stream stopped after {} points",
                sampler.emitted()
            );
            break;
        }

        let point = sampler.next_point(&SystemClock, &mut rng);
        if tx.send(Ok(point.into())).await.is_err() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {_worker_id} live client disconnected");
            break;
        }
        increment_points_delivered(1);

        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            () = cancelled.cancelled() => break,
            () = tx.closed() => break,
        }
    }

    sampler.emitted()
}

use super::processor::{generate_batch, join_error};
use crate::server::{service::config::WorkerContext, telemetry::increment_points_delivered};
use std::sync::Arc;
use terrastream_tonic_core::{
    BatchParams,
    terrastream::{DeliveryChunk, Projection},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Generates one batch and streams it back as numbered chunks.
///
/// The batch is sampled once; each chunk is then projected on the blocking
/// pool and sent in order, with `ctx.chunk_pause` between chunks so the
/// client can process one before the next arrives. Before every chunk the
/// call's token and the response channel are checked, and the stream ends
/// quietly if either says the caller is gone.
///
/// Returns the number of points delivered. A generation failure is forwarded
/// to the client as a status and also returned.
///
/// # Arguments
///
/// - `projection`: Wire shape of each chunk's payload.
/// - `tx`: The gRPC response channel.
/// - `cancelled`: Per-call token, a child of the pool's shutdown token.
pub async fn stream_chunks<P, M>(
    _worker_id: usize,
    ctx: &WorkerContext,
    params: BatchParams,
    projection: P,
    tx: mpsc::Sender<Result<M, Status>>,
    cancelled: CancellationToken,
) -> terrastream_tonic_core::Result<usize>
where
    P: Projection + Copy + Send + Sync + 'static,
    P::Output: Send + 'static,
    M: From<DeliveryChunk<P::Output>> + Send + 'static,
{
    if should_stop(&cancelled, &tx) {
        #[cfg(feature = "tracing")]
        tracing::debug!("Worker {_worker_id} skipping stream for departed caller");
        return Ok(0);
    }

    let batch = match generate_batch(ctx.pipeline.clone(), params, projection.auxiliary()).await {
        Ok(batch) => Arc::new(batch),
        Err(e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("Worker {_worker_id} failed to generate batch: {e}");
            let message = e.to_string();
            if let Err(_e) = tx.send(Err(Status::internal(message))).await {
                #[cfg(feature = "tracing")]
                tracing::debug!("Response channel failed to forward error: {_e}");
            }
            return Err(e);
        }
    };

    let label = format!("{}_streamed", projection.method_label(batch.kind));
    let encoder = ctx.encoder;
    let plan = encoder.plan(batch.len());
    let mut delivered = 0;

    #[cfg(feature = "tracing")]
    tracing::debug!(
        points = batch.len(),
        chunks = plan.chunk_count(),
        method = %label,
        "Worker {_worker_id} streaming batch"
    );

    for spec in plan.iter() {
        if should_stop(&cancelled, &tx) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "Worker {_worker_id} stopping before chunk {}/{}",
                spec.chunk_number,
                spec.total_chunks
            );
            return Ok(delivered);
        }

        let is_final = spec.is_final;
        let points = spec.len();
        let chunk = {
            let batch = Arc::clone(&batch);
            let label = label.clone();
            tokio::task::spawn_blocking(move || {
                M::from(encoder.encode_chunk(&batch, &projection, &spec, &label))
            })
            .await
            .map_err(join_error)?
        };

        if let Err(_e) = tx.send(Ok(chunk)).await {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {_worker_id} failed to send chunk: {_e}");
            return Ok(delivered);
        }
        delivered += points;
        increment_points_delivered(points as u64);

        if !is_final && !ctx.chunk_pause.is_zero() {
            tokio::time::sleep(ctx.chunk_pause).await;
        }
    }

    Ok(delivered)
}

/// Determines whether a stream should terminate early.
///
/// Returns `true` if the call was cancelled or the client dropped the
/// response stream.
pub(crate) fn should_stop<T>(cancelled: &CancellationToken, tx: &mpsc::Sender<T>) -> bool {
    tx.is_closed() || cancelled.is_cancelled()
}

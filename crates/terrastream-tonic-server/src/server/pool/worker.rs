use crate::server::{
    pool::manager::PoolState,
    service::config::WorkerContext,
    streaming::{
        coordinator::stream_chunks,
        live::stream_live,
        processor::{handle_batch, handle_page},
        request::WorkRequest,
    },
    telemetry::{increment_errors, record_call_duration},
};
use std::sync::Arc;
use terrastream_tonic_core::terrastream::{ColumnarProjection, RowProjection};
use tokio::sync::{Mutex, mpsc};

/// Worker task responsible for processing [`WorkRequest`] messages.
///
/// Every worker pulls from the same queue, so an idle worker always picks up
/// the oldest waiting call. Each call runs to completion before the worker
/// takes another, which keeps the number of concurrent calls equal to the
/// number of workers.
///
/// This function is designed to be spawned as a Tokio task and runs until it
/// receives [`WorkRequest::Shutdown`] or the queue closes.
///
/// # Request Types
///
/// - [`WorkRequest::Batch`] - Generate and answer with one message.
/// - [`WorkRequest::RowChunks`] / [`WorkRequest::ColumnarChunks`] - Stream a
///   generated batch via [`stream_chunks`].
/// - [`WorkRequest::Live`] - Rate-limited points via [`stream_live`].
/// - [`WorkRequest::Page`] - Dataset page with boundaries.
/// - [`WorkRequest::Shutdown`] - Stop and acknowledge.
pub async fn worker_loop(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<WorkRequest>>>,
    ctx: Arc<WorkerContext>,
    state: Arc<PoolState>,
) {
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    loop {
        // Only the receive is under the lock; the call itself runs unlocked.
        let work = { queue.lock().await.recv().await };
        let Some(work) = work else {
            break;
        };

        let method = work.method();
        let start = std::time::Instant::now();
        let ok = match work {
            WorkRequest::Shutdown { response } => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {worker_id} received shutdown signal");

                if response.send(()).is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {worker_id} failed to acknowledge shutdown");
                }
                break;
            }
            WorkRequest::Batch {
                params,
                shape,
                response,
                cancelled,
            } => {
                handle_batch(worker_id, &ctx, params, shape, response, cancelled).await;
                true
            }
            WorkRequest::RowChunks {
                params,
                tx,
                cancelled,
            } => stream_chunks(worker_id, &ctx, params, RowProjection, tx, cancelled)
                .await
                .is_ok(),
            WorkRequest::ColumnarChunks {
                params,
                tx,
                cancelled,
            } => stream_chunks(worker_id, &ctx, params, ColumnarProjection, tx, cancelled)
                .await
                .is_ok(),
            WorkRequest::Live {
                params,
                tx,
                cancelled,
            } => {
                let _sent = stream_live(worker_id, &ctx, params, tx, cancelled).await;
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {worker_id} live stream sent {_sent} points");
                true
            }
            WorkRequest::Page {
                params,
                response,
                cancelled,
            } => {
                handle_page(worker_id, &ctx, params, response, cancelled).await;
                true
            }
        };

        if !ok {
            increment_errors(method);
        }
        record_call_duration(start.elapsed().as_secs_f64() * 1000.0);
        state.finish();

        #[cfg(feature = "tracing")]
        tracing::trace!("Worker {worker_id} finished {method}");
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped");
}

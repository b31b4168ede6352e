//! Asynchronous worker pool for geospatial delivery calls.
//!
//! This module defines the [`WorkerPool`] struct, which owns the sending half
//! of one bounded queue shared by every worker. Whichever worker is idle takes
//! the next [`WorkRequest`], so the number of workers bounds the number of
//! calls served at once, and the queue depth bounds how many may wait.
//!
//! Shutdown is cooperative: the pool refuses new work, waits for in-flight
//! calls to drain, cancels what remains through a shared
//! [`CancellationToken`], and finally stops each worker.

use crate::server::{
    streaming::request::WorkRequest,
    telemetry::{decrement_calls_inflight, increment_calls_inflight},
};
use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use terrastream_tonic_core::Error;
use tokio::{
    sync::{mpsc, oneshot},
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;

/// Shared counters observed by the pool and decremented by workers.
#[derive(Debug, Default)]
pub struct PoolState {
    inflight: AtomicUsize,
    shutting_down: AtomicBool,
}

impl PoolState {
    /// Calls accepted but not yet finished, queued ones included.
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    fn begin(&self) {
        self.inflight.fetch_add(1, Ordering::AcqRel);
        increment_calls_inflight();
    }

    /// Marks one accepted call as finished.
    pub fn finish(&self) {
        self.inflight.fetch_sub(1, Ordering::AcqRel);
        decrement_calls_inflight();
    }
}

/// A cooperative pool of asynchronous workers that process [`WorkRequest`]s.
pub struct WorkerPool {
    queue: mpsc::Sender<WorkRequest>,
    num_workers: usize,
    state: Arc<PoolState>,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl WorkerPool {
    /// Constructs a new [`WorkerPool`] from the shared queue's sender.
    pub const fn new(
        queue: mpsc::Sender<WorkRequest>,
        num_workers: usize,
        state: Arc<PoolState>,
        shutdown_token: CancellationToken,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            num_workers,
            state,
            shutdown_token,
            shutdown_timeout,
        }
    }

    pub fn state(&self) -> &PoolState {
        &self.state
    }

    /// Token for one call; cancelled with the pool.
    pub fn call_token(&self) -> CancellationToken {
        self.shutdown_token.child_token()
    }

    /// Queues a [`WorkRequest`] for the next idle worker.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The service is shutting down.
    /// - The queue is full (every worker busy and `queue_depth` calls waiting).
    /// - The workers have exited and the queue is closed.
    pub fn submit(&self, request: WorkRequest) -> Result<(), Error> {
        if self.state.is_shutting_down() || self.shutdown_token.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        self.state.begin();
        match self.queue.try_send(request) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state.finish();
                match e {
                    mpsc::error::TrySendError::Full(_) => Err(Error::ServiceOverloaded),
                    mpsc::error::TrySendError::Closed(_) => Err(Error::ChannelError {
                        context: "worker queue closed".to_string(),
                    }),
                }
            }
        }
    }

    /// Gracefully shuts down all workers in the pool.
    ///
    /// - Refuses new requests.
    /// - Waits up to `shutdown_timeout` for in-flight calls to drain.
    /// - Cancels the shared [`CancellationToken`] to stop what remains.
    /// - Sends one [`WorkRequest::Shutdown`] per worker and waits (up to 3
    ///   seconds each) for acknowledgements.
    pub async fn shutdown(&self) -> Result<(), Error> {
        // === Phase 0: Stop accepting new requests ===
        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new requests");
        self.state.shutting_down.store(true, Ordering::Release);

        // === Phase 1: Wait for in-flight calls to drain ===
        #[cfg(feature = "tracing")]
        tracing::info!("Draining in-flight calls ({} active)", self.state.inflight());
        let drain_result = timeout(self.shutdown_timeout, async {
            while self.state.inflight() > 0 {
                sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        match drain_result {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("All in-flight calls drained successfully");
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "Graceful drain timed out ({} calls still active)",
                    self.state.inflight()
                );
            }
        }

        // === Phase 2: Cancel any remaining work ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Cancelling remaining work via shutdown token");
        self.shutdown_token.cancel();

        // === Phase 3: Notify workers to shut down ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Notifying all workers to shut down");
        let mut shutdown_handles = Vec::with_capacity(self.num_workers);

        for i in 0..self.num_workers {
            let (tx, rx) = oneshot::channel();
            match timeout(
                Duration::from_secs(3),
                self.queue.send(WorkRequest::Shutdown { response: tx }),
            )
            .await
            {
                Ok(Ok(())) => shutdown_handles.push((i, rx)),
                Ok(Err(_e)) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Failed to send shutdown {i}: {_e}");
                }
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Timed out queueing shutdown {i}");
                }
            }
        }

        let timeout_futures = shutdown_handles.into_iter().map(|(_i, rx)| async move {
            match timeout(Duration::from_secs(3), rx).await {
                Ok(Ok(())) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Shutdown {_i} acknowledged");
                }
                Ok(Err(_e)) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Shutdown {_i} returned error: {_e}");
                }
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Shutdown {_i} timed out");
                }
            }
        });

        futures::future::join_all(timeout_futures).await;

        #[cfg(feature = "tracing")]
        tracing::info!("Worker pool shutdown complete");

        Ok(())
    }
}

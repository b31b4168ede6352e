//! gRPC service implementation for geospatial point delivery.
//!
//! This module defines [`DeliveryService`], the concrete implementation of the
//! [`GeospatialService`] gRPC service defined in the protobuf specification.
//! Every call is validated here, turned into a [`WorkRequest`], and queued on
//! the shared worker pool; workers generate surfaces or read datasets and
//! answer over a oneshot (unary calls) or straight into the response stream.
//!
//! ## Responsibilities
//!
//! - Spawn and manage a background worker pool.
//! - Validate incoming requests and enforce the configured point limit.
//! - Tie each call's lifetime to a cancellation token.
//! - Handle backpressure, overload, and graceful shutdown.

use crate::server::{
    config::ServerConfig,
    pool::{
        manager::{PoolState, WorkerPool},
        worker::worker_loop,
    },
    service::config::{Pipeline, SharedStore, WorkerContext},
    streaming::request::{BatchReply, BatchShape, WorkRequest},
    telemetry::{
        increment_errors, increment_points_delivered, increment_requests,
        record_points_per_request,
    },
};
use core::pin::Pin;
use std::sync::Arc;
use terrastream_tonic_core::{
    BatchParams, Error, LiveParams, PageParams,
    proto::{
        ColumnarDataChunk, DataPoint, GetBatchDataChunk, GetBatchDataColumnarResponse,
        GetBatchDataOptimizedResponse, GetBatchDataRequest, GetBatchDataResponse,
        GetDatasetPageRequest, GetDatasetPageResponse, StreamDataRequest,
        geospatial_service_server::GeospatialService,
    },
    terrastream::{BoundaryEngine, ChunkedEncoder},
};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

type ResponseStream<M> = Pin<Box<dyn Stream<Item = Result<M, Status>> + Send>>;

/// gRPC front end for synthetic surfaces and stored dataset pages.
///
/// Implements the [`GeospatialService`] service defined in the protobuf
/// schema. Handlers never generate anything themselves; they queue a
/// [`WorkRequest`] and wait for (or stream) the worker's answer.
#[derive(Clone)]
pub struct DeliveryService {
    config: ServerConfig,
    worker_pool: Arc<WorkerPool>,
}

impl DeliveryService {
    /// Creates a new `DeliveryService` and spawns its worker tasks.
    ///
    /// All workers share one bounded queue of depth `config.queue_depth`, so
    /// at most `num_workers` calls run at once and at most `queue_depth` more
    /// wait; anything beyond that is refused as overloaded.
    pub fn new(config: ServerConfig, store: SharedStore) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_depth);
        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let state = Arc::new(PoolState::default());
        let shutdown_token = CancellationToken::new();

        let engine = BoundaryEngine::new(store).with_page_threshold(config.boundary_page_threshold);
        let ctx = Arc::new(WorkerContext {
            pipeline: Pipeline::default(),
            encoder: ChunkedEncoder::new(config.points_per_chunk),
            engine: Arc::new(engine),
            max_points_per_second: config.max_points_per_second,
            live_stream_duration: config.live_stream_duration,
            chunk_pause: config.chunk_pause,
        });

        for worker_id in 0..config.num_workers {
            tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&queue_rx),
                Arc::clone(&ctx),
                Arc::clone(&state),
            ));
        }

        let worker_pool = WorkerPool::new(
            queue_tx,
            config.num_workers,
            state,
            shutdown_token,
            config.shutdown_timeout,
        );

        Self {
            config,
            worker_pool: Arc::new(worker_pool),
        }
    }

    /// Initiates a graceful shutdown of the worker pool.
    ///
    /// New calls are refused, in-flight calls get `shutdown_timeout` to
    /// finish, and the rest are cancelled before each worker acknowledges
    /// termination.
    pub async fn shutdown(&self) -> Result<(), Error> {
        self.worker_pool.shutdown().await
    }

    /// Queues a unary call and waits for the worker's reply.
    ///
    /// The call's token is cancelled if this future is dropped, which is how
    /// a departed client reaches a queued request.
    async fn unary<T>(
        &self,
        build: impl FnOnce(
            oneshot::Sender<terrastream_tonic_core::Result<T>>,
            CancellationToken,
        ) -> WorkRequest,
    ) -> terrastream_tonic_core::Result<T> {
        let (tx, rx) = oneshot::channel();
        let token = self.worker_pool.call_token();
        let _guard = token.clone().drop_guard();

        self.worker_pool.submit(build(tx, token))?;

        match rx.await {
            Ok(result) => result,
            Err(_) if self.worker_pool.state().is_shutting_down() => Err(Error::ServiceShutdown),
            Err(_) => Err(Error::ChannelError {
                context: "worker dropped the reply".to_string(),
            }),
        }
    }

    /// Queues a streaming call and hands back its response stream.
    ///
    /// A dropped stream closes the worker's `tx`, which the worker polls
    /// between messages.
    fn open_stream<M: Send + 'static>(
        &self,
        build: impl FnOnce(mpsc::Sender<Result<M, Status>>, CancellationToken) -> WorkRequest,
    ) -> terrastream_tonic_core::Result<ResponseStream<M>> {
        let (tx, rx) = mpsc::channel(self.config.stream_buffer_size);
        self.worker_pool
            .submit(build(tx, self.worker_pool.call_token()))?;
        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn batch(
        &self,
        method: &'static str,
        req: &GetBatchDataRequest,
        shape: BatchShape,
    ) -> terrastream_tonic_core::Result<BatchReply> {
        increment_requests(method);
        let params = BatchParams::from_request(req, self.config.max_points)?;
        record_points_per_request(params.max_points as f64);

        self.unary(|response, cancelled| WorkRequest::Batch {
            params,
            shape,
            response,
            cancelled,
        })
        .await
    }
}

fn counted<T>(method: &'static str, result: terrastream_tonic_core::Result<T>) -> Result<T, Status> {
    result.map_err(|e| {
        increment_errors(method);
        #[cfg(feature = "tracing")]
        tracing::warn!("{method} failed: {e}");
        Status::from(e)
    })
}

fn mismatched(method: &'static str) -> Status {
    increment_errors(method);
    Status::internal(format!("{method} received a reply of the wrong shape"))
}

#[tonic::async_trait]
impl GeospatialService for DeliveryService {
    type StreamDataStream = ResponseStream<DataPoint>;
    type GetBatchDataStreamedStream = ResponseStream<GetBatchDataChunk>;
    type GetBatchDataColumnarStreamedStream = ResponseStream<ColumnarDataChunk>;

    /// Streams single points at the requested rate for the live window.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(rate = req.get_ref().max_points_per_second)))]
    async fn stream_data(
        &self,
        req: Request<StreamDataRequest>,
    ) -> Result<Response<Self::StreamDataStream>, Status> {
        const METHOD: &str = "StreamData";
        increment_requests(METHOD);

        let stream = LiveParams::from_request(req.get_ref()).and_then(|params| {
            self.open_stream(|tx, cancelled| WorkRequest::Live {
                params,
                tx,
                cancelled,
            })
        });
        Ok(Response::new(counted(METHOD, stream)?))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(max_points = req.get_ref().max_points)))]
    async fn get_batch_data(
        &self,
        req: Request<GetBatchDataRequest>,
    ) -> Result<Response<GetBatchDataResponse>, Status> {
        const METHOD: &str = "GetBatchData";
        let reply = self.batch(METHOD, req.get_ref(), BatchShape::Rows).await;
        match counted(METHOD, reply)? {
            BatchReply::Rows(resp) => {
                increment_points_delivered(resp.data_points.len() as u64);
                Ok(Response::new(resp))
            }
            _ => Err(mismatched(METHOD)),
        }
    }

    /// Same payload as [`Self::get_batch_data`]; the transport compresses it.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(max_points = req.get_ref().max_points)))]
    async fn get_batch_data_compressed(
        &self,
        req: Request<GetBatchDataRequest>,
    ) -> Result<Response<GetBatchDataResponse>, Status> {
        const METHOD: &str = "GetBatchDataCompressed";
        let reply = self.batch(METHOD, req.get_ref(), BatchShape::Compressed).await;
        match counted(METHOD, reply)? {
            BatchReply::Rows(resp) => {
                increment_points_delivered(resp.data_points.len() as u64);
                Ok(Response::new(resp))
            }
            _ => Err(mismatched(METHOD)),
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(max_points = req.get_ref().max_points)))]
    async fn get_batch_data_optimized(
        &self,
        req: Request<GetBatchDataRequest>,
    ) -> Result<Response<GetBatchDataOptimizedResponse>, Status> {
        const METHOD: &str = "GetBatchDataOptimized";
        let reply = self.batch(METHOD, req.get_ref(), BatchShape::Optimized).await;
        match counted(METHOD, reply)? {
            BatchReply::Optimized(resp) => {
                increment_points_delivered(resp.data_points.len() as u64);
                Ok(Response::new(resp))
            }
            _ => Err(mismatched(METHOD)),
        }
    }

    /// Streams the batch as row-oriented chunks.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(max_points = req.get_ref().max_points)))]
    async fn get_batch_data_streamed(
        &self,
        req: Request<GetBatchDataRequest>,
    ) -> Result<Response<Self::GetBatchDataStreamedStream>, Status> {
        const METHOD: &str = "GetBatchDataStreamed";
        increment_requests(METHOD);

        let stream = BatchParams::from_request(req.get_ref(), self.config.max_points).and_then(
            |params| {
                record_points_per_request(params.max_points as f64);
                self.open_stream(|tx, cancelled| WorkRequest::RowChunks {
                    params,
                    tx,
                    cancelled,
                })
            },
        );
        Ok(Response::new(counted(METHOD, stream)?))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(max_points = req.get_ref().max_points)))]
    async fn get_batch_data_columnar(
        &self,
        req: Request<GetBatchDataRequest>,
    ) -> Result<Response<GetBatchDataColumnarResponse>, Status> {
        const METHOD: &str = "GetBatchDataColumnar";
        let reply = self.batch(METHOD, req.get_ref(), BatchShape::Columnar).await;
        match counted(METHOD, reply)? {
            BatchReply::Columnar(resp) => {
                increment_points_delivered(u64::try_from(resp.total_count).unwrap_or_default());
                Ok(Response::new(resp))
            }
            _ => Err(mismatched(METHOD)),
        }
    }

    /// Streams the batch as columnar chunks.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(max_points = req.get_ref().max_points)))]
    async fn get_batch_data_columnar_streamed(
        &self,
        req: Request<GetBatchDataRequest>,
    ) -> Result<Response<Self::GetBatchDataColumnarStreamedStream>, Status> {
        const METHOD: &str = "GetBatchDataColumnarStreamed";
        increment_requests(METHOD);

        let stream = BatchParams::from_request(req.get_ref(), self.config.max_points).and_then(
            |params| {
                record_points_per_request(params.max_points as f64);
                self.open_stream(|tx, cancelled| WorkRequest::ColumnarChunks {
                    params,
                    tx,
                    cancelled,
                })
            },
        );
        Ok(Response::new(counted(METHOD, stream)?))
    }

    /// Reads one dataset page; boundaries are attached for small pages.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(dataset_id = %req.get_ref().dataset_id, page = req.get_ref().page)))]
    async fn get_dataset_page(
        &self,
        req: Request<GetDatasetPageRequest>,
    ) -> Result<Response<GetDatasetPageResponse>, Status> {
        const METHOD: &str = "GetDatasetPage";
        increment_requests(METHOD);

        let reply = match PageParams::from_request(req.get_ref()) {
            Ok(params) => {
                self.unary(|response, cancelled| WorkRequest::Page {
                    params,
                    response,
                    cancelled,
                })
                .await
            }
            Err(e) => Err(e),
        };
        Ok(Response::new(counted(METHOD, reply)?))
    }
}

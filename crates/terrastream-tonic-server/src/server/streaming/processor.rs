//! Single-response calls: whole batches and dataset pages.
//!
//! Generation, projection and SQLite reads are synchronous, so each runs on
//! Tokio's blocking pool while the owning worker awaits it. The worker stays
//! occupied for the full call either way.

use super::request::{BatchReply, BatchShape};
use crate::server::service::config::{Pipeline, WorkerContext};
use std::sync::Arc;
use terrastream_tonic_core::{
    BatchParams, Error, PageParams, Result, page_response,
    proto::{
        GetBatchDataColumnarResponse, GetBatchDataOptimizedResponse, GetBatchDataResponse,
        GetDatasetPageResponse,
    },
    terrastream::{
        Auxiliary, ColumnarProjection, FieldKind, GenerationRequest, OptimizedProjection, Projection,
        RowProjection, SurfaceBatch,
    },
    wire_count,
};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

pub(crate) fn join_error(e: tokio::task::JoinError) -> Error {
    Error::ChannelError {
        context: format!("blocking task failed: {e}"),
    }
}

/// Samples the requested grid on the blocking pool.
pub async fn generate_batch(
    pipeline: Pipeline,
    params: BatchParams,
    auxiliary: Auxiliary,
) -> Result<SurfaceBatch> {
    tokio::task::spawn_blocking(move || -> Result<SurfaceBatch> {
        let request = GenerationRequest::new(
            params.bounds,
            &params.data_types,
            params.max_points,
            params.resolution,
        )?;
        Ok(pipeline.generate(&request, auxiliary, &mut rand::rng()))
    })
    .await
    .map_err(join_error)?
}

/// Samples and projects a whole batch on the blocking pool.
///
/// Returns the resolved kind, the point count and the projected payload.
async fn generate_and_project<P>(
    pipeline: Pipeline,
    params: BatchParams,
    projection: P,
) -> Result<(FieldKind, usize, P::Output)>
where
    P: Projection + Send + 'static,
    P::Output: Send + 'static,
{
    tokio::task::spawn_blocking(move || -> Result<(FieldKind, usize, P::Output)> {
        let request = GenerationRequest::new(
            params.bounds,
            &params.data_types,
            params.max_points,
            params.resolution,
        )?;
        let batch = pipeline.generate(&request, projection.auxiliary(), &mut rand::rng());
        Ok((batch.kind, batch.len(), projection.project_all(&batch)))
    })
    .await
    .map_err(join_error)?
}

async fn build_batch(pipeline: Pipeline, params: BatchParams, shape: BatchShape) -> Result<BatchReply> {
    match shape {
        BatchShape::Rows | BatchShape::Compressed => {
            let (kind, total, points) = generate_and_project(pipeline, params, RowProjection).await?;
            let mut generation_method = RowProjection.method_label(kind);
            if shape == BatchShape::Compressed {
                generation_method.push_str("_compressed");
            }
            Ok(BatchReply::Rows(GetBatchDataResponse {
                data_points: points.into_iter().map(Into::into).collect(),
                total_count: wire_count(total),
                generation_method,
            }))
        }
        BatchShape::Optimized => {
            let (kind, total, points) =
                generate_and_project(pipeline, params, OptimizedProjection).await?;
            Ok(BatchReply::Optimized(GetBatchDataOptimizedResponse {
                data_points: points.into_iter().map(Into::into).collect(),
                total_count: wire_count(total),
                generation_method: OptimizedProjection.method_label(kind),
            }))
        }
        BatchShape::Columnar => {
            let (kind, total, block) =
                generate_and_project(pipeline, params, ColumnarProjection).await?;
            Ok(BatchReply::Columnar(GetBatchDataColumnarResponse {
                columnar_data: Some(block.into()),
                total_count: wire_count(total),
                generation_method: ColumnarProjection.method_label(kind),
            }))
        }
    }
}

/// Serves a [`WorkRequest::Batch`](super::request::WorkRequest::Batch).
///
/// Skips generation entirely when the caller is already gone.
pub async fn handle_batch(
    _worker_id: usize,
    ctx: &WorkerContext,
    params: BatchParams,
    shape: BatchShape,
    response: oneshot::Sender<Result<BatchReply>>,
    cancelled: CancellationToken,
) {
    if cancelled.is_cancelled() || response.is_closed() {
        #[cfg(feature = "tracing")]
        tracing::debug!("Worker {_worker_id} skipping batch for departed caller");
        return;
    }

    let result = build_batch(ctx.pipeline.clone(), params, shape).await;
    if response.send(result).is_err() {
        #[cfg(feature = "tracing")]
        tracing::debug!("Worker {_worker_id} finished batch after caller left");
    }
}

/// Serves a [`WorkRequest::Page`](super::request::WorkRequest::Page).
///
/// A missing dataset answers with `found = false` rather than an error.
pub async fn handle_page(
    _worker_id: usize,
    ctx: &WorkerContext,
    params: PageParams,
    response: oneshot::Sender<Result<GetDatasetPageResponse>>,
    cancelled: CancellationToken,
) {
    if cancelled.is_cancelled() || response.is_closed() {
        #[cfg(feature = "tracing")]
        tracing::debug!("Worker {_worker_id} skipping page read for departed caller");
        return;
    }

    let engine = Arc::clone(&ctx.engine);
    let result = tokio::task::spawn_blocking(move || -> Result<GetDatasetPageResponse> {
        let bounded = engine.read_page(
            &params.dataset_id,
            params.page,
            params.page_size,
            &params.boundary_columns,
        )?;
        match bounded {
            Some(b) => page_response(b.page, b.boundaries),
            None => Ok(GetDatasetPageResponse {
                page: wire_count(params.page),
                found: false,
                ..Default::default()
            }),
        }
    })
    .await
    .map_err(join_error)
    .and_then(|r| r);

    if response.send(result).is_err() {
        #[cfg(feature = "tracing")]
        tracing::debug!("Worker {_worker_id} finished page read after caller left");
    }
}

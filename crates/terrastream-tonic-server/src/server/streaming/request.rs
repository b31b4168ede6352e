use terrastream_tonic_core::{
    BatchParams, LiveParams, PageParams,
    proto::{
        ColumnarDataChunk, DataPoint, GetBatchDataChunk, GetBatchDataColumnarResponse,
        GetBatchDataOptimizedResponse, GetBatchDataResponse, GetDatasetPageResponse,
    },
};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Single-response batch shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchShape {
    Rows,
    Compressed,
    Optimized,
    Columnar,
}

/// Reply to a [`WorkRequest::Batch`], one variant per [`BatchShape`].
#[derive(Debug)]
pub enum BatchReply {
    /// Answers both [`BatchShape::Rows`] and [`BatchShape::Compressed`].
    Rows(GetBatchDataResponse),
    Optimized(GetBatchDataOptimizedResponse),
    Columnar(GetBatchDataColumnarResponse),
}

/// A message sent from the service to the shared worker queue.
///
/// Every variant except [`WorkRequest::Shutdown`] carries the call's
/// cancellation token, a child of the pool's shutdown token. Unary calls
/// answer over a oneshot; streaming calls write straight into the gRPC
/// response channel, so a dropped client shows up as a closed `tx`.
#[derive(Debug)]
pub enum WorkRequest {
    /// Generate one batch and answer with a single message.
    Batch {
        params: BatchParams,
        shape: BatchShape,
        response: oneshot::Sender<terrastream_tonic_core::Result<BatchReply>>,
        cancelled: CancellationToken,
    },

    /// Generate one batch and stream it as row-oriented chunks.
    RowChunks {
        params: BatchParams,
        tx: mpsc::Sender<Result<GetBatchDataChunk, Status>>,
        cancelled: CancellationToken,
    },

    /// Generate one batch and stream it as columnar chunks.
    ColumnarChunks {
        params: BatchParams,
        tx: mpsc::Sender<Result<ColumnarDataChunk, Status>>,
        cancelled: CancellationToken,
    },

    /// Emit single points at a fixed rate until the window closes.
    Live {
        params: LiveParams,
        tx: mpsc::Sender<Result<DataPoint, Status>>,
        cancelled: CancellationToken,
    },

    /// Read one dataset page, with boundaries for small pages.
    Page {
        params: PageParams,
        response: oneshot::Sender<terrastream_tonic_core::Result<GetDatasetPageResponse>>,
        cancelled: CancellationToken,
    },

    /// Request the worker to shut down gracefully.
    ///
    /// - `response`: One-shot channel for acknowledging that the worker has
    ///   completed its shutdown routine.
    Shutdown { response: oneshot::Sender<()> },
}

impl WorkRequest {
    /// RPC name used in logs and metrics.
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Batch { shape, .. } => match shape {
                BatchShape::Rows => "GetBatchData",
                BatchShape::Compressed => "GetBatchDataCompressed",
                BatchShape::Optimized => "GetBatchDataOptimized",
                BatchShape::Columnar => "GetBatchDataColumnar",
            },
            Self::RowChunks { .. } => "GetBatchDataStreamed",
            Self::ColumnarChunks { .. } => "GetBatchDataColumnarStreamed",
            Self::Live { .. } => "StreamData",
            Self::Page { .. } => "GetDatasetPage",
            Self::Shutdown { .. } => "Shutdown",
        }
    }
}

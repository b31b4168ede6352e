//! Splitting a generated batch into fixed-size, numbered chunks.

use crate::{Projection, SurfaceBatch};
use core::ops::Range;

/// Points per chunk used by every chunked delivery unless configured.
pub const DEFAULT_POINTS_PER_CHUNK: usize = 25_000;

/// How `total` points divide into chunks of `chunk_size`.
///
/// Zero points yields zero chunks; the final chunk may be short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total: usize,
    chunk_size: usize,
}

impl ChunkPlan {
    /// A `chunk_size` of zero is bumped to one.
    pub const fn new(total: usize, chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 { 1 } else { chunk_size };
        Self { total, chunk_size }
    }

    pub const fn total(&self) -> usize {
        self.total
    }

    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub const fn chunk_count(&self) -> usize {
        self.total.div_ceil(self.chunk_size)
    }

    /// Describes chunk `index` (0-based), or `None` past the end.
    pub fn get(&self, index: usize) -> Option<ChunkSpec> {
        let total_chunks = self.chunk_count();
        if index >= total_chunks {
            return None;
        }
        let start = index * self.chunk_size;
        let end = (start + self.chunk_size).min(self.total);
        Some(ChunkSpec {
            index,
            chunk_number: index + 1,
            total_chunks,
            range: start..end,
            is_final: index + 1 == total_chunks,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = ChunkSpec> + '_ {
        (0..self.chunk_count()).filter_map(|i| self.get(i))
    }
}

/// Position of a single chunk within a [`ChunkPlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpec {
    pub index: usize,
    /// 1-based.
    pub chunk_number: usize,
    pub total_chunks: usize,
    pub range: Range<usize>,
    pub is_final: bool,
}

impl ChunkSpec {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// One chunk of a projected batch, ready to be framed on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryChunk<P> {
    pub chunk_number: usize,
    pub total_chunks: usize,
    pub points_in_chunk: usize,
    pub is_final_chunk: bool,
    pub generation_method: String,
    pub payload: P,
}

/// Turns a [`SurfaceBatch`] into a sequence of [`DeliveryChunk`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkedEncoder {
    points_per_chunk: usize,
}

impl Default for ChunkedEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_POINTS_PER_CHUNK)
    }
}

impl ChunkedEncoder {
    pub const fn new(points_per_chunk: usize) -> Self {
        Self {
            points_per_chunk: if points_per_chunk == 0 { 1 } else { points_per_chunk },
        }
    }

    pub const fn points_per_chunk(&self) -> usize {
        self.points_per_chunk
    }

    pub const fn plan(&self, total: usize) -> ChunkPlan {
        ChunkPlan::new(total, self.points_per_chunk)
    }

    /// Projects a single chunk of `batch`.
    pub fn encode_chunk<P: Projection>(
        &self,
        batch: &SurfaceBatch,
        projection: &P,
        spec: &ChunkSpec,
        generation_method: &str,
    ) -> DeliveryChunk<P::Output> {
        DeliveryChunk {
            chunk_number: spec.chunk_number,
            total_chunks: spec.total_chunks,
            points_in_chunk: spec.len(),
            is_final_chunk: spec.is_final,
            generation_method: generation_method.to_string(),
            payload: projection.project(batch, spec.range.clone()),
        }
    }

    /// Lazily projects every chunk of `batch` in order.
    ///
    /// Chunks are produced on demand, so a consumer that stops early never
    /// pays for the remaining projections.
    pub fn encode<'a, P: Projection>(
        &self,
        batch: &'a SurfaceBatch,
        projection: &'a P,
        generation_method: &'a str,
    ) -> impl Iterator<Item = DeliveryChunk<P::Output>> + 'a {
        let encoder = *self;
        let plan = self.plan(batch.len());
        (0..plan.chunk_count())
            .filter_map(move |i| plan.get(i))
            .map(move |spec| encoder.encode_chunk(batch, projection, &spec, generation_method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Auxiliary, ColumnarProjection, FixedClock, GenerationRequest, GeoBounds, RowProjection,
        SurfacePipeline,
    };
    use rand::{SeedableRng, rngs::StdRng};

    fn batch(points: usize, auxiliary: Auxiliary) -> SurfaceBatch {
        let bounds = GeoBounds::new(0.0, 1.0, 0.0, 1.0).unwrap();
        let request = GenerationRequest::new(bounds, &["sine_wave"], points, 20).unwrap();
        SurfacePipeline::new(FixedClock(0)).generate(
            &request,
            auxiliary,
            &mut StdRng::seed_from_u64(9),
        )
    }

    #[test]
    fn plan_splits_with_short_tail() {
        let plan = ChunkPlan::new(60_000, DEFAULT_POINTS_PER_CHUNK);
        assert_eq!(plan.chunk_count(), 3);
        let sizes: Vec<_> = plan.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![25_000, 25_000, 10_000]);
        let finals: Vec<_> = plan.iter().map(|c| c.is_final).collect();
        assert_eq!(finals, vec![false, false, true]);
        let numbers: Vec<_> = plan.iter().map(|c| c.chunk_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn plan_edge_cases() {
        assert_eq!(ChunkPlan::new(0, 10).chunk_count(), 0);
        assert!(ChunkPlan::new(0, 10).get(0).is_none());
        assert_eq!(ChunkPlan::new(10, 10).chunk_count(), 1);
        assert_eq!(ChunkPlan::new(11, 10).chunk_count(), 2);
        assert_eq!(ChunkPlan::new(3, 0).chunk_size(), 1);
    }

    #[test]
    fn encoder_chunks_cover_the_batch_in_order() {
        let batch = batch(2_500, Auxiliary::Skip);
        let encoder = ChunkedEncoder::new(1_000);
        let chunks: Vec<_> = encoder.encode(&batch, &RowProjection, "label").collect();

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.points_in_chunk).sum::<usize>(),
            batch.len()
        );
        let ids: Vec<String> = chunks
            .iter()
            .flat_map(|c| c.payload.iter().map(|p| p.id.clone()))
            .collect();
        let whole: Vec<String> = RowProjection.project_all(&batch).into_iter().map(|p| p.id).collect();
        assert_eq!(ids, whole);
        assert!(chunks.iter().all(|c| c.generation_method == "label"));
        assert!(chunks[2].is_final_chunk && !chunks[1].is_final_chunk);
        assert_eq!(chunks[2].total_chunks, 3);
    }

    #[test]
    fn columnar_chunks_stay_aligned() {
        let batch = batch(1_234, Auxiliary::Include);
        let encoder = ChunkedEncoder::new(500);
        for chunk in encoder.encode(&batch, &ColumnarProjection, "c") {
            assert!(chunk.payload.is_aligned());
            assert_eq!(chunk.payload.len(), chunk.points_in_chunk);
            assert_eq!(chunk.payload.additional_data.len(), 2);
        }
    }
}

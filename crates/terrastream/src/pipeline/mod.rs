//! One generation pipeline, three wire shapes.
//!
//! [`SurfacePipeline::generate`] samples the requested grid once in double
//! precision and drops non-finite samples. The resulting [`SurfaceBatch`] is
//! then handed to a [`Projection`] ([`RowProjection`], [`OptimizedProjection`]
//! or [`ColumnarProjection`]), optionally one chunk range at a time. Because
//! every shape projects the same batch, the shapes always agree on point
//! count, ordering and coordinates.

mod projection;

pub use projection::*;

use crate::{FieldKind, GeoBounds, GeoGrid, GridSpec, Result, SurfaceGenerator, SystemClock, WallClock};
use rand::Rng;

/// Requests above this many points switch row payloads to compact ids and
/// single-entry metadata.
pub const COMPACT_METADATA_THRESHOLD: usize = 50_000;

/// A validated batch generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub bounds: GeoBounds,
    pub kind: FieldKind,
    pub auxiliary: Vec<FieldKind>,
    pub grid: GridSpec,
}

impl GenerationRequest {
    /// Builds a request from raw wire keys.
    ///
    /// The first key selects the primary kind (unknown or missing keys fall
    /// back to elevation). Later keys that name a known kind become auxiliary
    /// columns. Elevation and temperature are added as auxiliary columns
    /// unless their own key was requested, so an unknown primary that fell
    /// back to elevation still carries an elevation column.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::Error::InvalidGrid`] for a zero point budget or
    /// resolution.
    pub fn new<S: AsRef<str>>(
        bounds: GeoBounds,
        data_types: &[S],
        max_points: usize,
        resolution: usize,
    ) -> Result<Self> {
        let kind = data_types
            .first()
            .map_or_else(FieldKind::default, |k| FieldKind::resolve(k.as_ref()));

        let mut auxiliary: Vec<FieldKind> = Vec::new();
        let later = data_types.iter().skip(1).filter_map(|k| FieldKind::lookup(k.as_ref()));
        for extra in later {
            if extra != kind && !auxiliary.contains(&extra) {
                auxiliary.push(extra);
            }
        }
        // An empty key list reads as a literal "elevation" request.
        let named = |want: FieldKind| {
            if data_types.is_empty() {
                want == kind
            } else {
                data_types.iter().any(|k| k.as_ref() == want.as_str())
            }
        };
        for extra in [FieldKind::Elevation, FieldKind::Temperature] {
            if !named(extra) && !auxiliary.contains(&extra) {
                auxiliary.push(extra);
            }
        }

        Ok(Self {
            bounds,
            kind,
            auxiliary,
            grid: GridSpec::new(max_points, resolution)?,
        })
    }

    pub fn point_count(&self) -> usize {
        self.grid.point_count()
    }

    pub fn is_compact(&self) -> bool {
        self.grid.requested_point_count() > COMPACT_METADATA_THRESHOLD
    }
}

/// A single generated grid sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSample {
    /// Flattened grid index, stable across filtering.
    pub index: usize,
    pub row: usize,
    pub col: usize,
    pub latitude: f64,
    pub longitude: f64,
    pub value: f64,
}

/// Output of one generation run, before projection.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceBatch {
    pub kind: FieldKind,
    pub resolution: usize,
    pub compact: bool,
    pub generated_at_ms: i64,
    pub samples: Vec<GridSample>,
    /// Extra surfaces, index-aligned with `samples`.
    pub auxiliary: Vec<(FieldKind, Vec<f64>)>,
    /// Samples removed because a coordinate or value was not finite.
    pub dropped: usize,
}

impl SurfaceBatch {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn generated_at_secs(&self) -> i64 {
        self.generated_at_ms.div_euclid(1000)
    }
}

/// Whether a run should also sample the auxiliary surfaces.
///
/// Only the columnar shape carries them, so row and optimized requests skip
/// the extra work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auxiliary {
    Include,
    Skip,
}

/// Drives [`SurfaceGenerator`] across a request's grid.
#[derive(Debug, Clone, Default)]
pub struct SurfacePipeline<C = SystemClock> {
    clock: C,
}

impl<C: WallClock> SurfacePipeline<C> {
    pub const fn new(clock: C) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Samples the first `request.point_count()` grid cells.
    ///
    /// Samples whose coordinates or value are not finite in either double or
    /// single precision are dropped from every shape alike.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        request: &GenerationRequest,
        auxiliary: Auxiliary,
        rng: &mut R,
    ) -> SurfaceBatch {
        let generator = SurfaceGenerator::at(&self.clock);
        let resolution = request.grid.actual_resolution();
        let limit = request.point_count();
        let grid = GeoGrid::covering(&request.bounds, resolution, limit);

        let values = generator.sample_grid(request.kind, &request.bounds, &grid, limit, rng);
        let extras: Vec<(FieldKind, Vec<f64>)> = match auxiliary {
            Auxiliary::Skip => Vec::new(),
            Auxiliary::Include => request
                .auxiliary
                .iter()
                .map(|&k| (k, generator.sample_grid(k, &request.bounds, &grid, limit, rng)))
                .collect(),
        };

        let mut samples = Vec::with_capacity(values.len());
        let mut keep = Vec::with_capacity(values.len());
        for (index, value) in values.into_iter().enumerate() {
            let (row, col, latitude, longitude) = grid.locate(index);
            let ok = [latitude, longitude, value]
                .iter()
                .all(|v| v.is_finite() && (*v as f32).is_finite());
            keep.push(ok);
            if ok {
                samples.push(GridSample {
                    index,
                    row,
                    col,
                    latitude,
                    longitude,
                    value,
                });
            }
        }
        let dropped = keep.len() - samples.len();

        let auxiliary = extras
            .into_iter()
            .map(|(k, vs)| {
                let kept = vs
                    .into_iter()
                    .zip(keep.iter())
                    .filter_map(|(v, ok)| ok.then_some(v))
                    .collect();
                (k, kept)
            })
            .collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            kind = %request.kind,
            requested = request.grid.requested_point_count(),
            resolution = request.grid.requested_resolution(),
            actual_resolution = resolution,
            generated = samples.len(),
            dropped,
            "surface generated"
        );

        SurfaceBatch {
            kind: request.kind,
            resolution,
            compact: request.is_compact(),
            generated_at_ms: self.clock.now_millis(),
            samples,
            auxiliary,
            dropped,
        }
    }
}

#[cfg(test)]
mod tests;

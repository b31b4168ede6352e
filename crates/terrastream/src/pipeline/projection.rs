use super::{Auxiliary, SurfaceBatch};
use crate::FieldKind;
use core::ops::Range;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A row-oriented point with a free-form metadata map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub value: f64,
    pub unit: String,
    pub timestamp_ms: i64,
    pub metadata: BTreeMap<String, String>,
}

/// A flattened point: scalars only, single-precision, fixed schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedPoint {
    pub id: String,
    pub latitude: f32,
    pub longitude: f32,
    pub altitude: f32,
    pub value: f32,
    pub unit: String,
    pub timestamp_ms: i64,
    pub generation_method: String,
}

/// Parallel arrays describing a run of points.
///
/// `x` is longitude, `y` latitude and `z` the primary value. Every array,
/// including each entry of `additional_data`, has the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnarBlock {
    pub id: Vec<String>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub id_value: Vec<String>,
    pub additional_data: BTreeMap<String, Vec<f64>>,
}

impl ColumnarBlock {
    pub fn len(&self) -> usize {
        self.id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    /// True when every array shares the same length.
    pub fn is_aligned(&self) -> bool {
        let n = self.id.len();
        self.x.len() == n
            && self.y.len() == n
            && self.z.len() == n
            && self.id_value.len() == n
            && self.additional_data.values().all(|v| v.len() == n)
    }
}

/// The final step of the generation pipeline: turns a slice of a
/// [`SurfaceBatch`] into one wire shape.
pub trait Projection {
    type Output;

    /// Whether the batch must carry auxiliary surfaces for this shape.
    fn auxiliary(&self) -> Auxiliary {
        Auxiliary::Skip
    }

    /// Base `generation_method` label for this shape.
    fn method_label(&self, kind: FieldKind) -> String {
        format!("synthetic_{kind}_batch")
    }

    /// Projects `batch.samples[range]`.
    fn project(&self, batch: &SurfaceBatch, range: Range<usize>) -> Self::Output;

    fn project_all(&self, batch: &SurfaceBatch) -> Self::Output {
        self.project(batch, 0..batch.len())
    }
}

fn truncate(v: f64) -> f64 {
    f64::from(v as f32)
}

/// Row-oriented [`DataPoint`]s carrying a metadata map.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowProjection;

impl Projection for RowProjection {
    type Output = Vec<DataPoint>;

    fn project(&self, batch: &SurfaceBatch, range: Range<usize>) -> Vec<DataPoint> {
        let kind = batch.kind.as_str();
        let secs = batch.generated_at_secs();
        let resolution = batch.resolution.to_string();

        batch.samples[range]
            .iter()
            .map(|s| {
                let mut metadata = BTreeMap::new();
                metadata.insert("generation_method".to_string(), kind.to_string());
                let id = if batch.compact {
                    s.index.to_string()
                } else {
                    metadata.insert("grid_position".to_string(), format!("{},{}", s.row, s.col));
                    metadata.insert("resolution".to_string(), resolution.clone());
                    metadata.insert("batch_generated".to_string(), "true".to_string());
                    format!("{kind}_{}_{}_{secs}", s.row, s.col)
                };
                DataPoint {
                    id,
                    latitude: truncate(s.latitude),
                    longitude: truncate(s.longitude),
                    altitude: 0.0,
                    value: truncate(s.value),
                    unit: kind.to_string(),
                    timestamp_ms: batch.generated_at_ms,
                    metadata,
                }
            })
            .collect()
    }
}

/// Flattened single-precision [`OptimizedPoint`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizedProjection;

impl Projection for OptimizedProjection {
    type Output = Vec<OptimizedPoint>;

    fn method_label(&self, kind: FieldKind) -> String {
        format!("synthetic_{kind}_batch_optimized")
    }

    fn project(&self, batch: &SurfaceBatch, range: Range<usize>) -> Vec<OptimizedPoint> {
        let kind = batch.kind.as_str();
        let secs = batch.generated_at_secs();

        batch.samples[range]
            .iter()
            .map(|s| OptimizedPoint {
                id: if batch.compact {
                    s.index.to_string()
                } else {
                    format!("{kind}_{}_{}_{secs}", s.row, s.col)
                },
                latitude: s.latitude as f32,
                longitude: s.longitude as f32,
                altitude: 0.0,
                value: s.value as f32,
                unit: kind.to_string(),
                timestamp_ms: batch.generated_at_ms,
                generation_method: kind.to_string(),
            })
            .collect()
    }
}

/// Double-precision [`ColumnarBlock`]s with auxiliary surfaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnarProjection;

impl Projection for ColumnarProjection {
    type Output = ColumnarBlock;

    fn auxiliary(&self) -> Auxiliary {
        Auxiliary::Include
    }

    fn method_label(&self, kind: FieldKind) -> String {
        format!("synthetic_columnar_{kind}")
    }

    fn project(&self, batch: &SurfaceBatch, range: Range<usize>) -> ColumnarBlock {
        let samples = &batch.samples[range.clone()];
        let kind = batch.kind.as_str();

        ColumnarBlock {
            id: samples.iter().map(|s| format!("point_{}", s.index)).collect(),
            x: samples.iter().map(|s| s.longitude).collect(),
            y: samples.iter().map(|s| s.latitude).collect(),
            z: samples.iter().map(|s| s.value).collect(),
            id_value: samples
                .iter()
                .map(|s| format!("{kind}_sensor_{}", s.index % 10))
                .collect(),
            additional_data: batch
                .auxiliary
                .iter()
                .map(|(k, vs)| (k.as_str().to_string(), vs[range.clone()].to_vec()))
                .collect(),
        }
    }
}

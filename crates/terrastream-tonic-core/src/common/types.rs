//! # Wire Conversions and Request Defaults
//!
//! Maps `terrastream` library values onto the generated protobuf messages
//! and resolves the zero-means-default fields of incoming requests, so the
//! server and any client agree on the same contract.
//!
//! ## Constants
//!
//! - [`DEFAULT_MAX_POINTS`] - Points generated when `max_points <= 0`
//! - [`DEFAULT_RESOLUTION`] - Grid resolution when `resolution <= 0`
//! - [`DEFAULT_PAGE_SIZE`] - Rows per page when `page_size <= 0`

use crate::proto;
use crate::{Error, Result};
use terrastream::{
    ColumnBoundary, ColumnarBlock, DataPoint, DatasetPage, DeliveryChunk, FieldKind, GeoBounds,
    OptimizedPoint,
};

pub const DEFAULT_MAX_POINTS: usize = 1_000;
pub const DEFAULT_RESOLUTION: usize = 20;
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Clamps a count into an `int32` wire field.
pub fn wire_count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn positive_or(v: i32, default: usize) -> usize {
    usize::try_from(v).ok().filter(|v| *v > 0).unwrap_or(default)
}

/// Converts a wire bounding box into validated [`GeoBounds`].
///
/// A missing box or corner reads as the origin, matching proto3 defaults.
///
/// # Errors
///
/// Returns [`Error::Generation`] for non-finite or inverted corners.
pub fn bounds_from_proto(bounds: Option<&proto::BoundingBox>) -> Result<GeoBounds> {
    let bbox = bounds.cloned().unwrap_or_default();
    let ne = bbox.northeast.unwrap_or_default();
    let sw = bbox.southwest.unwrap_or_default();
    Ok(GeoBounds::new(
        sw.latitude,
        ne.latitude,
        sw.longitude,
        ne.longitude,
    )?)
}

/// Largest resolution accepted under `max_points_limit`: the side of the
/// smallest square grid holding the limit, and never below
/// [`DEFAULT_RESOLUTION`].
pub fn max_resolution(max_points_limit: usize) -> usize {
    let side = max_points_limit.isqrt();
    let side = if side * side < max_points_limit { side + 1 } else { side };
    side.max(DEFAULT_RESOLUTION)
}

/// A batch request with every default applied.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchParams {
    pub bounds: GeoBounds,
    pub data_types: Vec<String>,
    pub max_points: usize,
    pub resolution: usize,
}

impl BatchParams {
    /// # Errors
    ///
    /// Fails on invalid bounds, or with [`Error::InvalidRequest`] when the
    /// resolved point budget exceeds `max_points_limit` or the resolution
    /// exceeds [`max_resolution`] for that limit.
    pub fn from_request(req: &proto::GetBatchDataRequest, max_points_limit: usize) -> Result<Self> {
        let max_points = positive_or(req.max_points, DEFAULT_MAX_POINTS);
        if max_points > max_points_limit {
            return Err(Error::InvalidRequest {
                reason: format!(
                    "max_points {max_points} exceeds the server limit of {max_points_limit}"
                ),
            });
        }
        let resolution = positive_or(req.resolution, DEFAULT_RESOLUTION);
        let resolution_limit = max_resolution(max_points_limit);
        if resolution > resolution_limit {
            return Err(Error::InvalidRequest {
                reason: format!(
                    "resolution {resolution} exceeds the server limit of {resolution_limit}"
                ),
            });
        }
        Ok(Self {
            bounds: bounds_from_proto(req.bounds.as_ref())?,
            data_types: data_types_or_default(&req.data_types),
            max_points,
            resolution,
        })
    }

    /// The resolved primary kind.
    pub fn kind(&self) -> FieldKind {
        self.data_types
            .first()
            .map_or_else(FieldKind::default, |k| FieldKind::resolve(k))
    }
}

/// A live stream request with every default applied.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveParams {
    pub bounds: GeoBounds,
    pub kind: FieldKind,
    /// Raw requested rate; the sampler applies the default and clamp.
    pub requested_rate: i32,
}

impl LiveParams {
    /// # Errors
    ///
    /// Fails on invalid bounds.
    pub fn from_request(req: &proto::StreamDataRequest) -> Result<Self> {
        Ok(Self {
            bounds: bounds_from_proto(req.bounds.as_ref())?,
            kind: req
                .data_types
                .first()
                .map_or_else(FieldKind::default, |k| FieldKind::resolve(k)),
            requested_rate: req.max_points_per_second,
        })
    }
}

/// A page request with every default applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageParams {
    pub dataset_id: String,
    pub page: usize,
    pub page_size: usize,
    pub boundary_columns: Vec<String>,
}

impl PageParams {
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for an empty dataset id.
    pub fn from_request(req: &proto::GetDatasetPageRequest) -> Result<Self> {
        if req.dataset_id.is_empty() {
            return Err(Error::InvalidRequest {
                reason: "dataset_id must not be empty".to_string(),
            });
        }
        Ok(Self {
            dataset_id: req.dataset_id.clone(),
            page: positive_or(req.page, 1),
            page_size: positive_or(req.page_size, DEFAULT_PAGE_SIZE),
            boundary_columns: req.boundary_columns.clone(),
        })
    }
}

fn data_types_or_default(data_types: &[String]) -> Vec<String> {
    if data_types.is_empty() {
        vec![FieldKind::default().as_str().to_string()]
    } else {
        data_types.to_vec()
    }
}

impl From<DataPoint> for proto::DataPoint {
    fn from(p: DataPoint) -> Self {
        Self {
            id: p.id,
            location: Some(proto::Coordinate {
                latitude: p.latitude,
                longitude: p.longitude,
                altitude: p.altitude,
            }),
            value: p.value,
            unit: p.unit,
            timestamp: p.timestamp_ms,
            metadata: p.metadata,
        }
    }
}

impl From<OptimizedPoint> for proto::OptimizedDataPoint {
    fn from(p: OptimizedPoint) -> Self {
        Self {
            id: p.id,
            latitude: p.latitude,
            longitude: p.longitude,
            altitude: p.altitude,
            value: p.value,
            unit: p.unit,
            timestamp: p.timestamp_ms,
            generation_method: p.generation_method,
        }
    }
}

impl From<ColumnarBlock> for proto::ColumnarData {
    fn from(b: ColumnarBlock) -> Self {
        Self {
            id: b.id,
            x: b.x,
            y: b.y,
            z: b.z,
            id_value: b.id_value,
            additional_data: b
                .additional_data
                .into_iter()
                .map(|(k, values)| (k, proto::DoubleColumn { values }))
                .collect(),
        }
    }
}

impl From<DeliveryChunk<Vec<DataPoint>>> for proto::GetBatchDataChunk {
    fn from(c: DeliveryChunk<Vec<DataPoint>>) -> Self {
        Self {
            data_points: c.payload.into_iter().map(Into::into).collect(),
            chunk_number: wire_count(c.chunk_number),
            total_chunks: wire_count(c.total_chunks),
            points_in_chunk: wire_count(c.points_in_chunk),
            is_final_chunk: c.is_final_chunk,
            generation_method: c.generation_method,
        }
    }
}

impl From<DeliveryChunk<ColumnarBlock>> for proto::ColumnarDataChunk {
    fn from(c: DeliveryChunk<ColumnarBlock>) -> Self {
        Self {
            columnar_data: Some(c.payload.into()),
            chunk_number: wire_count(c.chunk_number),
            total_chunks: wire_count(c.total_chunks),
            points_in_chunk: wire_count(c.points_in_chunk),
            is_final_chunk: c.is_final_chunk,
            generation_method: c.generation_method,
        }
    }
}

impl From<ColumnBoundary> for proto::ColumnBoundary {
    fn from(b: ColumnBoundary) -> Self {
        Self {
            column_name: b.column_name,
            min_value: b.min_value,
            max_value: b.max_value,
            valid_count: i64::try_from(b.valid_count).unwrap_or(i64::MAX),
        }
    }
}

/// Builds a page response; rows are re-encoded as JSON objects.
///
/// # Errors
///
/// Returns [`Error::Store`] if a row cannot be serialized.
pub fn page_response(
    page: DatasetPage,
    boundaries: impl IntoIterator<Item = (String, ColumnBoundary)>,
) -> Result<proto::GetDatasetPageResponse> {
    let rows = page
        .rows
        .iter()
        .map(|row| {
            serde_json::to_string(row)
                .map(|json| proto::DatasetRow { json })
                .map_err(|e| Error::Store(terrastream::Error::Json(e)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(proto::GetDatasetPageResponse {
        rows,
        total_rows: i64::try_from(page.info.total_rows).unwrap_or(i64::MAX),
        total_pages: wire_count(page.total_pages),
        page: wire_count(page.page),
        generation: page.info.generation,
        found: true,
        boundaries: boundaries.into_iter().map(|(k, b)| (k, b.into())).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(sw: (f64, f64), ne: (f64, f64)) -> proto::BoundingBox {
        proto::BoundingBox {
            northeast: Some(proto::Coordinate {
                latitude: ne.0,
                longitude: ne.1,
                altitude: 0.0,
            }),
            southwest: Some(proto::Coordinate {
                latitude: sw.0,
                longitude: sw.1,
                altitude: 0.0,
            }),
        }
    }

    #[test]
    fn batch_defaults() {
        let req = proto::GetBatchDataRequest {
            bounds: Some(bbox((37.0, -123.0), (38.0, -122.0))),
            data_types: vec![],
            max_points: 0,
            resolution: -4,
        };
        let p = BatchParams::from_request(&req, 10_000).unwrap();
        assert_eq!(p.data_types, vec!["elevation"]);
        assert_eq!(p.max_points, DEFAULT_MAX_POINTS);
        assert_eq!(p.resolution, DEFAULT_RESOLUTION);
        assert_eq!(p.kind(), FieldKind::Elevation);
        assert_eq!(p.bounds.lat_min(), 37.0);
        assert_eq!(p.bounds.lng_max(), -122.0);
    }

    #[test]
    fn batch_rejects_oversized_and_inverted() {
        let req = proto::GetBatchDataRequest {
            bounds: Some(bbox((0.0, 0.0), (1.0, 1.0))),
            data_types: vec!["noise".into()],
            max_points: 2_000,
            resolution: 10,
        };
        assert!(matches!(
            BatchParams::from_request(&req, 1_999),
            Err(Error::InvalidRequest { .. })
        ));
        let inverted = proto::GetBatchDataRequest {
            bounds: Some(bbox((1.0, 0.0), (0.0, 1.0))),
            ..req
        };
        assert!(matches!(
            BatchParams::from_request(&inverted, 10_000),
            Err(Error::Generation(_))
        ));
    }

    #[test]
    fn batch_rejects_resolution_beyond_the_point_limit() {
        let req = proto::GetBatchDataRequest {
            bounds: Some(bbox((0.0, 0.0), (1.0, 1.0))),
            data_types: vec!["noise".into()],
            max_points: 1,
            resolution: i32::MAX,
        };
        assert!(matches!(
            BatchParams::from_request(&req, 10_000_000),
            Err(Error::InvalidRequest { .. })
        ));

        let at_limit = proto::GetBatchDataRequest {
            resolution: 3_163,
            ..req.clone()
        };
        assert_eq!(BatchParams::from_request(&at_limit, 10_000_000).unwrap().resolution, 3_163);
        let past_limit = proto::GetBatchDataRequest {
            resolution: 3_164,
            ..req
        };
        assert!(BatchParams::from_request(&past_limit, 10_000_000).is_err());
    }

    #[test]
    fn resolution_limit_covers_the_point_limit() {
        assert_eq!(max_resolution(10_000_000), 3_163);
        assert_eq!(max_resolution(10_000), 100);
        assert_eq!(max_resolution(10_001), 101);
        // Small limits still admit the default resolution.
        assert_eq!(max_resolution(100), DEFAULT_RESOLUTION);
    }

    #[test]
    fn missing_bounds_read_as_origin() {
        let b = bounds_from_proto(None).unwrap();
        assert!(b.is_degenerate());
    }

    #[test]
    fn page_defaults() {
        let req = proto::GetDatasetPageRequest {
            dataset_id: "d".into(),
            page: 0,
            page_size: 0,
            boundary_columns: vec![],
        };
        let p = PageParams::from_request(&req).unwrap();
        assert_eq!((p.page, p.page_size), (1, DEFAULT_PAGE_SIZE));
        let empty = proto::GetDatasetPageRequest {
            dataset_id: String::new(),
            ..req
        };
        assert!(PageParams::from_request(&empty).is_err());
    }

    #[test]
    fn columnar_conversion_keeps_auxiliary_columns() {
        let mut block = ColumnarBlock {
            id: vec!["point_0".into()],
            x: vec![1.0],
            y: vec![2.0],
            z: vec![3.0],
            id_value: vec!["noise_sensor_0".into()],
            ..Default::default()
        };
        block.additional_data.insert("elevation".into(), vec![120.0]);
        let wire: proto::ColumnarData = block.into();
        assert_eq!(wire.additional_data["elevation"].values, vec![120.0]);
        assert_eq!(wire.x, vec![1.0]);
    }
}

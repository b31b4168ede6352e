use super::*;
use crate::{ChunkedEncoder, FixedClock};
use rand::{SeedableRng, rngs::StdRng};

const NOW_MS: i64 = 1_700_000_000_123;

fn pipeline() -> SurfacePipeline<FixedClock> {
    SurfacePipeline::new(FixedClock(NOW_MS))
}

fn bounds() -> GeoBounds {
    GeoBounds::new(37.0, 38.0, -123.0, -122.0).unwrap()
}

fn request(types: &[&str], max_points: usize, resolution: usize) -> GenerationRequest {
    GenerationRequest::new(bounds(), types, max_points, resolution).unwrap()
}

#[test]
fn resolves_primary_and_auxiliary_kinds() {
    let r = request(&["pressure", "bogus", "noise", "pressure"], 10, 5);
    assert_eq!(r.kind, FieldKind::Pressure);
    assert_eq!(
        r.auxiliary,
        vec![FieldKind::Noise, FieldKind::Elevation, FieldKind::Temperature]
    );

    let r = request(&[], 10, 5);
    assert_eq!(r.kind, FieldKind::Elevation);
    assert_eq!(r.auxiliary, vec![FieldKind::Temperature]);

    let r = request(&["unknown"], 10, 5);
    assert_eq!(r.kind, FieldKind::Elevation);
    assert_eq!(r.auxiliary, vec![FieldKind::Elevation, FieldKind::Temperature]);

    let r = request(&["elevation", "temperature"], 10, 5);
    assert_eq!(r.auxiliary, vec![FieldKind::Temperature]);

    let r = request(&["noise", "elevation"], 10, 5);
    assert_eq!(r.auxiliary, vec![FieldKind::Elevation, FieldKind::Temperature]);
}

#[test]
fn unknown_primary_still_gets_elevation_column() {
    let mut rng = StdRng::seed_from_u64(9);
    let r = request(&["unknown"], 12, 4);
    let batch = pipeline().generate(&r, Auxiliary::Include, &mut rng);
    let block = ColumnarProjection.project_all(&batch);
    let keys: Vec<_> = block.additional_data.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["elevation", "temperature"]);
    assert_eq!(block.additional_data["elevation"].len(), 12);
    assert_eq!(block.id_value[0], "elevation_sensor_0");
}

#[test]
fn emits_min_of_budget_and_cells() {
    let mut rng = StdRng::seed_from_u64(1);
    for (points, res, expected) in [(100, 20, 100), (1_000, 20, 1_000), (50, 5, 25), (1, 1, 1)] {
        let r = request(&["sine_wave"], points, res);
        let batch = pipeline().generate(&r, Auxiliary::Skip, &mut rng);
        assert_eq!(batch.len(), expected, "points={points} res={res}");
        assert_eq!(batch.dropped, 0);
    }
}

#[test]
fn samples_walk_latitude_fastest() {
    let mut rng = StdRng::seed_from_u64(2);
    let r = request(&["elevation"], 9, 3);
    let batch = pipeline().generate(&r, Auxiliary::Skip, &mut rng);

    let first = batch.samples[0];
    let second = batch.samples[1];
    let fourth = batch.samples[3];
    assert_eq!((first.row, first.col), (0, 0));
    assert_eq!((first.latitude, first.longitude), (37.0, -123.0));
    assert_eq!((second.latitude, second.longitude), (37.5, -123.0));
    assert_eq!((fourth.latitude, fourth.longitude), (37.0, -122.5));
    for (k, s) in batch.samples.iter().enumerate() {
        assert_eq!(s.index, k);
        assert!(bounds().contains(s.latitude, s.longitude));
    }
}

#[test]
fn row_ids_and_metadata_follow_budget() {
    let mut rng = StdRng::seed_from_u64(3);
    let r = request(&["temperature"], 4, 2);
    let batch = pipeline().generate(&r, Auxiliary::Skip, &mut rng);
    let rows = RowProjection.project_all(&batch);
    assert_eq!(rows.len(), 4);

    let p = &rows[1];
    assert_eq!(p.id, "temperature_0_1_1700000000");
    assert_eq!(p.unit, "temperature");
    assert_eq!(p.altitude, 0.0);
    assert_eq!(p.timestamp_ms, NOW_MS);
    assert_eq!(p.metadata["generation_method"], "temperature");
    assert_eq!(p.metadata["grid_position"], "0,1");
    assert_eq!(p.metadata["resolution"], "2");
    assert_eq!(p.metadata["batch_generated"], "true");

    let big = request(&["noise"], COMPACT_METADATA_THRESHOLD + 1, 20);
    assert!(big.is_compact());
    let batch = pipeline().generate(&big, Auxiliary::Skip, &mut rng);
    let rows = RowProjection.project(&batch, 0..3);
    assert_eq!(rows[2].id, "2");
    assert_eq!(rows[2].metadata.len(), 1);
}

#[test]
fn shapes_agree_on_the_same_batch() {
    let mut rng = StdRng::seed_from_u64(4);
    let r = request(&["pressure", "noise"], 500, 20);
    let batch = pipeline().generate(&r, Auxiliary::Include, &mut rng);

    let rows = RowProjection.project_all(&batch);
    let optimized = OptimizedProjection.project_all(&batch);
    let columnar = ColumnarProjection.project_all(&batch);

    assert_eq!(rows.len(), 500);
    assert_eq!(optimized.len(), 500);
    assert_eq!(columnar.len(), 500);
    assert!(columnar.is_aligned());

    for k in 0..500 {
        assert_eq!(rows[k].latitude, f64::from(optimized[k].latitude));
        assert_eq!(rows[k].longitude, f64::from(optimized[k].longitude));
        assert_eq!(rows[k].value, f64::from(optimized[k].value));
        assert_eq!(columnar.y[k] as f32, optimized[k].latitude);
        assert_eq!(columnar.x[k] as f32, optimized[k].longitude);
        assert_eq!(columnar.z[k] as f32, optimized[k].value);
        assert_eq!(rows[k].id, optimized[k].id);
    }
}

#[test]
fn columnar_carries_auxiliary_columns() {
    let mut rng = StdRng::seed_from_u64(5);
    let r = request(&["sine_wave", "pressure"], 30, 10);
    let batch = pipeline().generate(&r, Auxiliary::Include, &mut rng);
    let block = ColumnarProjection.project(&batch, 10..20);

    assert_eq!(block.len(), 10);
    assert!(block.is_aligned());
    assert_eq!(block.id[0], "point_10");
    assert_eq!(block.id_value[3], "sine_wave_sensor_3");
    let keys: Vec<_> = block.additional_data.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["elevation", "pressure", "temperature"]);
    assert!(block.additional_data["elevation"].iter().all(|v| *v >= 100.0));
}

#[test]
fn single_precision_overflow_drops_from_every_shape() {
    let mut rng = StdRng::seed_from_u64(8);
    // Latitudes past f32::MAX survive in f64 but not on the optimized wire.
    let huge = GeoBounds::new(0.0, 1e39, 0.0, 1.0).unwrap();
    let r = GenerationRequest::new(huge, &["pressure", "noise"], 100, 10).unwrap();
    let batch = pipeline().generate(&r, Auxiliary::Include, &mut rng);

    assert!(batch.dropped > 0);
    assert_eq!(batch.len() + batch.dropped, 100);
    for (_, column) in &batch.auxiliary {
        assert_eq!(column.len(), batch.len());
    }

    let rows = RowProjection.project_all(&batch);
    let optimized = OptimizedProjection.project_all(&batch);
    let columnar = ColumnarProjection.project_all(&batch);
    assert_eq!(rows.len(), batch.len());
    assert_eq!(optimized.len(), batch.len());
    assert_eq!(columnar.len(), batch.len());
    assert!(columnar.is_aligned());
    assert!(optimized.iter().all(|p| p.latitude.is_finite() && p.value.is_finite()));

    let encoder = ChunkedEncoder::new(16);
    let chunks: Vec<_> = encoder.encode(&batch, &ColumnarProjection, "m").collect();
    let total: usize = chunks.iter().map(|c| c.points_in_chunk).sum();
    assert_eq!(total, batch.len());
    assert!(chunks.iter().all(|c| c.payload.is_aligned()));
}

#[test]
fn row_batches_skip_auxiliary_work() {
    let mut rng = StdRng::seed_from_u64(6);
    let r = request(&["elevation", "pressure"], 30, 10);
    let batch = pipeline().generate(&r, RowProjection.auxiliary(), &mut rng);
    assert!(batch.auxiliary.is_empty());
}

#[test]
fn method_labels() {
    assert_eq!(RowProjection.method_label(FieldKind::Noise), "synthetic_noise_batch");
    assert_eq!(
        OptimizedProjection.method_label(FieldKind::Pressure),
        "synthetic_pressure_batch_optimized"
    );
    assert_eq!(
        ColumnarProjection.method_label(FieldKind::SineWave),
        "synthetic_columnar_sine_wave"
    );
}

#[test]
fn degenerate_bounds_still_produce_finite_points() {
    let mut rng = StdRng::seed_from_u64(7);
    let flat = GeoBounds::new(10.0, 10.0, 20.0, 20.0).unwrap();
    let r = GenerationRequest::new(flat, &["pressure"], 16, 4).unwrap();
    let batch = pipeline().generate(&r, Auxiliary::Include, &mut rng);
    assert_eq!(batch.len(), 16);
    assert!(batch.samples.iter().all(|s| s.value.is_finite()));
}

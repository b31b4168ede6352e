use super::*;
use crate::{FixedClock, GeoBounds, GeoGrid};
use rand::{SeedableRng, rngs::StdRng};

fn bounds() -> GeoBounds {
    GeoBounds::new(37.0, 38.0, -123.0, -122.0).unwrap()
}

#[test]
fn resolves_known_keys_and_falls_back_to_elevation() {
    for kind in FieldKind::ALL {
        assert_eq!(FieldKind::resolve(kind.as_str()), kind);
        assert_eq!(kind.as_str().parse::<FieldKind>().unwrap(), kind);
    }
    assert_eq!(FieldKind::resolve("humidity"), FieldKind::Elevation);
    assert_eq!(FieldKind::resolve(""), FieldKind::Elevation);
    assert!("Elevation".parse::<FieldKind>().is_err());
}

#[test]
fn elevation_is_floored_at_one_hundred() {
    let generator = SurfaceGenerator::new(0.0);
    let mut rng = StdRng::seed_from_u64(7);
    let grid = GeoGrid::new(&bounds(), 40);
    let values = generator.sample_grid(FieldKind::Elevation, &bounds(), &grid, usize::MAX, &mut rng);
    assert_eq!(values.len(), 1600);
    assert!(values.iter().all(|v| *v >= 100.0));
    // The base terms peak near 850 m; noise rarely adds more than 4 sigma.
    assert!(values.iter().all(|v| *v < 1_200.0));
}

#[test]
fn temperature_follows_latitude_gradient() {
    let generator = SurfaceGenerator::new(0.0);
    let mut rng = StdRng::seed_from_u64(11);
    let b = bounds();
    let south: f64 = (0..500)
        .map(|_| generator.sample(FieldKind::Temperature, &b, 37.0, -122.5, &mut rng))
        .sum::<f64>()
        / 500.0;
    let north: f64 = (0..500)
        .map(|_| generator.sample(FieldKind::Temperature, &b, 38.0, -122.5, &mut rng))
        .sum::<f64>()
        / 500.0;
    // 25 at the southern edge, -5 at the northern edge, sigma 3.
    assert!((south - 25.0).abs() < 1.0, "south mean {south}");
    assert!((north + 5.0).abs() < 1.0, "north mean {north}");
}

#[test]
fn temperature_includes_diurnal_term() {
    let b = bounds();
    let mean_at = |day_fraction: f64| {
        let generator = SurfaceGenerator::new(day_fraction);
        let mut rng = StdRng::seed_from_u64(3);
        (0..2_000)
            .map(|_| generator.sample(FieldKind::Temperature, &b, 37.0, -123.0, &mut rng))
            .sum::<f64>()
            / 2_000.0
    };
    // sin(pi/2) = 1 at a quarter day adds 5 degrees.
    assert!((mean_at(0.25) - mean_at(0.0) - 5.0).abs() < 0.5);
}

#[test]
fn pressure_centres_on_standard_atmosphere() {
    let generator = SurfaceGenerator::at(&FixedClock(0));
    let mut rng = StdRng::seed_from_u64(5);
    let grid = GeoGrid::new(&bounds(), 30);
    let values = generator.sample_grid(FieldKind::Pressure, &bounds(), &grid, usize::MAX, &mut rng);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    assert!((mean - 1013.25).abs() < 2.0, "mean {mean}");
}

#[test]
fn noise_stays_in_unit_percent_range() {
    let generator = SurfaceGenerator::new(0.0);
    let mut rng = StdRng::seed_from_u64(9);
    let grid = GeoGrid::new(&bounds(), 50);
    let values = generator.sample_grid(FieldKind::Noise, &bounds(), &grid, usize::MAX, &mut rng);
    assert!(values.iter().all(|v| (0.0..100.0).contains(v)));
}

#[test]
fn sine_wave_is_deterministic() {
    let generator = SurfaceGenerator::new(0.0);
    let b = bounds();
    let mut a = StdRng::seed_from_u64(1);
    let mut c = StdRng::seed_from_u64(2);
    // Corner: sin(0) * sin(0) == 0.
    assert_eq!(generator.sample(FieldKind::SineWave, &b, 37.0, -123.0, &mut a), 50.0);
    let x = generator.sample(FieldKind::SineWave, &b, 37.125, -122.875, &mut a);
    let y = generator.sample(FieldKind::SineWave, &b, 37.125, -122.875, &mut c);
    assert_eq!(x, y);
    // sin(pi/2) * sin(pi/2) == 1 at the eighth points.
    assert!((x - 80.0).abs() < 1e-9);
}

#[test]
fn same_seed_reproduces_noisy_fields() {
    let generator = SurfaceGenerator::new(0.3);
    let grid = GeoGrid::new(&bounds(), 10);
    for kind in FieldKind::ALL {
        let a = generator.generate(&bounds(), kind, &grid.lat, &grid.lng, &mut StdRng::seed_from_u64(42));
        let b = generator.generate(&bounds(), kind, &grid.lat, &grid.lng, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b, "{kind}");
    }
}

#[test]
fn generate_matches_flattened_sampling_order() {
    let generator = SurfaceGenerator::new(0.0);
    let grid = GeoGrid::new(&bounds(), 6);
    let field = generator.generate(
        &bounds(),
        FieldKind::SineWave,
        &grid.lat,
        &grid.lng,
        &mut StdRng::seed_from_u64(0),
    );
    let flat = generator.sample_grid(
        FieldKind::SineWave,
        &bounds(),
        &grid,
        usize::MAX,
        &mut StdRng::seed_from_u64(0),
    );
    assert_eq!((field.rows, field.cols), (6, 6));
    assert_eq!(field.values, flat);
    assert_eq!(field.get(1, 2), Some(flat[8]));
    assert_eq!(field.get(6, 0), None);
}

#[test]
fn zero_span_bounds_produce_finite_fields() {
    let generator = SurfaceGenerator::new(0.0);
    let flat = GeoBounds::new(10.0, 10.0, 20.0, 20.0).unwrap();
    let grid = GeoGrid::new(&flat, 4);
    let mut rng = StdRng::seed_from_u64(0);
    for kind in FieldKind::ALL {
        let field = generator.generate(&flat, kind, &grid.lat, &grid.lng, &mut rng);
        assert!(field.values.iter().all(|v| v.is_finite()), "{kind}");
    }
    let sine = generator.generate(&flat, FieldKind::SineWave, &grid.lat, &grid.lng, &mut rng);
    assert!(sine.values.iter().all(|v| *v == 50.0));
}

use super::FieldKind;
use crate::{GeoBounds, GeoGrid, WallClock};
use core::f64::consts::PI;
use rand::Rng;
use rand_distr::{Distribution, Normal};

const ELEVATION_NOISE_SIGMA: f64 = 50.0;
const TEMPERATURE_NOISE_SIGMA: f64 = 3.0;
const PRESSURE_NOISE_SIGMA: f64 = 5.0;
const STANDARD_PRESSURE_HPA: f64 = 1013.25;

/// A dense 2D field sampled over a [`GeoGrid`].
///
/// `values[row * cols + col]` holds the sample at longitude `row`, latitude
/// `col`.
#[derive(Debug, Clone, PartialEq)]
pub struct Field2D {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f64>,
}

impl Field2D {
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows && col < self.cols).then(|| self.values[row * self.cols + col])
    }
}

/// Samples synthetic surfaces.
///
/// The only state is the diurnal phase used by [`FieldKind::Temperature`],
/// captured once so that every point of a single request shares it.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceGenerator {
    day_fraction: f64,
}

impl SurfaceGenerator {
    pub const fn new(day_fraction: f64) -> Self {
        Self { day_fraction }
    }

    /// Captures the diurnal phase from `clock`.
    pub fn at<C: WallClock + ?Sized>(clock: &C) -> Self {
        Self::new(clock.day_fraction())
    }

    pub const fn day_fraction(&self) -> f64 {
        self.day_fraction
    }

    /// Samples `kind` at a single coordinate inside `bounds`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        kind: FieldKind,
        bounds: &GeoBounds,
        latitude: f64,
        longitude: f64,
        rng: &mut R,
    ) -> f64 {
        let lat = bounds.normalize_lat(latitude);
        let lng = bounds.normalize_lng(longitude);
        match kind {
            FieldKind::Elevation => {
                let e = 500.0 * (lat * 2.0 * PI).sin() * (lng * 2.0 * PI).cos()
                    + 200.0 * (lat * 4.0 * PI).sin()
                    + 150.0 * (lng * 3.0 * PI).cos()
                    + gaussian(rng, ELEVATION_NOISE_SIGMA);
                e.max(0.0) + 100.0
            }
            FieldKind::Temperature => {
                25.0 - lat * 30.0
                    + 5.0 * (self.day_fraction * 2.0 * PI).sin()
                    + gaussian(rng, TEMPERATURE_NOISE_SIGMA)
            }
            FieldKind::Pressure => {
                STANDARD_PRESSURE_HPA
                    + 10.0 * (lat * 3.0 * PI).sin() * (lng * 2.0 * PI).cos()
                    + gaussian(rng, PRESSURE_NOISE_SIGMA)
            }
            FieldKind::Noise => rng.random_range(0.0..100.0),
            FieldKind::SineWave => 50.0 + 30.0 * (lat * 4.0 * PI).sin() * (lng * 4.0 * PI).sin(),
        }
    }

    /// Samples the first `limit` cells of `grid` in flattened order.
    pub fn sample_grid<R: Rng + ?Sized>(
        &self,
        kind: FieldKind,
        bounds: &GeoBounds,
        grid: &GeoGrid,
        limit: usize,
        rng: &mut R,
    ) -> Vec<f64> {
        let n = limit.min(grid.len());
        (0..n)
            .map(|k| {
                let (_, _, lat, lng) = grid.locate(k);
                self.sample(kind, bounds, lat, lng, rng)
            })
            .collect()
    }

    /// Samples `kind` at every `(lng_grid[row], lat_grid[col])` pair.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        bounds: &GeoBounds,
        kind: FieldKind,
        lat_grid: &[f64],
        lng_grid: &[f64],
        rng: &mut R,
    ) -> Field2D {
        let mut values = Vec::with_capacity(lat_grid.len() * lng_grid.len());
        for &lng in lng_grid {
            for &lat in lat_grid {
                values.push(self.sample(kind, bounds, lat, lng, rng));
            }
        }
        Field2D {
            rows: lng_grid.len(),
            cols: lat_grid.len(),
            values,
        }
    }
}

fn gaussian<R: Rng + ?Sized>(rng: &mut R, sigma: f64) -> f64 {
    // Only fails for a negative or non-finite sigma, and ours are constants.
    Normal::new(0.0, sigma).map_or(0.0, |n| n.sample(rng))
}

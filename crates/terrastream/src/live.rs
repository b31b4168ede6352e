//! Rate-limited sampling of single points at random coordinates.

use crate::{DataPoint, FieldKind, GeoBounds, SurfaceGenerator, WallClock};
use rand::Rng;
use std::collections::BTreeMap;
use std::time::Duration;

/// Emission rate used when a caller asks for zero or fewer points per second.
pub const DEFAULT_POINTS_PER_SECOND: u32 = 5;

/// Emits one [`DataPoint`] per call at a uniformly random location.
///
/// The sampler owns no timer; callers sleep [`LiveSampler::interval`]
/// between points and decide when the window is over.
#[derive(Debug, Clone)]
pub struct LiveSampler {
    bounds: GeoBounds,
    kind: FieldKind,
    points_per_second: u32,
    emitted: u64,
}

impl LiveSampler {
    /// `requested_rate` of zero or less falls back to
    /// [`DEFAULT_POINTS_PER_SECOND`]; anything above `max_rate` is clamped.
    pub fn new(bounds: GeoBounds, kind: FieldKind, requested_rate: i32, max_rate: u32) -> Self {
        let rate = u32::try_from(requested_rate)
            .ok()
            .filter(|r| *r > 0)
            .unwrap_or(DEFAULT_POINTS_PER_SECOND);
        Self {
            bounds,
            kind,
            points_per_second: rate.min(max_rate.max(1)),
            emitted: 0,
        }
    }

    pub const fn kind(&self) -> FieldKind {
        self.kind
    }

    pub const fn points_per_second(&self) -> u32 {
        self.points_per_second
    }

    pub const fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.points_per_second))
    }

    /// Samples the next point.
    ///
    /// The diurnal phase is read from `clock` on every call so long streams
    /// follow the time of day.
    pub fn next_point<C, R>(&mut self, clock: &C, rng: &mut R) -> DataPoint
    where
        C: WallClock + ?Sized,
        R: Rng + ?Sized,
    {
        let b = &self.bounds;
        let latitude = uniform(rng, b.lat_min(), b.lat_max());
        let longitude = uniform(rng, b.lng_min(), b.lng_max());
        let altitude = rng.random_range(0.0..100.0);
        let value = SurfaceGenerator::at(clock).sample(self.kind, b, latitude, longitude, rng);

        let n = self.emitted;
        self.emitted += 1;

        let kind = self.kind.as_str();
        let metadata = BTreeMap::from([
            ("generation_method".to_string(), kind.to_string()),
            ("stream_point".to_string(), n.to_string()),
            ("streaming".to_string(), "true".to_string()),
        ]);

        DataPoint {
            id: format!("{kind}_stream_{n}_{}", clock.now_secs()),
            latitude: f64::from(latitude as f32),
            longitude: f64::from(longitude as f32),
            altitude: f64::from(altitude as f32),
            value: f64::from(value as f32),
            unit: kind.to_string(),
            timestamp_ms: clock.now_millis(),
            metadata,
        }
    }
}

// `random_range` panics on an empty range, which a degenerate box produces.
fn uniform<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if hi > lo { rng.random_range(lo..=hi) } else { lo }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedClock;
    use rand::{SeedableRng, rngs::StdRng};

    fn bounds() -> GeoBounds {
        GeoBounds::new(40.0, 41.0, -75.0, -74.0).unwrap()
    }

    #[test]
    fn rate_defaults_and_clamps() {
        assert_eq!(LiveSampler::new(bounds(), FieldKind::Noise, 0, 1_000).points_per_second(), 5);
        assert_eq!(LiveSampler::new(bounds(), FieldKind::Noise, -3, 1_000).points_per_second(), 5);
        assert_eq!(LiveSampler::new(bounds(), FieldKind::Noise, 20, 1_000).points_per_second(), 20);
        assert_eq!(LiveSampler::new(bounds(), FieldKind::Noise, 5_000, 1_000).points_per_second(), 1_000);
        let s = LiveSampler::new(bounds(), FieldKind::Noise, 4, 1_000);
        assert_eq!(s.interval(), Duration::from_millis(250));
    }

    #[test]
    fn points_are_numbered_and_inside_bounds() {
        let clock = FixedClock(1_700_000_000_500);
        let mut rng = StdRng::seed_from_u64(11);
        let mut sampler = LiveSampler::new(bounds(), FieldKind::Temperature, 10, 1_000);

        for n in 0..50u64 {
            let p = sampler.next_point(&clock, &mut rng);
            assert_eq!(p.id, format!("temperature_stream_{n}_1700000000"));
            assert_eq!(p.metadata["stream_point"], n.to_string());
            assert_eq!(p.metadata["streaming"], "true");
            assert_eq!(p.metadata["generation_method"], "temperature");
            assert_eq!(p.unit, "temperature");
            assert_eq!(p.timestamp_ms, 1_700_000_000_500);
            assert!((40.0..=41.0).contains(&p.latitude));
            assert!((-75.0..=-74.0).contains(&p.longitude));
            assert!((0.0..=100.0).contains(&p.altitude));
            assert!(p.value.is_finite());
        }
        assert_eq!(sampler.emitted(), 50);
    }

    #[test]
    fn degenerate_bounds_pin_coordinates() {
        let flat = GeoBounds::new(12.0, 12.0, 34.0, 34.0).unwrap();
        let mut sampler = LiveSampler::new(flat, FieldKind::SineWave, 1, 10);
        let p = sampler.next_point(&FixedClock(0), &mut StdRng::seed_from_u64(1));
        assert_eq!((p.latitude, p.longitude), (12.0, 34.0));
    }
}

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Axis-aligned latitude/longitude rectangle delimiting a query region.
///
/// Constructed once per request and never mutated. Both spans are guaranteed
/// to be non-negative and every corner finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    lat_min: f64,
    lat_max: f64,
    lng_min: f64,
    lng_max: f64,
}

impl GeoBounds {
    /// Validates and builds a bounding box.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] if any corner is NaN or infinite, or if
    /// a maximum is smaller than its minimum.
    pub fn new(lat_min: f64, lat_max: f64, lng_min: f64, lng_max: f64) -> Result<Self> {
        for (name, v) in [
            ("lat_min", lat_min),
            ("lat_max", lat_max),
            ("lng_min", lng_min),
            ("lng_max", lng_max),
        ] {
            if !v.is_finite() {
                return Err(Error::InvalidBounds {
                    reason: format!("{name} must be finite, got {v}"),
                });
            }
        }
        if lat_max < lat_min {
            return Err(Error::InvalidBounds {
                reason: format!("lat_max ({lat_max}) is below lat_min ({lat_min})"),
            });
        }
        if lng_max < lng_min {
            return Err(Error::InvalidBounds {
                reason: format!("lng_max ({lng_max}) is below lng_min ({lng_min})"),
            });
        }
        Ok(Self {
            lat_min,
            lat_max,
            lng_min,
            lng_max,
        })
    }

    pub const fn lat_min(&self) -> f64 {
        self.lat_min
    }

    pub const fn lat_max(&self) -> f64 {
        self.lat_max
    }

    pub const fn lng_min(&self) -> f64 {
        self.lng_min
    }

    pub const fn lng_max(&self) -> f64 {
        self.lng_max
    }

    pub fn lat_span(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    pub fn lng_span(&self) -> f64 {
        self.lng_max - self.lng_min
    }

    /// True when either axis has zero width.
    pub fn is_degenerate(&self) -> bool {
        self.lat_span() == 0.0 || self.lng_span() == 0.0
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.lat_min
            && latitude <= self.lat_max
            && longitude >= self.lng_min
            && longitude <= self.lng_max
    }

    /// Maps a latitude onto `[0, 1]` across the box.
    ///
    /// A zero-width latitude axis normalises against a span of 1, so every
    /// point on it maps to 0 instead of NaN.
    pub fn normalize_lat(&self, latitude: f64) -> f64 {
        (latitude - self.lat_min) / guarded_span(self.lat_span())
    }

    /// Longitude counterpart of [`GeoBounds::normalize_lat`].
    pub fn normalize_lng(&self, longitude: f64) -> f64 {
        (longitude - self.lng_min) / guarded_span(self.lng_span())
    }
}

// Also catches spans that overflowed to infinity for huge boxes.
fn guarded_span(span: f64) -> f64 {
    if span > 0.0 && span.is_finite() {
        span
    } else {
        1.0
    }
}

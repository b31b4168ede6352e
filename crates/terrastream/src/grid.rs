use crate::{Error, GeoBounds, Result};

/// Grid sizing derived from a requested point budget and resolution.
///
/// When the budget fits inside `resolution²` the requested resolution is
/// kept; otherwise the grid grows to the smallest square that covers the
/// budget, never shrinking below the requested resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpec {
    requested_point_count: usize,
    requested_resolution: usize,
    actual_resolution: usize,
}

impl GridSpec {
    /// # Errors
    ///
    /// Returns [`Error::InvalidGrid`] if either argument is zero.
    pub fn new(requested_point_count: usize, requested_resolution: usize) -> Result<Self> {
        if requested_point_count == 0 {
            return Err(Error::InvalidGrid {
                reason: "requested point count must be greater than 0".to_string(),
            });
        }
        if requested_resolution == 0 {
            return Err(Error::InvalidGrid {
                reason: "resolution must be greater than 0".to_string(),
            });
        }

        let fits = requested_resolution
            .checked_mul(requested_resolution)
            .is_none_or(|cells| requested_point_count <= cells);
        let actual_resolution = if fits {
            requested_resolution
        } else {
            requested_resolution.max(ceil_sqrt(requested_point_count))
        };

        Ok(Self {
            requested_point_count,
            requested_resolution,
            actual_resolution,
        })
    }

    pub const fn requested_point_count(&self) -> usize {
        self.requested_point_count
    }

    pub const fn requested_resolution(&self) -> usize {
        self.requested_resolution
    }

    pub const fn actual_resolution(&self) -> usize {
        self.actual_resolution
    }

    /// Total cells in the `actual_resolution × actual_resolution` grid.
    pub fn cell_count(&self) -> usize {
        self.actual_resolution.saturating_mul(self.actual_resolution)
    }

    /// Number of points a generation run emits: `min(requested, cells)`.
    pub fn point_count(&self) -> usize {
        self.requested_point_count.min(self.cell_count())
    }
}

/// Smallest `r` such that `r * r >= n`.
fn ceil_sqrt(n: usize) -> usize {
    let mut r = (n as f64).sqrt() as usize;
    while r.saturating_mul(r) < n {
        r += 1;
    }
    while r > 0 && (r - 1).saturating_mul(r - 1) >= n {
        r -= 1;
    }
    r
}

/// `n` evenly spaced samples from `start` to `end`, both inclusive.
///
/// A single sample returns `[start]`.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    linspace_prefix(start, end, n, n)
}

/// The first `take` samples of `linspace(start, end, n)`.
fn linspace_prefix(start: f64, end: f64, n: usize, take: usize) -> Vec<f64> {
    let take = take.min(n);
    if n == 1 {
        return vec![start; take];
    }
    let step = (end - start) / (n.saturating_sub(1)) as f64;
    (0..take)
        .map(|i| {
            // Pin the last sample so float drift never leaves the box.
            if i == n - 1 { end } else { start + step * i as f64 }
        })
        .collect()
}

/// Latitude and longitude axes subdividing a bounding box.
///
/// Axes may be truncated to the cells a request actually samples; the
/// spacing always follows the full `resolution`.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoGrid {
    pub lat: Vec<f64>,
    pub lng: Vec<f64>,
    resolution: usize,
}

impl GeoGrid {
    /// The full `resolution × resolution` grid.
    pub fn new(bounds: &GeoBounds, resolution: usize) -> Self {
        Self::covering(bounds, resolution, resolution.saturating_mul(resolution))
    }

    /// Only the axis samples needed to walk the first `points` cells.
    ///
    /// Memory is bounded by `points`, whatever the resolution.
    pub fn covering(bounds: &GeoBounds, resolution: usize, points: usize) -> Self {
        let lat_len = resolution.min(points);
        let lng_len = if resolution == 0 { 0 } else { points.div_ceil(resolution).min(resolution) };
        Self {
            lat: linspace_prefix(bounds.lat_min(), bounds.lat_max(), resolution, lat_len),
            lng: linspace_prefix(bounds.lng_min(), bounds.lng_max(), resolution, lng_len),
            resolution,
        }
    }

    pub const fn resolution(&self) -> usize {
        self.resolution
    }

    /// Cells addressable through [`GeoGrid::locate`].
    pub fn len(&self) -> usize {
        self.lat.len() * self.lng.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves a flattened index to `(row, col, latitude, longitude)`.
    ///
    /// Rows walk longitude and columns walk latitude, so consecutive indices
    /// move north first.
    pub fn locate(&self, index: usize) -> (usize, usize, f64, f64) {
        let cols = self.resolution;
        let row = index / cols;
        let col = index % cols;
        (row, col, self.lat[col], self.lng[row])
    }
}

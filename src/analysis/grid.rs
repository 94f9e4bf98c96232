/// Nearest-cell lookup on an irregular lat/lon grid.
///
/// Distance is the Chebyshev metric in degrees: the larger of the
/// absolute latitude and longitude differences. At city scale the HRRR
/// grid is close to regular, so this picks the same cell a geodesic
/// search would without weighting one axis over the other. There is no
/// interpolation; the value returned is exactly one cell's value.

use crate::model::{AlerterError, GriddedField, QueryPoint};

/// Resolves query points to grid cells, refusing points the grid clearly
/// does not cover.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridResolver {
    /// Largest accepted Chebyshev distance, in degrees.
    pub sanity_bound: f64,
}

impl GridResolver {
    pub fn new(sanity_bound: f64) -> Self {
        Self { sanity_bound }
    }

    /// Index of the cell closest to (`lat`, `lon`) and its distance.
    ///
    /// Ties go to the first minimal cell in row-major order. Cells with
    /// NaN coordinates are skipped.
    pub fn nearest_index(&self, field: &GriddedField, lat: f64, lon: f64) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;

        for (idx, (cell_lat, cell_lon)) in field.lats().iter().zip(field.lons()).enumerate() {
            let distance = chebyshev(*cell_lat, *cell_lon, lat, lon);
            if distance.is_nan() {
                continue;
            }
            match best {
                Some((_, d)) if distance >= d => {}
                _ => best = Some((idx, distance)),
            }
        }

        best
    }

    /// Value of the nearest cell, rounded to two decimals.
    ///
    /// # Errors
    /// `AlerterError::OutOfDomain` when the nearest cell is farther than
    /// the sanity bound, or when no cell has usable coordinates.
    pub fn nearest(&self, field: &GriddedField, lat: f64, lon: f64) -> Result<f64, AlerterError> {
        let out_of_domain = |distance: f64| AlerterError::OutOfDomain {
            lat,
            lon,
            distance,
            limit: self.sanity_bound,
        };

        let (idx, distance) = self
            .nearest_index(field, lat, lon)
            .ok_or_else(|| out_of_domain(f64::INFINITY))?;

        if distance > self.sanity_bound {
            return Err(out_of_domain(distance));
        }

        Ok(round2(field.values()[idx]))
    }

    /// Convenience wrapper for a configured point.
    pub fn resolve(&self, field: &GriddedField, point: &QueryPoint) -> Result<f64, AlerterError> {
        self.nearest(field, point.lat, point.lon)
    }
}

/// Chebyshev distance between two coordinates, in degrees.
pub fn chebyshev(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    let dlat = (lat_a - lat_b).abs();
    let dlon = (lon_a - lon_b).abs();
    if dlat.is_nan() || dlon.is_nan() {
        return f64::NAN;
    }
    dlat.max(dlon)
}

/// Rounds to two decimal places (half away from zero).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

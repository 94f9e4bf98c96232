/// Core data types for the rain alerter.
///
/// This module defines the shared domain model imported by all other modules:
/// gridded fields, query points, hourly readings and the error taxonomy.
/// It contains no I/O.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Forecast hours
// ---------------------------------------------------------------------------

/// A discrete lead time offset from model initialization, in hours.
/// Valid hours run from 1 to the configured horizon inclusive.
pub type ForecastHour = u32;

/// Forecast horizon of the reference deployment (HRRR 36-hour runs).
pub const DEFAULT_HORIZON_HOURS: ForecastHour = 36;

// ---------------------------------------------------------------------------
// Gridded fields
// ---------------------------------------------------------------------------

/// A 2-D field of precipitation values on an irregular lat/lon grid.
///
/// All three arrays are stored row-major and share the same shape. The
/// coordinates are not assumed to be regularly spaced.
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedField {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
    lats: Vec<f64>,
    lons: Vec<f64>,
}

impl GriddedField {
    /// Builds a field, checking that the value and coordinate arrays all
    /// hold `rows * cols` cells.
    pub fn new(
        rows: usize,
        cols: usize,
        values: Vec<f64>,
        lats: Vec<f64>,
        lons: Vec<f64>,
    ) -> Result<Self, AlerterError> {
        let cells = rows
            .checked_mul(cols)
            .ok_or_else(|| AlerterError::Decode(format!("grid {}x{} overflows", rows, cols)))?;

        if cells == 0 {
            return Err(AlerterError::Decode("grid has no cells".to_string()));
        }

        for (name, len) in [("values", values.len()), ("lats", lats.len()), ("lons", lons.len())] {
            if len != cells {
                return Err(AlerterError::Decode(format!(
                    "{} array has {} cells, expected {} ({}x{})",
                    name, len, cells, rows, cols
                )));
            }
        }

        Ok(Self { rows, cols, values, lats, lons })
    }

    /// Returns a field on the same grid carrying new values.
    pub fn with_values(&self, values: Vec<f64>) -> Result<Self, AlerterError> {
        Self::new(self.rows, self.cols, values, self.lats.clone(), self.lons.clone())
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    /// Latitude, longitude and value of the cell at a flat row-major index.
    pub fn cell(&self, index: usize) -> Option<(f64, f64, f64)> {
        Some((*self.lats.get(index)?, *self.lons.get(index)?, *self.values.get(index)?))
    }
}

// ---------------------------------------------------------------------------
// Points and readings
// ---------------------------------------------------------------------------

/// A named location of interest, supplied by configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPoint {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// One point's precipitation for one forecast hour, in display units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyReading {
    pub hour: ForecastHour,
    pub label: String,  // human-readable local time, e.g. "08/03/2019 02:00 PM"
    pub value: f64,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can abort a forecast run. None of them are retried here;
/// a scheduler re-invoking the whole pipeline is the recovery path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlerterError {
    /// The provider was unreachable, answered with an error, returned
    /// malformed framing, or the hour/cumulative request was invalid.
    #[error("Acquisition error for hour {hour}: {reason}")]
    Acquisition { hour: ForecastHour, reason: String },

    /// The upstream payload could not be decoded into a gridded field.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The field could not be converted to display units.
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// The query point is not covered by the fetched grid.
    #[error(
        "Point ({lat}, {lon}) is out of domain: nearest cell is {distance:.3} deg away (limit {limit} deg)"
    )]
    OutOfDomain { lat: f64, lon: f64, distance: f64, limit: f64 },

    /// Malformed or missing area, point or recipient configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The notification boundary could not hand off a message.
    #[error("Notification error: {0}")]
    Notification(String),
}

impl AlerterError {
    /// Stable identifier for log lines and failure summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            AlerterError::Acquisition { .. } => "acquisition",
            AlerterError::Decode(_) => "decode",
            AlerterError::Conversion(_) => "conversion",
            AlerterError::OutOfDomain { .. } => "out_of_domain",
            AlerterError::Configuration(_) => "configuration",
            AlerterError::Notification(_) => "notification",
        }
    }
}

/// A failed run: which area, which hour (if the failure happened during
/// ingestion) and what went wrong.
#[derive(Debug, Clone, PartialEq)]
pub struct RunFailure {
    pub area: String,
    pub hour: Option<ForecastHour>,
    pub error: AlerterError,
}

impl RunFailure {
    pub fn new(area: &str, hour: Option<ForecastHour>, error: AlerterError) -> Self {
        Self { area: area.to_string(), hour, error }
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.hour {
            Some(hour) => write!(f, "{} hour {} [{}]: {}", self.area, hour, self.error.kind(), self.error),
            None => write!(f, "{} [{}]: {}", self.area, self.error.kind(), self.error),
        }
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

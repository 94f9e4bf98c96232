/// Data acquisition for the rain alerter.
///
/// Submodules:
/// - `nomads`  — NOMADS grib-filter URL construction and HTTP source
/// - `grib`    — GRIB message framing and per-hour record isolation
/// - `decoder` — decoder boundary and the wgrib2-backed implementation
/// - `fixtures` (test only) — synthetic GRIB payloads and decoder output

pub mod decoder;
pub mod grib;
pub mod nomads;

#[cfg(test)]
pub(crate) mod fixtures;

use std::sync::Arc;

use crate::config::RunSettings;
use crate::cycle::ModelCycle;
use crate::model::{AlerterError, ForecastHour, GriddedField};

/// Supplies one decoded field per forecast hour.
///
/// `cumulative = false` asks for the single-hour accumulation ending at
/// `hour`; `cumulative = true` asks for the total since initialization and
/// is only valid for the final hour of the horizon. Implementations fail
/// with `AlerterError::Acquisition` for invalid requests, provider errors
/// and timeouts.
pub trait GriddedFieldSource: Send + Sync {
    fn fetch(&self, hour: ForecastHour, cumulative: bool) -> Result<GriddedField, AlerterError>;
}

/// Builds the source for one run once its model cycle is known.
pub type SourceBuilder =
    Box<dyn Fn(&RunSettings, ModelCycle) -> Result<Arc<dyn GriddedFieldSource>, AlerterError>>;

/// Checks an hour/cumulative request against the horizon.
pub fn validate_request(hour: ForecastHour, cumulative: bool, horizon: ForecastHour) -> Result<(), AlerterError> {
    if hour == 0 || hour > horizon {
        return Err(AlerterError::Acquisition {
            hour,
            reason: format!("forecast hour must be within 1..={}", horizon),
        });
    }
    if cumulative && hour != horizon {
        return Err(AlerterError::Acquisition {
            hour,
            reason: format!("cumulative field is only available for hour {}", horizon),
        });
    }
    Ok(())
}

/// Unit conversion for gridded precipitation fields.
///
/// HRRR reports accumulated precipitation in kg/m², numerically equal to
/// millimetres of water. Alerts are shown in inches.

use crate::model::{AlerterError, GriddedField};

/// Millimetres to inches.
pub const MM_TO_IN: f64 = 0.0393701;

/// Scales every cell of `field` by `factor` and returns the converted field
/// together with its maximum.
///
/// NaN cells are carried through unchanged but never take part in the
/// maximum, so one corrupted cell cannot poison the domain maximum.
///
/// # Errors
/// `AlerterError::Conversion` if the factor is not finite or if every cell
/// is NaN.
pub fn convert(field: &GriddedField, factor: f64) -> Result<(GriddedField, f64), AlerterError> {
    if !factor.is_finite() {
        return Err(AlerterError::Conversion(format!(
            "conversion factor must be finite, got {}",
            factor
        )));
    }

    let converted: Vec<f64> = field.values().iter().map(|v| v * factor).collect();

    let max_value = nan_max(&converted).ok_or_else(|| {
        AlerterError::Conversion(format!(
            "field has no numeric cells ({} cells, all NaN)",
            converted.len()
        ))
    })?;

    Ok((field.with_values(converted)?, max_value))
}

/// Maximum over the non-NaN values, or `None` when there are none.
/// Infinities are kept: only NaN marks a cell as missing.
pub fn nan_max(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

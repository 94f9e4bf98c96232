/// Rain severity classification.
///
/// Reduces the per-hour domain maxima and the run total into one alert
/// category. Bands (inches):
///
/// | band     | hourly maximum      |
/// |----------|---------------------|
/// | light    | `[0.05, 0.25)`      |
/// | moderate | `[0.25, 0.5]`       |
/// | heavy    | `> 0.5`             |
///
/// Category precedence is first-match with the run total checked ahead of
/// the hourly counts: a total above 0.5 in is `HeavyTotal` even when no
/// single hour was heavy.

use serde::Serialize;

use crate::analysis::grid::round2;
use crate::model::ForecastHour;

/// Lower bound of the light band, and the "no measurable rain" cut for the total.
pub const LIGHT_MIN_IN: f64 = 0.05;
/// Lower bound of the moderate band.
pub const MODERATE_MIN_IN: f64 = 0.25;
/// Upper bound (inclusive) of the moderate band; above it is heavy.
pub const HEAVY_ABOVE_IN: f64 = 0.5;

/// Alert categories in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertCategory {
    /// Total below 0.05 in. Nothing is sent.
    None,
    HeavyTotal,
    SomeHeavy,
    SomeModerate,
    SomeLight,
    GenericRain,
}

impl AlertCategory {
    pub fn should_notify(&self) -> bool {
        *self != AlertCategory::None
    }

    /// Subject line for this category over a `horizon`-hour outlook.
    pub fn subject(&self, horizon: ForecastHour) -> String {
        let lead = match self {
            AlertCategory::None => "No measurable rain",
            AlertCategory::HeavyTotal => "Heavy rain expected",
            AlertCategory::SomeHeavy => "Some heavy rain expected",
            AlertCategory::SomeModerate => "Some moderate rain expected",
            AlertCategory::SomeLight => "Some light rain expected",
            AlertCategory::GenericRain => "Some rain expected",
        };
        format!("{} in the next {} hours", lead, horizon)
    }
}

/// Flat record handed to the notification boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub category: AlertCategory,
    pub light: usize,
    pub moderate: usize,
    pub heavy: usize,
    /// Run total maximum in inches, rounded to two decimals.
    pub total: f64,
}

/// Classifies a run from its hourly domain maxima (cumulative hour
/// excluded) and the cumulative field's maximum.
pub fn classify(hourly_maxima: &[f64], cumulative_max: f64) -> Classification {
    let light = hourly_maxima
        .iter()
        .filter(|&&m| (LIGHT_MIN_IN..MODERATE_MIN_IN).contains(&m))
        .count();
    let moderate = hourly_maxima
        .iter()
        .filter(|&&m| (MODERATE_MIN_IN..=HEAVY_ABOVE_IN).contains(&m))
        .count();
    let heavy = hourly_maxima.iter().filter(|&&m| m > HEAVY_ABOVE_IN).count();
    let total = round2(cumulative_max);

    let category = if total < LIGHT_MIN_IN {
        AlertCategory::None
    } else if total > HEAVY_ABOVE_IN {
        AlertCategory::HeavyTotal
    } else if heavy > 0 {
        AlertCategory::SomeHeavy
    } else if moderate > 0 {
        AlertCategory::SomeModerate
    } else if light > 0 {
        AlertCategory::SomeLight
    } else {
        AlertCategory::GenericRain
    };

    Classification { category, light, moderate, heavy, total }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

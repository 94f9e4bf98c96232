/// Forecast analysis for the rain alerter.
///
/// Submodules:
/// - `convert`    — raw-to-display unit conversion and domain maxima
/// - `grid`       — nearest-cell point resolution (Chebyshev metric)
/// - `accumulate` — per-run accumulation state machine and fetch plans
/// - `severity`   — hourly band counts and alert category

pub mod accumulate;
pub mod convert;
pub mod grid;
pub mod severity;

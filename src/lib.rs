/// rain_alerter: HRRR-based rain alerts for configured areas.
///
/// # Module structure
///
/// ```text
/// rain_alerter
/// ├── model       — shared data types (GriddedField, QueryPoint, HourlyReading, AlerterError, …)
/// ├── config      — area / point / recipient configuration loader (rain_alerter.toml)
/// ├── logging     — source-tagged logging over the `log` facade
/// ├── cycle       — model cycle selection and local-time hour labels
/// ├── ingest
/// │   ├── nomads  — NOMADS grib-filter URL construction + HTTP source
/// │   ├── grib    — GRIB message framing and record isolation
/// │   ├── decoder — GRIB decoder boundary (wgrib2)
/// │   └── fixtures (test only) — synthetic GRIB payloads and decoder output
/// ├── analysis
/// │   ├── convert    — unit conversion and domain maxima
/// │   ├── grid       — nearest-cell lookup
/// │   ├── accumulate — per-run state machine and fetch plans
/// │   └── severity   — alert category classification
/// ├── render      — map rendering boundary
/// ├── notify      — message composition and delivery (JSON outbox)
/// └── alerter     — pipeline entry point
/// ```

/// Public modules
pub mod alerter;
pub mod analysis;
pub mod config;
pub mod cycle;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod notify;
pub mod render;

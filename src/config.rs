/// Alerter configuration loader - parses rain_alerter.toml
///
/// Separates area metadata (bounding boxes, named points, recipients)
/// from code, so areas and recipients can be added or adjusted without
/// recompiling. The file is read once at run start; the validated
/// `RunSettings` value is immutable and handed to the pipeline explicitly.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{AlerterError, DEFAULT_HORIZON_HOURS, ForecastHour, QueryPoint};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "RAIN_ALERTER_CONFIG";

/// Configuration file used when neither the CLI nor the environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "rain_alerter.toml";

// ---------------------------------------------------------------------------
// TOML structures
// ---------------------------------------------------------------------------

/// Settings shared by every area.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_nomads_url_base")]
    pub nomads_url_base: String,

    /// Offset of local time from UTC, used only for human-readable labels.
    #[serde(default)]
    pub utc_offset_hours: i32,

    #[serde(default = "default_horizon_hours")]
    pub horizon_hours: ForecastHour,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// 1 fetches hours one after another; more fetches them concurrently.
    #[serde(default = "default_fetch_workers")]
    pub fetch_workers: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Degrees added on every side of the bounding box when requesting data,
    /// so grid misalignment never leaves the box partially uncovered.
    #[serde(default = "default_bbox_margin_deg")]
    pub bbox_margin_deg: f64,

    /// Largest Chebyshev distance (degrees) at which a point still
    /// resolves to a grid cell.
    #[serde(default = "default_sanity_bound_deg")]
    pub sanity_bound_deg: f64,

    /// Hours whose domain maximum is at or below this (inches) add no
    /// point readings.
    #[serde(default = "default_reporting_threshold_in")]
    pub reporting_threshold_in: f64,
}

fn default_nomads_url_base() -> String {
    "https://nomads.ncep.noaa.gov/cgi-bin/".to_string()
}

fn default_horizon_hours() -> ForecastHour {
    DEFAULT_HORIZON_HOURS
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_fetch_workers() -> usize {
    1
}

fn default_user_agent() -> String {
    "routewx/0.2".to_string()
}

fn default_bbox_margin_deg() -> f64 {
    0.05
}

fn default_sanity_bound_deg() -> f64 {
    0.25
}

fn default_reporting_threshold_in() -> f64 {
    0.05
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            nomads_url_base: default_nomads_url_base(),
            utc_offset_hours: 0,
            horizon_hours: default_horizon_hours(),
            request_timeout_secs: default_request_timeout_secs(),
            fetch_workers: default_fetch_workers(),
            user_agent: default_user_agent(),
            bbox_margin_deg: default_bbox_margin_deg(),
            sanity_bound_deg: default_sanity_bound_deg(),
            reporting_threshold_in: default_reporting_threshold_in(),
        }
    }
}

/// A named point's coordinates.
#[derive(Debug, Clone, Deserialize)]
pub struct PointConfig {
    pub lat: f64,
    pub lon: f64,
}

/// One monitored area.
#[derive(Debug, Clone, Deserialize)]
pub struct AreaConfig {
    pub left_lon: f64,
    pub right_lon: f64,
    pub top_lat: f64,
    pub bottom_lat: f64,

    /// Map tile zoom, only meaningful to a renderer.
    #[serde(default = "default_zoom_level")]
    pub zoom_level: u8,

    /// Label placement offset (degrees), only meaningful to a renderer.
    #[serde(default)]
    pub label_offset: f64,

    #[serde(default)]
    pub points: BTreeMap<String, PointConfig>,

    /// Recipient address -> labels of the points that recipient follows.
    #[serde(default)]
    pub recipients: BTreeMap<String, Vec<String>>,
}

fn default_zoom_level() -> u8 {
    10
}

/// Root configuration structure for TOML parsing
#[derive(Debug, Clone, Deserialize)]
pub struct AlerterConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub areas: BTreeMap<String, AreaConfig>,
}

// ---------------------------------------------------------------------------
// Bounding boxes
// ---------------------------------------------------------------------------

/// Geographic box in degrees (longitudes negative west).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub left_lon: f64,
    pub right_lon: f64,
    pub top_lat: f64,
    pub bottom_lat: f64,
}

impl BoundingBox {
    /// Box grown by `margin` degrees on every side.
    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            left_lon: self.left_lon - margin,
            right_lon: self.right_lon + margin,
            top_lat: self.top_lat + margin,
            bottom_lat: self.bottom_lat - margin,
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.bottom_lat && lat <= self.top_lat && lon >= self.left_lon && lon <= self.right_lon
    }
}

impl AreaConfig {
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            left_lon: self.left_lon,
            right_lon: self.right_lon,
            top_lat: self.top_lat,
            bottom_lat: self.bottom_lat,
        }
    }
}

// ---------------------------------------------------------------------------
// Validated run settings
// ---------------------------------------------------------------------------

/// Everything one run needs, validated. Constructed once at run start and
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub area_name: String,
    pub area: AreaConfig,
    pub general: GeneralConfig,
}

impl RunSettings {
    /// The bounding box actually requested from the provider.
    pub fn request_box(&self) -> BoundingBox {
        self.area.bounding_box().expanded(self.general.bbox_margin_deg)
    }

    pub fn horizon(&self) -> ForecastHour {
        self.general.horizon_hours
    }

    /// All configured points, in label order.
    pub fn query_points(&self) -> Vec<QueryPoint> {
        self.area
            .points
            .iter()
            .map(|(name, p)| QueryPoint { name: name.clone(), lat: p.lat, lon: p.lon })
            .collect()
    }

    /// Recipient -> the points that recipient follows, resolved to coordinates.
    pub fn recipient_points(&self) -> BTreeMap<String, Vec<QueryPoint>> {
        self.area
            .recipients
            .iter()
            .map(|(recipient, labels)| {
                let points = labels
                    .iter()
                    .filter_map(|label| {
                        self.area.points.get(label).map(|p| QueryPoint {
                            name: label.clone(),
                            lat: p.lat,
                            lon: p.lon,
                        })
                    })
                    .collect();
                (recipient.clone(), points)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Resolves which configuration file to read: the explicit path if given,
/// otherwise `RAIN_ALERTER_CONFIG` (a `.env` file is honoured), otherwise
/// `rain_alerter.toml` in the working directory.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    dotenv::dotenv().ok();

    env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Parses a configuration document.
pub fn parse_config(contents: &str) -> Result<AlerterConfig, AlerterError> {
    toml::from_str(contents)
        .map_err(|e| AlerterError::Configuration(format!("failed to parse configuration: {}", e)))
}

/// Loads and parses the configuration file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AlerterConfig, AlerterError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        AlerterError::Configuration(format!("failed to read {}: {}", path.display(), e))
    })?;
    parse_config(&contents)
}

impl AlerterConfig {
    /// Validates the named area against the general settings and returns
    /// the immutable settings for one run.
    pub fn settings_for(&self, area_name: &str) -> Result<RunSettings, AlerterError> {
        let area = self.areas.get(area_name).ok_or_else(|| {
            let known: Vec<&str> = self.areas.keys().map(|k| k.as_str()).collect();
            AlerterError::Configuration(format!(
                "area '{}' is not configured (known areas: {})",
                area_name,
                known.join(", ")
            ))
        })?;

        validate_general(&self.general)?;
        validate_area(area_name, area)?;

        let settings = RunSettings {
            area_name: area_name.to_string(),
            area: area.clone(),
            general: self.general.clone(),
        };
        validate_points_in_box(&settings)?;
        Ok(settings)
    }
}

fn config_error(msg: String) -> AlerterError {
    AlerterError::Configuration(msg)
}

fn validate_general(general: &GeneralConfig) -> Result<(), AlerterError> {
    if general.horizon_hours < 2 {
        return Err(config_error(format!(
            "horizon_hours must be at least 2, got {}",
            general.horizon_hours
        )));
    }
    if general.fetch_workers == 0 {
        return Err(config_error("fetch_workers must be at least 1".to_string()));
    }
    if general.request_timeout_secs == 0 {
        return Err(config_error("request_timeout_secs must be positive".to_string()));
    }
    if !(general.bbox_margin_deg >= 0.0) {
        return Err(config_error(format!(
            "bbox_margin_deg must be non-negative, got {}",
            general.bbox_margin_deg
        )));
    }
    if !(general.sanity_bound_deg > 0.0) {
        return Err(config_error(format!(
            "sanity_bound_deg must be positive, got {}",
            general.sanity_bound_deg
        )));
    }
    if !general.reporting_threshold_in.is_finite() {
        return Err(config_error("reporting_threshold_in must be finite".to_string()));
    }
    if general.utc_offset_hours.abs() > 14 {
        return Err(config_error(format!(
            "utc_offset_hours out of range: {}",
            general.utc_offset_hours
        )));
    }
    Ok(())
}

fn valid_lat(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat)
}

fn valid_lon(lon: f64) -> bool {
    (-180.0..=180.0).contains(&lon)
}

fn validate_area(name: &str, area: &AreaConfig) -> Result<(), AlerterError> {
    if !valid_lon(area.left_lon) || !valid_lon(area.right_lon) {
        return Err(config_error(format!("{}: longitudes must lie in [-180, 180]", name)));
    }
    if !valid_lat(area.top_lat) || !valid_lat(area.bottom_lat) {
        return Err(config_error(format!("{}: latitudes must lie in [-90, 90]", name)));
    }
    if area.left_lon >= area.right_lon {
        return Err(config_error(format!(
            "{}: left_lon ({}) must be west of right_lon ({})",
            name, area.left_lon, area.right_lon
        )));
    }
    if area.bottom_lat >= area.top_lat {
        return Err(config_error(format!(
            "{}: bottom_lat ({}) must be south of top_lat ({})",
            name, area.bottom_lat, area.top_lat
        )));
    }

    for (label, point) in &area.points {
        if !valid_lat(point.lat) || !valid_lon(point.lon) {
            return Err(config_error(format!(
                "{}: point '{}' has invalid coordinates ({}, {})",
                name, label, point.lat, point.lon
            )));
        }
    }

    if area.recipients.is_empty() {
        return Err(config_error(format!("{}: no recipients configured", name)));
    }

    for (recipient, labels) in &area.recipients {
        if recipient.trim().is_empty() {
            return Err(config_error(format!("{}: empty recipient address", name)));
        }
        for label in labels {
            if !area.points.contains_key(label) {
                return Err(config_error(format!(
                    "{}: recipient '{}' references unknown point '{}'",
                    name, recipient, label
                )));
            }
        }
    }

    Ok(())
}

/// Every point must lie inside the requested box, otherwise it can never
/// resolve to a grid cell and the first wet hour would abort the run.
fn validate_points_in_box(settings: &RunSettings) -> Result<(), AlerterError> {
    let bbox = settings.request_box();
    for point in settings.query_points() {
        if !bbox.contains(point.lat, point.lon) {
            return Err(config_error(format!(
                "{}: point '{}' ({}, {}) lies outside the area's bounding box",
                settings.area_name, point.name, point.lat, point.lon
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

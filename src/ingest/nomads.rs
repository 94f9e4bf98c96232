/// NOMADS grib-filter client for HRRR surface precipitation.
///
/// Builds `filter_hrrr_2d.pl` requests restricted to APCP and to the area's
/// expanded bounding box, fetches them with a blocking reqwest client, picks
/// the right record out of the response and hands it to a `GribDecoder`.
///
/// Request shape:
///
/// ```text
/// {base}filter_hrrr_2d.pl?file=hrrr.t12z.wrfsfcf07.grib2&var_APCP=on&subregion=
///     &leftlon=-89.9&rightlon=-89.4&toplat=40.9&bottomlat=40.45
///     &dir=%2Fhrrr.20190803%2Fconus
/// ```

use std::sync::Arc;
use std::time::Duration;

use crate::config::{BoundingBox, RunSettings};
use crate::cycle::ModelCycle;
use crate::ingest::decoder::GribDecoder;
use crate::ingest::{GriddedFieldSource, SourceBuilder, grib, validate_request};
use crate::logging::{self, DataSource};
use crate::model::{AlerterError, ForecastHour, GriddedField};

pub const FILTER_SCRIPT: &str = "filter_hrrr_2d.pl";

/// Builds the grib-filter URL for one forecast hour of `cycle`.
pub fn build_filter_url(base: &str, cycle: &ModelCycle, hour: ForecastHour, bbox: &BoundingBox) -> String {
    let dir = format!("/hrrr.{}/conus", cycle.date_stamp());
    format!(
        "{}{}?file=hrrr.t{:02}z.wrfsfcf{:02}.grib2&var_APCP=on&subregion=&leftlon={}&rightlon={}&toplat={}&bottomlat={}&dir={}",
        base,
        FILTER_SCRIPT,
        cycle.init_hour(),
        hour,
        coord(bbox.left_lon),
        coord(bbox.right_lon),
        coord(bbox.top_lat),
        coord(bbox.bottom_lat),
        urlencoding::encode(&dir)
    )
}

/// Coordinate formatted to at most four decimals, without trailing zeros.
fn coord(value: f64) -> String {
    let text = format!("{:.4}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" { "0".to_string() } else { text.to_string() }
}

/// HTTP source for one area and one model cycle.
pub struct NomadsSource<D: GribDecoder> {
    client: reqwest::blocking::Client,
    base_url: String,
    cycle: ModelCycle,
    bbox: BoundingBox,
    horizon: ForecastHour,
    decoder: D,
    area: String,
}

impl<D: GribDecoder> NomadsSource<D> {
    pub fn new(settings: &RunSettings, cycle: ModelCycle, decoder: D) -> Result<Self, AlerterError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.general.request_timeout_secs))
            .user_agent(settings.general.user_agent.clone())
            .build()
            .map_err(|e| AlerterError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.general.nomads_url_base.clone(),
            cycle,
            bbox: settings.request_box(),
            horizon: settings.horizon(),
            decoder,
            area: settings.area_name.clone(),
        })
    }

    pub fn url_for(&self, hour: ForecastHour) -> String {
        build_filter_url(&self.base_url, &self.cycle, hour, &self.bbox)
    }

    /// Raw response body for one hour.
    pub fn fetch_bytes(&self, hour: ForecastHour) -> Result<Vec<u8>, AlerterError> {
        let url = self.url_for(hour);
        let context = logging::hour_context(&self.area, hour);
        logging::debug(DataSource::Nomads, Some(&context), &format!("GET {}", url));

        let response = self.client.get(&url).send().map_err(|e| {
            let reason = if e.is_timeout() {
                format!("request timed out: {}", e)
            } else {
                format!("HTTP request failed: {}", e)
            };
            AlerterError::Acquisition { hour, reason }
        })?;

        if !response.status().is_success() {
            return Err(AlerterError::Acquisition {
                hour,
                reason: format!("HTTP status {}", response.status()),
            });
        }

        let bytes = response.bytes().map_err(|e| AlerterError::Acquisition {
            hour,
            reason: format!("failed to read response body: {}", e),
        })?;

        logging::debug(
            DataSource::Nomads,
            Some(&context),
            &format!("received {} bytes", bytes.len()),
        );
        Ok(bytes.to_vec())
    }
}

impl<D: GribDecoder + Clone + 'static> NomadsSource<D> {
    /// Source builder creating a fresh NOMADS source per run.
    pub fn builder(decoder: D) -> SourceBuilder {
        Box::new(move |settings: &RunSettings, cycle: ModelCycle| -> Result<Arc<dyn GriddedFieldSource>, AlerterError> {
            let source = NomadsSource::new(settings, cycle, decoder.clone())?;
            Ok(Arc::new(source) as Arc<dyn GriddedFieldSource>)
        })
    }
}

impl<D: GribDecoder> GriddedFieldSource for NomadsSource<D> {
    fn fetch(&self, hour: ForecastHour, cumulative: bool) -> Result<GriddedField, AlerterError> {
        validate_request(hour, cumulative, self.horizon)?;

        let payload = self.fetch_bytes(hour)?;
        let record = grib::select_record(&payload, cumulative)
            .map_err(|reason| AlerterError::Acquisition { hour, reason })?;

        self.decoder.decode(record)
    }
}

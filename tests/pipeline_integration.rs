/// Integration tests for the full alerting pipeline
///
/// These tests drive the public API end to end with an in-memory field
/// source standing in for NOMADS:
/// 1. Configuration → run → classification → outbox files
/// 2. Fail-fast: a failing hour aborts the run and nothing is sent
/// 3. Sequential and parallel fetch plans produce the same run
/// 4. The final hour is consumed as the cumulative field only
///
/// Run with: cargo test --test pipeline_integration

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use rain_alerter::alerter::RainAlerter;
use rain_alerter::analysis::severity::AlertCategory;
use rain_alerter::config::{RunSettings, parse_config};
use rain_alerter::cycle::ModelCycle;
use rain_alerter::ingest::{GriddedFieldSource, SourceBuilder};
use rain_alerter::model::{AlerterError, ForecastHour, GriddedField};
use rain_alerter::notify::OutboxNotifier;
use rain_alerter::render::NullRenderer;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const HORIZON: ForecastHour = 6;

fn config_text(workers: usize) -> String {
    format!(
        r#"
[general]
horizon_hours = {HORIZON}
utc_offset_hours = -5
fetch_workers = {workers}

[areas.Peoria]
left_lon = -89.85
right_lon = -89.45
top_lat = 40.85
bottom_lat = 40.50

[areas.Peoria.points.Downtown]
lat = 40.6936
lon = -89.5890

[areas.Peoria.points.Pekin]
lat = 40.5675
lon = -89.6407

[areas.Peoria.recipients]
"alerts@example.com" = ["Downtown", "Pekin"]
"river-ops@example.com" = ["Pekin"]
"#
    )
}

fn settings(workers: usize) -> RunSettings {
    parse_config(&config_text(workers))
        .expect("test config parses")
        .settings_for("Peoria")
        .expect("test config validates")
}

/// 0.05° grid covering the Peoria box. Values in mm.
fn peoria_grid(value_at: impl Fn(f64, f64) -> f64) -> GriddedField {
    let (rows, cols) = (9, 10);
    let mut values = Vec::new();
    let mut lats = Vec::new();
    let mut lons = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            let lat = 40.45 + r as f64 * 0.05;
            let lon = -89.90 + c as f64 * 0.05;
            values.push(value_at(lat, lon));
            lats.push(lat);
            lons.push(lon);
        }
    }
    GriddedField::new(rows, cols, values, lats, lons).unwrap()
}

/// Rain band moving north: hour h is wet (7.62 mm) south of 40.475 + 0.05h.
/// The cumulative field is 15.24 mm everywhere.
struct StormSource {
    fail_at: Option<ForecastHour>,
    requests: Mutex<Vec<(ForecastHour, bool)>>,
    fetches: AtomicUsize,
}

impl StormSource {
    fn new(fail_at: Option<ForecastHour>) -> Self {
        Self { fail_at, requests: Mutex::new(Vec::new()), fetches: AtomicUsize::new(0) }
    }
}

impl GriddedFieldSource for StormSource {
    fn fetch(&self, hour: ForecastHour, cumulative: bool) -> Result<GriddedField, AlerterError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push((hour, cumulative));
        if self.fail_at == Some(hour) {
            return Err(AlerterError::Acquisition { hour, reason: "HTTP status 404 Not Found".to_string() });
        }
        if cumulative {
            return Ok(peoria_grid(|_, _| 15.24));
        }
        let edge = 40.475 + 0.05 * hour as f64;
        Ok(peoria_grid(move |lat, _| if lat < edge { 7.62 } else { 0.0 }))
    }
}

fn builder_for(source: Arc<StormSource>) -> SourceBuilder {
    Box::new(move |_: &RunSettings, _: ModelCycle| -> Result<Arc<dyn GriddedFieldSource>, AlerterError> {
        Ok(source.clone() as Arc<dyn GriddedFieldSource>)
    })
}

fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 8, 3, 9, 0, 0).unwrap()
}

// ---------------------------------------------------------------------------
// 1. End to end
// ---------------------------------------------------------------------------

#[test]
fn test_pipeline_writes_one_outbox_file_per_recipient() {
    let outbox = tempfile::tempdir().unwrap();
    let source = Arc::new(StormSource::new(None));
    let mut alerter = RainAlerter::new(settings(1), builder_for(source.clone()), Box::new(NullRenderer));
    let mut notifier = OutboxNotifier::new(outbox.path());

    let report = alerter.run_and_notify(morning(), &mut notifier).expect("run succeeds");

    // 15.24 mm = 0.6 in total
    assert_eq!(report.classification.category, AlertCategory::HeavyTotal);
    assert_eq!(report.classification.total, 0.6);
    assert_eq!(report.classification.moderate, (HORIZON - 1) as usize);
    assert_eq!(report.notified, 2);
    assert_eq!(report.cycle.init_hour(), 0, "09z uses the 00z cycle");

    let mut files: Vec<String> = fs::read_dir(outbox.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    assert_eq!(
        files,
        vec![
            "20190803t00z_Peoria_alerts_at_example.com.json",
            "20190803t00z_Peoria_river-ops_at_example.com.json",
        ]
    );

    let text = fs::read_to_string(outbox.path().join(&files[1])).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(doc["subject"], "Peoria Area: Heavy rain expected in the next 6 hours");
    assert!(doc["hourly"].get("Downtown").is_none(), "only the recipient's own points");

    // Pekin (40.5675) sits in the 40.55 row: wet from hour 2 on.
    let pekin = doc["hourly"]["Pekin"].as_array().unwrap();
    let hours: Vec<u64> = pekin.iter().map(|r| r["hour"].as_u64().unwrap()).collect();
    assert_eq!(hours, vec![1, 2, 3, 4, 5]);
    let values: Vec<f64> = pekin.iter().map(|r| r["value"].as_f64().unwrap()).collect();
    assert_eq!(values, vec![0.0, 0.3, 0.3, 0.3, 0.3]);
    assert_eq!(pekin[0]["label"], "08/02/2019 08:00 PM");
}

#[test]
fn test_body_reports_counts_and_total() {
    let outbox = tempfile::tempdir().unwrap();
    let source = Arc::new(StormSource::new(None));
    let mut alerter = RainAlerter::new(settings(1), builder_for(source), Box::new(NullRenderer));
    let mut notifier = OutboxNotifier::new(outbox.path());
    alerter.run_and_notify(morning(), &mut notifier).unwrap();

    let path = outbox.path().join("20190803t00z_Peoria_alerts_at_example.com.json");
    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    let body = doc["body"].as_str().unwrap();
    assert!(body.starts_with("From 08/02/2019 07:00 PM to 08/03/2019 01:00 AM:\n"));
    assert!(body.contains("0 hours of light precipitation"));
    assert!(body.contains("5 hours of moderate precip"));
    assert!(body.ends_with("A max total of 0.6 inches of precip can be expected over the next 6 hours."));
}

// ---------------------------------------------------------------------------
// 2. Fail-fast
// ---------------------------------------------------------------------------

#[test]
fn test_failing_hour_aborts_without_notification() {
    let outbox = tempfile::tempdir().unwrap();
    let source = Arc::new(StormSource::new(Some(3)));
    let mut alerter = RainAlerter::new(settings(1), builder_for(source.clone()), Box::new(NullRenderer));
    let mut notifier = OutboxNotifier::new(outbox.path().join("out"));

    let failure = alerter.run_and_notify(morning(), &mut notifier).expect_err("hour 3 fails");

    assert_eq!(failure.area, "Peoria");
    assert_eq!(failure.hour, Some(3));
    assert_eq!(failure.error.kind(), "acquisition");
    assert!(failure.to_string().contains("Peoria hour 3 [acquisition]"));

    assert_eq!(source.fetches.load(Ordering::SeqCst), 3, "no hour after the failure is fetched");
    assert!(!outbox.path().join("out").exists(), "nothing is delivered for a failed run");
}

#[test]
fn test_parallel_failure_aborts_without_notification() {
    let outbox = tempfile::tempdir().unwrap();
    let source = Arc::new(StormSource::new(Some(HORIZON)));
    let mut alerter = RainAlerter::new(settings(3), builder_for(source), Box::new(NullRenderer));
    let mut notifier = OutboxNotifier::new(outbox.path().join("out"));

    let failure = alerter.run_and_notify(morning(), &mut notifier).expect_err("cumulative hour fails");
    assert_eq!(failure.hour, Some(HORIZON));
    assert!(!outbox.path().join("out").exists());
}

// ---------------------------------------------------------------------------
// 3. Fetch plan equivalence
// ---------------------------------------------------------------------------

#[test]
fn test_sequential_and_parallel_runs_match() {
    let sequential = RainAlerter::new(settings(1), builder_for(Arc::new(StormSource::new(None))), Box::new(NullRenderer))
        .run(morning())
        .unwrap();
    let parallel = RainAlerter::new(settings(4), builder_for(Arc::new(StormSource::new(None))), Box::new(NullRenderer))
        .run(morning())
        .unwrap();

    assert_eq!(parallel.run.domain_maxima, sequential.run.domain_maxima);
    assert_eq!(parallel.run.hourly, sequential.run.hourly);
    assert_eq!(parallel.run.cumulative, sequential.run.cumulative);
    assert_eq!(parallel.classification, sequential.classification);
}

// ---------------------------------------------------------------------------
// 4. Cumulative final hour
// ---------------------------------------------------------------------------

#[test]
fn test_final_hour_is_cumulative_only() {
    let source = Arc::new(StormSource::new(None));
    let outcome = RainAlerter::new(settings(1), builder_for(source.clone()), Box::new(NullRenderer))
        .run(morning())
        .unwrap();

    assert_eq!(outcome.run.domain_maxima.len(), (HORIZON - 1) as usize);
    assert!((outcome.run.cumulative_max - 0.6).abs() < 1e-3);

    let requests = source.requests.lock().unwrap().clone();
    let cumulative: Vec<ForecastHour> = requests.iter().filter(|r| r.1).map(|r| r.0).collect();
    assert_eq!(cumulative, vec![HORIZON]);
    assert_eq!(requests.len(), HORIZON as usize);

    for series in outcome.run.hourly.values().flat_map(|points| points.values()) {
        assert!(series.iter().all(|reading| reading.hour < HORIZON));
    }
}

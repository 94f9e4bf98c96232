/// Accumulation of a full forecast run.
///
/// The engine is a small state machine over forecast hours:
///
/// ```text
/// Pending(1) -> Pending(2) -> ... -> Pending(H) -> Done
/// ```
///
/// Each transition ingests exactly one field. Hours 1..H-1 are single-hour
/// fields: their domain maximum is recorded and, when it clears the
/// reporting threshold, every configured point is resolved and a reading
/// appended to its series. Hour H is the cumulative field for the whole
/// run; it is kept as the run total and never treated as an hourly reading.
///
/// Fetching is separate from accumulation. `run_sequential` fetches and
/// ingests one hour at a time. `run_parallel` fetches on a bounded thread
/// pool and then ingests the fields in hour order. Either way the first
/// failure aborts the run and no `Run` is produced.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};

use threadpool::ThreadPool;

use crate::analysis::convert::{MM_TO_IN, convert};
use crate::analysis::grid::GridResolver;
use crate::config::RunSettings;
use crate::cycle::ModelCycle;
use crate::ingest::GriddedFieldSource;
use crate::logging::{self, DataSource};
use crate::model::{AlerterError, ForecastHour, GriddedField, HourlyReading, QueryPoint, RunFailure};
use crate::render::{Artifact, Renderer};

// ---------------------------------------------------------------------------
// Engine configuration
// ---------------------------------------------------------------------------

/// Numeric parameters of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub horizon: ForecastHour,
    /// Display-unit threshold a domain maximum must exceed for point readings.
    pub reporting_threshold: f64,
    /// Raw-to-display conversion factor.
    pub factor: f64,
    pub resolver: GridResolver,
}

impl EngineConfig {
    pub fn from_settings(settings: &RunSettings) -> Self {
        Self {
            horizon: settings.horizon(),
            reporting_threshold: settings.general.reporting_threshold_in,
            factor: MM_TO_IN,
            resolver: GridResolver::new(settings.general.sanity_bound_deg),
        }
    }
}

// ---------------------------------------------------------------------------
// Run aggregate
// ---------------------------------------------------------------------------

/// Recipient -> point label -> hourly readings.
pub type PointSeries = BTreeMap<String, BTreeMap<String, Vec<HourlyReading>>>;

/// A completed run. Owned by exactly one pipeline invocation and consumed
/// by classification and notification.
#[derive(Debug, Clone)]
pub struct Run {
    pub area: String,
    pub cycle: ModelCycle,
    pub horizon: ForecastHour,
    pub hourly: PointSeries,
    /// One entry per hour 1..H-1, in hour order.
    pub domain_maxima: Vec<f64>,
    /// Total accumulation over the horizon, in display units.
    pub cumulative: GriddedField,
    pub cumulative_max: f64,
    pub hourly_artifacts: Vec<Artifact>,
    pub total_artifact: Option<Artifact>,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Waiting for the field of this hour.
    Pending(ForecastHour),
    Done,
}

pub struct AccumulationEngine<'r> {
    area: String,
    config: EngineConfig,
    cycle: ModelCycle,
    recipients: BTreeMap<String, Vec<QueryPoint>>,
    renderer: &'r mut dyn Renderer,
    state: EngineState,
    hourly: PointSeries,
    domain_maxima: Vec<f64>,
    hourly_artifacts: Vec<Artifact>,
    cumulative: Option<(GriddedField, f64)>,
    total_artifact: Option<Artifact>,
}

impl<'r> AccumulationEngine<'r> {
    pub fn new(
        area: &str,
        config: EngineConfig,
        cycle: ModelCycle,
        recipients: BTreeMap<String, Vec<QueryPoint>>,
        renderer: &'r mut dyn Renderer,
    ) -> Self {
        // Every recipient/point pair gets a series up front, even if it
        // stays empty.
        let hourly = recipients
            .iter()
            .map(|(recipient, points)| {
                let series = points.iter().map(|p| (p.name.clone(), Vec::new())).collect();
                (recipient.clone(), series)
            })
            .collect();

        Self {
            area: area.to_string(),
            config,
            cycle,
            recipients,
            renderer,
            state: EngineState::Pending(1),
            hourly,
            domain_maxima: Vec::with_capacity(config.horizon.saturating_sub(1) as usize),
            hourly_artifacts: Vec::new(),
            cumulative: None,
            total_artifact: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// The hour whose field the engine expects next, if any.
    pub fn pending_hour(&self) -> Option<ForecastHour> {
        match self.state {
            EngineState::Pending(hour) => Some(hour),
            EngineState::Done => None,
        }
    }

    /// Domain maxima recorded so far.
    pub fn domain_maxima(&self) -> &[f64] {
        &self.domain_maxima
    }

    /// Point series recorded so far.
    pub fn hourly(&self) -> &PointSeries {
        &self.hourly
    }

    /// Ingests the field for the pending hour and advances the state.
    ///
    /// On error the state does not advance; callers abort the run.
    pub fn ingest(&mut self, field: GriddedField) -> Result<EngineState, AlerterError> {
        let hour = self.pending_hour().ok_or_else(|| AlerterError::Acquisition {
            hour: self.config.horizon + 1,
            reason: "run already complete".to_string(),
        })?;

        let (converted, max_value) = convert(&field, self.config.factor)?;
        let label = self.cycle.label(hour);
        let context = logging::hour_context(&self.area, hour);

        if hour < self.config.horizon {
            self.ingest_hourly(hour, &label, &converted, max_value)?;
            logging::debug(
                DataSource::Engine,
                Some(&context),
                &format!("hourly max {:.3} in", max_value),
            );
            self.state = EngineState::Pending(hour + 1);
        } else {
            if max_value > 0.0 {
                let start = self.cycle.init_label();
                self.total_artifact = self.renderer.render_total(&start, &label, &converted, max_value)?;
            }
            logging::debug(
                DataSource::Engine,
                Some(&context),
                &format!("run total max {:.3} in", max_value),
            );
            self.cumulative = Some((converted, max_value));
            self.state = EngineState::Done;
        }

        Ok(self.state)
    }

    fn ingest_hourly(
        &mut self,
        hour: ForecastHour,
        label: &str,
        field: &GriddedField,
        max_value: f64,
    ) -> Result<(), AlerterError> {
        // Resolve before mutating anything so a failure leaves no partial hour.
        let mut readings: Vec<(String, String, f64)> = Vec::new();
        if max_value > self.config.reporting_threshold {
            let mut resolved: BTreeMap<&str, f64> = BTreeMap::new();
            for (recipient, points) in &self.recipients {
                for point in points {
                    let value = match resolved.get(point.name.as_str()) {
                        Some(v) => *v,
                        None => {
                            let v = self.config.resolver.resolve(field, point)?;
                            resolved.insert(point.name.as_str(), v);
                            v
                        }
                    };
                    readings.push((recipient.clone(), point.name.clone(), value));
                }
            }
        }

        let artifact = self.renderer.render_hour(hour, label, field)?;

        self.domain_maxima.push(max_value);
        for (recipient, point, value) in readings {
            self.hourly
                .entry(recipient)
                .or_default()
                .entry(point)
                .or_default()
                .push(HourlyReading { hour, label: label.to_string(), value });
        }
        if let Some(artifact) = artifact {
            self.hourly_artifacts.push(artifact);
        }

        Ok(())
    }

    /// Produces the run once every hour has been ingested.
    pub fn finish(self) -> Result<Run, AlerterError> {
        let pending = self.pending_hour();
        let (cumulative, cumulative_max) = match self.cumulative {
            Some(total) if self.state == EngineState::Done => total,
            _ => {
                return Err(AlerterError::Acquisition {
                    hour: pending.unwrap_or(self.config.horizon),
                    reason: "run finished before the cumulative field was ingested".to_string(),
                });
            }
        };

        Ok(Run {
            area: self.area,
            cycle: self.cycle,
            horizon: self.config.horizon,
            hourly: self.hourly,
            domain_maxima: self.domain_maxima,
            cumulative,
            cumulative_max,
            hourly_artifacts: self.hourly_artifacts,
            total_artifact: self.total_artifact,
        })
    }

    fn failure(&self, error: AlerterError) -> RunFailure {
        RunFailure::new(&self.area, self.pending_hour(), error)
    }
}

// ---------------------------------------------------------------------------
// Fetch plans
// ---------------------------------------------------------------------------

/// Fetches and ingests hours strictly in order. Hours after a failure are
/// never requested.
pub fn run_sequential<S>(source: &S, mut engine: AccumulationEngine<'_>) -> Result<Run, RunFailure>
where
    S: GriddedFieldSource + ?Sized,
{
    let horizon = engine.config.horizon;

    while let Some(hour) = engine.pending_hour() {
        let field = source
            .fetch(hour, hour == horizon)
            .map_err(|e| engine.failure(e))?;
        engine.ingest(field).map_err(|e| engine.failure(e))?;
    }

    let area = engine.area.clone();
    engine.finish().map_err(|e| RunFailure::new(&area, None, e))
}

/// Fetches every hour on a pool of `workers` threads, then ingests the
/// fields in hour order.
pub fn run_parallel<S>(
    source: Arc<S>,
    mut engine: AccumulationEngine<'_>,
    workers: usize,
) -> Result<Run, RunFailure>
where
    S: GriddedFieldSource + ?Sized + 'static,
{
    let horizon = engine.config.horizon;

    let fields = fetch_parallel(source, horizon, workers)
        .map_err(|(hour, e)| RunFailure::new(&engine.area, Some(hour), e))?;

    for field in fields {
        engine.ingest(field).map_err(|e| engine.failure(e))?;
    }

    let area = engine.area.clone();
    engine.finish().map_err(|e| RunFailure::new(&area, None, e))
}

/// Fetches hours 1..=horizon concurrently (the last one cumulative) and
/// returns them in hour order.
///
/// The first failure cancels fetches that have not started yet and is
/// returned with its hour.
pub fn fetch_parallel<S>(
    source: Arc<S>,
    horizon: ForecastHour,
    workers: usize,
) -> Result<Vec<GriddedField>, (ForecastHour, AlerterError)>
where
    S: GriddedFieldSource + ?Sized + 'static,
{
    let pool = ThreadPool::new(workers.max(1));
    let (tx, rx) = mpsc::channel();
    let cancelled = Arc::new(AtomicBool::new(false));

    for hour in 1..=horizon {
        let source = Arc::clone(&source);
        let tx = tx.clone();
        let cancelled = Arc::clone(&cancelled);

        pool.execute(move || {
            if cancelled.load(Ordering::SeqCst) {
                return;
            }
            let result = source.fetch(hour, hour == horizon);
            if result.is_err() {
                cancelled.store(true, Ordering::SeqCst);
            }
            let _ = tx.send((hour, result));
        });
    }
    drop(tx);

    let mut slots: Vec<Option<GriddedField>> = vec![None; horizon as usize];
    for (hour, result) in rx.iter() {
        match result {
            Ok(field) => slots[(hour - 1) as usize] = Some(field),
            Err(e) => return Err((hour, e)),
        }
    }

    slots
        .into_iter()
        .zip(1..=horizon)
        .map(|(slot, hour)| {
            slot.ok_or_else(|| {
                (
                    hour,
                    AlerterError::Acquisition {
                        hour,
                        reason: "fetch worker exited without a result".to_string(),
                    },
                )
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Pipeline entry point for one area.
///
/// A run:
/// 1. Selects the latest published model cycle for `now`
/// 2. Builds the data source for that cycle
/// 3. Fetches and folds hours 1..=H (sequentially, or on a thread pool
///    when `fetch_workers > 1`)
/// 4. Classifies the completed run
/// 5. Optionally hands per-recipient messages to a `Notifier`
///
/// Any failure in steps 1-3 aborts the run with a `RunFailure`; nothing is
/// classified or sent for a partial run.

use chrono::{DateTime, Utc};

use crate::analysis::accumulate::{AccumulationEngine, EngineConfig, Run, run_parallel, run_sequential};
use crate::analysis::severity::{Classification, classify};
use crate::config::RunSettings;
use crate::cycle::ModelCycle;
use crate::ingest::SourceBuilder;
use crate::logging::{self, DataSource};
use crate::model::RunFailure;
use crate::notify::{Notifier, dispatch};
use crate::render::Renderer;

/// A completed, classified run that has not been notified yet.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run: Run,
    pub classification: Classification,
}

/// What `run_and_notify` did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub area: String,
    pub cycle: ModelCycle,
    pub classification: Classification,
    /// Messages accepted by the notifier (0 when nothing was sent).
    pub notified: usize,
}

pub struct RainAlerter {
    settings: RunSettings,
    build_source: SourceBuilder,
    renderer: Box<dyn Renderer>,
}

impl RainAlerter {
    pub fn new(settings: RunSettings, build_source: SourceBuilder, renderer: Box<dyn Renderer>) -> Self {
        Self { settings, build_source, renderer }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Runs the pipeline for the cycle current at `now` and classifies it.
    pub fn run(&mut self, now: DateTime<Utc>) -> Result<RunOutcome, RunFailure> {
        self.run_inner(now).inspect_err(logging::log_run_failure)
    }

    fn run_inner(&mut self, now: DateTime<Utc>) -> Result<RunOutcome, RunFailure> {
        let area = self.settings.area_name.clone();
        let general = &self.settings.general;

        let cycle = ModelCycle::latest(now, general.utc_offset_hours)
            .map_err(|e| RunFailure::new(&area, None, e))?;
        logging::info(
            DataSource::System,
            Some(&area),
            &format!(
                "starting run: cycle {} {:02}z, {} hours, {} fetch worker(s)",
                cycle.date_stamp(),
                cycle.init_hour(),
                general.horizon_hours,
                general.fetch_workers
            ),
        );

        let source = (self.build_source)(&self.settings, cycle).map_err(|e| RunFailure::new(&area, None, e))?;

        let workers = self.settings.general.fetch_workers;
        let engine = AccumulationEngine::new(
            &area,
            EngineConfig::from_settings(&self.settings),
            cycle,
            self.settings.recipient_points(),
            self.renderer.as_mut(),
        );

        let run = if workers > 1 {
            run_parallel(source, engine, workers)?
        } else {
            run_sequential(source.as_ref(), engine)?
        };

        let classification = classify(&run.domain_maxima, run.cumulative_max);
        Ok(RunOutcome { run, classification })
    }

    /// Runs the pipeline and notifies recipients when the category calls
    /// for it.
    pub fn run_and_notify(
        &mut self,
        now: DateTime<Utc>,
        notifier: &mut dyn Notifier,
    ) -> Result<RunReport, RunFailure> {
        let RunOutcome { run, classification } = self.run(now)?;
        let area = run.area.clone();
        let cycle = run.cycle;

        let notified = dispatch(run, &classification, notifier)
            .map_err(|e| RunFailure::new(&area, None, e))
            .inspect_err(logging::log_run_failure)?;

        logging::log_run_summary(&area, &classification, notified);

        Ok(RunReport { area, cycle, classification, notified })
    }
}

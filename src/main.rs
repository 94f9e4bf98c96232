//! Rain Alerter - single-run command
//!
//! Fetches the latest HRRR cycle for one configured area, folds the hourly
//! precipitation forecast into a run, classifies it and, when rain is
//! expected, queues one message per recipient in the outbox directory.
//! Meant to be invoked by a scheduler after each 00z/12z cycle publishes.
//!
//! Usage:
//!   rain_alerter Peoria                          # run and queue messages in ./outbox
//!   rain_alerter Peoria --dry-run                # print messages instead
//!   rain_alerter Peoria --config /etc/rain_alerter.toml --log-file alerter.log
//!
//! Environment:
//!   RAIN_ALERTER_CONFIG - configuration file path (when --config is not given)

use std::path::PathBuf;
use std::process;

use chrono::Utc;
use clap::Parser;

use rain_alerter::alerter::RainAlerter;
use rain_alerter::config::{config_path, load_config};
use rain_alerter::ingest::decoder::Wgrib2Decoder;
use rain_alerter::ingest::nomads::NomadsSource;
use rain_alerter::logging::{self, DataSource, LogLevel};
use rain_alerter::notify::{Notifier, OutboxNotifier, StdoutNotifier};
use rain_alerter::render::NullRenderer;

#[derive(Parser, Debug)]
#[command(name = "rain_alerter", about = "Send HRRR rain alerts for a configured area")]
struct Args {
    /// Area name, as configured under [areas.<name>]
    area: String,

    /// Configuration file (default: $RAIN_ALERTER_CONFIG, then ./rain_alerter.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory receiving one JSON file per message
    #[arg(long, default_value = "outbox")]
    outbox: PathBuf,

    /// Append log lines to this file as well as the console
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,

    /// Print messages to stdout instead of writing the outbox
    #[arg(long)]
    dry_run: bool,

    /// wgrib2 executable
    #[arg(long, default_value = "wgrib2")]
    wgrib2: PathBuf,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { LogLevel::Debug } else { LogLevel::Info };
    let log_file = args.log_file.as_ref().map(|p| p.to_string_lossy().into_owned());
    if let Err(e) = logging::init_logger(level, log_file.as_deref(), true) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    let path = config_path(args.config.as_deref());
    let settings = match load_config(&path).and_then(|c| c.settings_for(&args.area)) {
        Ok(settings) => settings,
        Err(e) => {
            logging::error(DataSource::Config, Some(&args.area), &format!("{} ({})", e, path.display()));
            process::exit(1);
        }
    };

    let mut alerter = RainAlerter::new(
        settings,
        NomadsSource::builder(Wgrib2Decoder::new(args.wgrib2.clone())),
        Box::new(NullRenderer),
    );

    let mut notifier: Box<dyn Notifier> = if args.dry_run {
        Box::new(StdoutNotifier)
    } else {
        Box::new(OutboxNotifier::new(args.outbox.clone()))
    };

    match alerter.run_and_notify(Utc::now(), notifier.as_mut()) {
        Ok(report) => {
            logging::info(
                DataSource::System,
                Some(&report.area),
                &format!("done: {:?}, {} message(s)", report.classification.category, report.notified),
            );
        }
        Err(failure) => {
            // Already logged with its classification by the alerter.
            eprintln!("Run failed: {}", failure);
            process::exit(1);
        }
    }
}

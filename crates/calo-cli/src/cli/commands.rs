use super::CliError;
use super::helpers::*;
use calo_core::calorimeter::Calorimeter;
use calo_core::domain::{CaloError, ExecutionMode};
use calo_core::event::{EventSummary, RunSummary, load_events, run_events};
use std::path::PathBuf;

#[derive(clap::Args)]
pub(super) struct RunArgs {
    /// Calorimeter configuration (JSON)
    #[arg(long)]
    config: PathBuf,

    /// Event file with particles and tracks (JSON)
    #[arg(long)]
    events: PathBuf,

    /// Base seed; every event derives its own random stream from it
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Process events on the rayon thread pool
    #[arg(long)]
    parallel: bool,

    /// JSON summary report output path
    #[arg(long)]
    report: Option<PathBuf>,

    #[command(flatten)]
    logging: LoggingFlags,
}

#[derive(clap::Args)]
pub(super) struct CheckConfigArgs {
    /// Calorimeter configuration (JSON)
    #[arg(long)]
    config: PathBuf,

    #[command(flatten)]
    logging: LoggingFlags,
}

#[derive(clap::Args, Default)]
pub(super) struct LoggingFlags {
    /// Log at debug level regardless of RUST_LOG
    #[arg(long, short)]
    verbose: bool,
}

pub(super) fn run_events_command(args: RunArgs) -> Result<i32, CliError> {
    init_logging(args.logging.verbose);

    let config = load_config(&args.config)?;
    let calorimeter = Calorimeter::from_config(&config)?;
    let arrays = calorimeter.arrays().clone();

    let events = load_events(&args.events).map_err(CaloError::from)?;
    let stores = events
        .events
        .iter()
        .map(|event| event.to_store(&arrays))
        .collect::<Vec<_>>();

    let mode = if args.parallel {
        ExecutionMode::Parallel
    } else {
        ExecutionMode::Serial
    };
    tracing::debug!(
        events = stores.len(),
        seed = args.seed,
        mode = mode.as_str(),
        "starting calorimeter run"
    );
    let processed = run_events(&calorimeter, stores, args.seed, mode)?;

    let summaries = processed
        .iter()
        .enumerate()
        .map(|(index, store)| EventSummary::from_store(index, store, &arrays))
        .collect::<Vec<_>>();
    let summary = RunSummary::new(args.seed, mode, summaries);

    println!("{}", render_run_summary(&summary));
    if let Some(report) = &args.report {
        write_json_report(report, &summary)?;
        println!("JSON report: {}", report.display());
    }

    Ok(0)
}

pub(super) fn check_config_command(args: CheckConfigArgs) -> Result<i32, CliError> {
    init_logging(args.logging.verbose);

    let config = load_config(&args.config)?;
    let calorimeter = Calorimeter::from_config(&config)?;

    println!("{}", render_calorimeter_layout(&calorimeter, &config));
    Ok(0)
}

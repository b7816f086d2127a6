use super::CliError;
use anyhow::Context;
use calo_core::calorimeter::Calorimeter;
use calo_core::config::{CalorimeterConfig, load_calorimeter_config};
use calo_core::domain::CaloError;
use calo_core::event::RunSummary;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "warn";
const VERBOSE_LOG_FILTER: &str = "debug";

/// Installs the stderr subscriber. Later calls keep the first subscriber.
pub(super) fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub(super) fn load_config(path: &Path) -> Result<CalorimeterConfig, CliError> {
    load_calorimeter_config(path)
        .map_err(CaloError::from)
        .map_err(CliError::Compute)
}

pub(super) fn write_json_report<T: Serialize>(path: &Path, report: &T) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create report directory '{}'", parent.display()))?;
    }
    let content =
        serde_json::to_string_pretty(report).context("failed to serialize JSON report")?;
    fs::write(path, content)
        .with_context(|| format!("failed to write JSON report '{}'", path.display()))?;
    Ok(())
}

pub(super) fn render_run_summary(summary: &RunSummary) -> String {
    let mut lines = vec![
        format!(
            "Processed {} event(s) (seed {}, {} mode)",
            summary.event_count, summary.base_seed, summary.mode
        ),
        format!(
            "Towers: {}  Photons: {}  EFlow tracks: {}  EFlow towers: {}",
            summary.towers, summary.photons, summary.eflow_tracks, summary.eflow_towers
        ),
        format!(
            "Tower energy: {:.6}  EFlow tower energy: {:.6}",
            summary.tower_energy, summary.eflow_tower_energy
        ),
    ];
    lines.extend(summary.events.iter().map(|event| {
        format!(
            "  event {}: {} particle(s), {} track(s) -> {} tower(s), {} photon(s), E = {:.6}",
            event.index,
            event.particles,
            event.tracks,
            event.towers,
            event.photons,
            event.tower_energy
        )
    }));
    lines.join("\n")
}

pub(super) fn render_calorimeter_layout(
    calorimeter: &Calorimeter,
    config: &CalorimeterConfig,
) -> String {
    let grid = calorimeter.grid();
    let eta = grid.eta_boundaries();
    let arrays = calorimeter.arrays();
    [
        "Configuration: OK".to_string(),
        format!(
            "Eta bins: {} over ({}, {})",
            grid.eta_bin_count(),
            eta.first().copied().unwrap_or_default(),
            eta.last().copied().unwrap_or_default()
        ),
        format!("Towers: {}", grid.tower_count()),
        format!(
            "Energy fractions: {} entries (fallback ecal {}, hcal {})",
            calorimeter.fractions().len(),
            calorimeter.fractions().fallback().ecal,
            calorimeter.fractions().fallback().hcal
        ),
        format!("ECal resolution: {}", config.ecal_resolution_formula),
        format!("HCal resolution: {}", config.hcal_resolution_formula),
        format!(
            "Inputs: {}, {}",
            arrays.particle_input, arrays.track_input
        ),
        format!(
            "Outputs: {}, {}, {}, {}",
            arrays.tower_output,
            arrays.photon_output,
            arrays.eflow_track_output,
            arrays.eflow_tower_output
        ),
    ]
    .join("\n")
}

//! JSON configuration of the calorimeter module.

use crate::calorimeter::fractions::{EnergyFractionEntry, EnergyFractionTable, FractionError};
use crate::calorimeter::grid::{EtaPhiBinSpec, GridError, GridIndex};
use crate::domain::CaloError;
use crate::resolution::{FormulaError, ResolutionModel};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PARTICLE_INPUT: &str = "ParticlePropagator/particles";
pub const DEFAULT_TRACK_INPUT: &str = "ParticlePropagator/tracks";
pub const DEFAULT_TOWER_OUTPUT: &str = "towers";
pub const DEFAULT_PHOTON_OUTPUT: &str = "photons";
pub const DEFAULT_EFLOW_TRACK_OUTPUT: &str = "eflowTracks";
pub const DEFAULT_EFLOW_TOWER_OUTPUT: &str = "eflowTowers";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalorimeterConfig {
    pub eta_phi_bins: Vec<EtaPhiBinSpec>,
    pub energy_fractions: Vec<EnergyFractionEntry>,
    pub ecal_resolution_formula: String,
    pub hcal_resolution_formula: String,
    pub arrays: ArrayNames,
}

impl Default for CalorimeterConfig {
    fn default() -> Self {
        Self {
            eta_phi_bins: Vec::new(),
            energy_fractions: Vec::new(),
            ecal_resolution_formula: "0".to_string(),
            hcal_resolution_formula: "0".to_string(),
            arrays: ArrayNames::default(),
        }
    }
}

/// Names of the event arrays the module reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArrayNames {
    pub particle_input: String,
    pub track_input: String,
    pub tower_output: String,
    pub photon_output: String,
    pub eflow_track_output: String,
    pub eflow_tower_output: String,
}

impl Default for ArrayNames {
    fn default() -> Self {
        Self {
            particle_input: DEFAULT_PARTICLE_INPUT.to_string(),
            track_input: DEFAULT_TRACK_INPUT.to_string(),
            tower_output: DEFAULT_TOWER_OUTPUT.to_string(),
            photon_output: DEFAULT_PHOTON_OUTPUT.to_string(),
            eflow_track_output: DEFAULT_EFLOW_TRACK_OUTPUT.to_string(),
            eflow_tower_output: DEFAULT_EFLOW_TOWER_OUTPUT.to_string(),
        }
    }
}

impl CalorimeterConfig {
    pub fn grid(&self) -> Result<GridIndex, CaloError> {
        GridIndex::from_specs(&self.eta_phi_bins).map_err(CaloError::from)
    }

    pub fn fraction_table(&self) -> Result<EnergyFractionTable, CaloError> {
        EnergyFractionTable::from_entries(&self.energy_fractions).map_err(CaloError::from)
    }

    pub fn resolution(&self) -> Result<ResolutionModel, CaloError> {
        ResolutionModel::from_formulas(&self.ecal_resolution_formula, &self.hcal_resolution_formula)
            .map_err(CaloError::from)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read calorimeter configuration '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse calorimeter configuration '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub fn load_calorimeter_config(path: impl AsRef<Path>) -> Result<CalorimeterConfig, ConfigError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = serde_json::from_str(&source).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "loaded calorimeter configuration");
    Ok(config)
}

impl From<ConfigError> for CaloError {
    fn from(error: ConfigError) -> Self {
        match &error {
            ConfigError::Read { .. } => CaloError::io_system("IO.CONFIG_READ", error.to_string()),
            ConfigError::Parse { .. } => {
                CaloError::configuration("CONFIG.PARSE", error.to_string())
            }
        }
    }
}

impl From<GridError> for CaloError {
    fn from(error: GridError) -> Self {
        CaloError::configuration("CONFIG.GRID", error.to_string())
    }
}

impl From<FractionError> for CaloError {
    fn from(error: FractionError) -> Self {
        CaloError::configuration("CONFIG.ENERGY_FRACTIONS", error.to_string())
    }
}

impl From<FormulaError> for CaloError {
    fn from(error: FormulaError) -> Self {
        CaloError::configuration("CONFIG.RESOLUTION_FORMULA", error.to_string())
    }
}

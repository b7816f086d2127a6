use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const FALLBACK_PID: i32 = 0;
pub const DEFAULT_FRACTION: EnergyFraction = EnergyFraction {
    ecal: 0.0,
    hcal: 1.0,
};

const NEGLIGIBLE_FRACTION: f64 = 1.0e-9;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnergyFraction {
    pub ecal: f64,
    pub hcal: f64,
}

impl EnergyFraction {
    pub const fn new(ecal: f64, hcal: f64) -> Self {
        Self { ecal, hcal }
    }

    /// No deposit in either calorimeter; such particles never form hits.
    pub fn is_negligible(&self) -> bool {
        self.ecal < NEGLIGIBLE_FRACTION && self.hcal < NEGLIGIBLE_FRACTION
    }
}

/// Configuration entry `(pid, ecal, hcal)`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct EnergyFractionEntry {
    pub pid: i32,
    pub ecal: f64,
    pub hcal: f64,
}

impl EnergyFractionEntry {
    pub const fn new(pid: i32, ecal: f64, hcal: f64) -> Self {
        Self { pid, ecal, hcal }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FractionError {
    #[error("{calorimeter} fraction for pid {pid} must lie in [0, 1], got {value}")]
    OutOfRange {
        pid: i32,
        calorimeter: &'static str,
        value: f64,
    },
}

/// Per-species split of deposited energy between ECal and HCal, keyed by the
/// absolute particle code.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyFractionTable {
    fractions: HashMap<i32, EnergyFraction>,
}

impl Default for EnergyFractionTable {
    fn default() -> Self {
        Self {
            fractions: HashMap::from([(FALLBACK_PID, DEFAULT_FRACTION)]),
        }
    }
}

impl EnergyFractionTable {
    pub fn from_entries(entries: &[EnergyFractionEntry]) -> Result<Self, FractionError> {
        let mut table = Self::default();
        for entry in entries {
            check_fraction(entry.pid, "ecal", entry.ecal)?;
            check_fraction(entry.pid, "hcal", entry.hcal)?;
            table
                .fractions
                .insert(entry.pid.abs(), EnergyFraction::new(entry.ecal, entry.hcal));
        }
        Ok(table)
    }

    pub fn lookup(&self, pid: i32) -> EnergyFraction {
        self.fractions
            .get(&pid.abs())
            .or_else(|| self.fractions.get(&FALLBACK_PID))
            .copied()
            .unwrap_or(DEFAULT_FRACTION)
    }

    pub fn fallback(&self) -> EnergyFraction {
        self.lookup(FALLBACK_PID)
    }

    pub fn len(&self) -> usize {
        self.fractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fractions.is_empty()
    }
}

fn check_fraction(pid: i32, calorimeter: &'static str, value: f64) -> Result<(), FractionError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(FractionError::OutOfRange {
            pid,
            calorimeter,
            value,
        })
    }
}

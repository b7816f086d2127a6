pub mod errors;
pub mod lorentz;

pub use errors::{CaloError, CaloErrorCategory, CaloResult};
pub use lorentz::LorentzVector;

use std::fmt::{Display, Formatter};
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionMode {
    #[default]
    Serial,
    Parallel,
}

impl ExecutionMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Parallel => "parallel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateOrigin {
    Particle,
    Track,
    Tower,
    EFlowTower,
}

impl CandidateOrigin {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Particle => "particle",
            Self::Track => "track",
            Self::Tower => "tower",
            Self::EFlowTower => "eflow-tower",
        }
    }
}

impl Display for CandidateOrigin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Particle, track or reconstructed calorimeter object.
///
/// Inputs are shared as `Arc<Candidate>` by the upstream producer. Towers keep
/// only weak links to the particles that built them.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub pid: i32,
    pub origin: CandidateOrigin,
    pub position: LorentzVector,
    pub momentum: LorentzVector,
    pub eem: f64,
    pub ehad: f64,
    /// `[eta_lo, eta_hi, phi_lo, phi_hi]` of the tower cell.
    pub edges: [f64; 4],
    constituents: Vec<Weak<Candidate>>,
}

impl Candidate {
    fn input(
        pid: i32,
        origin: CandidateOrigin,
        position: LorentzVector,
        momentum: LorentzVector,
    ) -> Self {
        Self {
            pid,
            origin,
            position,
            momentum,
            eem: 0.0,
            ehad: 0.0,
            edges: [0.0; 4],
            constituents: Vec::new(),
        }
    }

    pub fn particle(pid: i32, position: LorentzVector, momentum: LorentzVector) -> Self {
        Self::input(pid, CandidateOrigin::Particle, position, momentum)
    }

    pub fn track(pid: i32, position: LorentzVector, momentum: LorentzVector) -> Self {
        Self::input(pid, CandidateOrigin::Track, position, momentum)
    }

    pub(crate) fn tower(edges: [f64; 4], constituents: Vec<Weak<Candidate>>) -> Self {
        Self {
            pid: 0,
            origin: CandidateOrigin::Tower,
            position: LorentzVector::default(),
            momentum: LorentzVector::default(),
            eem: 0.0,
            ehad: 0.0,
            edges,
            constituents,
        }
    }

    pub fn constituent_count(&self) -> usize {
        self.constituents.len()
    }

    /// Constituents that are still alive. Dropped inputs are skipped.
    pub fn constituents(&self) -> impl Iterator<Item = Arc<Candidate>> + '_ {
        self.constituents.iter().filter_map(Weak::upgrade)
    }

    pub fn total_energy(&self) -> f64 {
        self.eem + self.ehad
    }
}

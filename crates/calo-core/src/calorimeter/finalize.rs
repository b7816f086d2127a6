//! Turns accumulated towers into output candidates.

use super::tower::TowerAccumulator;
use crate::domain::{Candidate, CandidateOrigin, LorentzVector};
use crate::resolution::{ResolutionModel, smear_log_normal};
use rand::Rng;
use std::sync::Arc;

const MIN_TIME_WEIGHT: f64 = 1.0e-9;

/// The four output streams of one event.
#[derive(Debug, Clone, Default)]
pub struct CalorimeterOutput {
    pub towers: Vec<Arc<Candidate>>,
    /// Subset of `towers`; entries share the same allocation.
    pub photons: Vec<Arc<Candidate>>,
    pub eflow_tracks: Vec<Arc<Candidate>>,
    pub eflow_towers: Vec<Arc<Candidate>>,
}

/// Measured values of one finalized tower, before it is published.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TowerMeasurement {
    pub ecal_energy: f64,
    pub hcal_energy: f64,
    pub ecal_time: f64,
    pub hcal_time: f64,
    pub energy: f64,
    pub time: f64,
    pub eta: f64,
    pub phi: f64,
}

pub struct TowerFinalizer<'a> {
    resolution: &'a ResolutionModel,
}

impl<'a> TowerFinalizer<'a> {
    pub fn new(resolution: &'a ResolutionModel) -> Self {
        Self { resolution }
    }

    /// Smears the deposits and samples a direction inside the cell.
    ///
    /// Random draws happen in a fixed order: ECal smear, HCal smear, eta, phi.
    /// A smear of an empty deposit draws nothing.
    pub fn measure<R: Rng + ?Sized>(&self, tower: &TowerAccumulator, rng: &mut R) -> TowerMeasurement {
        let eta_center = tower.eta_center();

        let ecal_sigma = self.resolution.ecal_sigma(eta_center, tower.ecal.energy);
        let ecal_energy = smear_log_normal(tower.ecal.energy, ecal_sigma, rng);
        let hcal_sigma = self.resolution.hcal_sigma(eta_center, tower.hcal.energy);
        let hcal_energy = smear_log_normal(tower.hcal.energy, hcal_sigma, rng);

        let ecal_time = tower.ecal.mean_time();
        let hcal_time = tower.hcal.mean_time();

        let ecal_weight = ecal_energy.sqrt();
        let hcal_weight = hcal_energy.sqrt();
        let weight = ecal_weight + hcal_weight;
        let time = if weight < MIN_TIME_WEIGHT {
            0.0
        } else {
            (ecal_weight * ecal_time + hcal_weight * hcal_time) / weight
        };

        let [eta_lo, eta_hi, phi_lo, phi_hi] = tower.edges;
        let eta = uniform_between(eta_lo, eta_hi, rng);
        let phi = uniform_between(phi_lo, phi_hi, rng);

        TowerMeasurement {
            ecal_energy,
            hcal_energy,
            ecal_time,
            hcal_time,
            energy: ecal_energy + hcal_energy,
            time,
            eta,
            phi,
        }
    }

    /// Finalizes one tower and appends it to the output streams.
    pub fn finalize<R: Rng + ?Sized>(
        &self,
        tower: TowerAccumulator,
        rng: &mut R,
        output: &mut CalorimeterOutput,
    ) -> TowerMeasurement {
        let measurement = self.measure(&tower, rng);
        let TowerMeasurement {
            ecal_energy,
            hcal_energy,
            energy,
            time,
            eta,
            phi,
            ..
        } = measurement;

        let mut candidate = Candidate::tower(tower.edges, tower.constituents);
        candidate.position = LorentzVector::from_pt_eta_phi_e(1.0, eta, phi, time);
        candidate.momentum = LorentzVector::from_pt_eta_phi_e(energy / eta.cosh(), eta, phi, energy);
        candidate.eem = ecal_energy;
        candidate.ehad = hcal_energy;

        let ecal_residual = (ecal_energy - tower.track_ecal.energy).max(0.0);
        let hcal_residual = (hcal_energy - tower.track_hcal.energy).max(0.0);
        let residual = ecal_residual + hcal_residual;
        let eflow_tower = (residual > 0.0).then(|| {
            let mut eflow = candidate.clone();
            eflow.origin = CandidateOrigin::EFlowTower;
            eflow.momentum =
                LorentzVector::from_pt_eta_phi_e(residual / eta.cosh(), eta, phi, residual);
            eflow.eem = ecal_residual;
            eflow.ehad = hcal_residual;
            eflow
        });

        if energy > 0.0 {
            let candidate = Arc::new(candidate);
            if tower.photon_hits > 0 && tower.track_hits == 0 {
                output.photons.push(Arc::clone(&candidate));
            }
            output.towers.push(candidate);
        }

        output.eflow_tracks.extend(tower.tracks);

        if let Some(eflow) = eflow_tower {
            output.eflow_towers.push(Arc::new(eflow));
        }

        measurement
    }
}

fn uniform_between<R: Rng + ?Sized>(lo: f64, hi: f64, rng: &mut R) -> f64 {
    if hi > lo { rng.gen_range(lo..hi) } else { lo }
}

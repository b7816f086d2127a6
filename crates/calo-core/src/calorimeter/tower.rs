//! Streaming aggregation of sorted tower hits.

use super::grid::{GridIndex, TowerCell};
use super::hits::{HitFractions, TowerHit};
use crate::domain::{Candidate, CandidateOrigin};
use std::sync::{Arc, Weak};

const MIN_TIME_WEIGHT: f64 = 1.0e-9;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggregationError {
    #[error("hit references cell ({eta_bin}, {phi_bin}) outside the tower grid")]
    UnknownCell { eta_bin: u16, phi_bin: u16 },
    #[error("hit references {origin} {index}, but only {available} were supplied")]
    MissingSource {
        origin: CandidateOrigin,
        index: usize,
        available: usize,
    },
}

/// Energy deposited in one calorimeter together with its sqrt(E)-weighted
/// time sum.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Deposit {
    pub energy: f64,
    pub time_sum: f64,
    pub time_weight: f64,
}

impl Deposit {
    pub fn add(&mut self, energy: f64, time: f64) {
        let weight = energy.sqrt();
        self.energy += energy;
        self.time_sum += weight * time;
        self.time_weight += weight;
    }

    pub fn mean_time(&self) -> f64 {
        if self.time_weight < MIN_TIME_WEIGHT {
            0.0
        } else {
            self.time_sum / self.time_weight
        }
    }
}

/// Running sums of one tower. Track deposits are kept apart from the
/// calorimeter deposits so they can be subtracted for energy flow.
#[derive(Debug, Clone)]
pub struct TowerAccumulator {
    pub cell: TowerCell,
    pub edges: [f64; 4],
    pub ecal: Deposit,
    pub hcal: Deposit,
    pub track_ecal: Deposit,
    pub track_hcal: Deposit,
    pub track_hits: usize,
    pub photon_hits: usize,
    pub tracks: Vec<Arc<Candidate>>,
    pub constituents: Vec<Weak<Candidate>>,
}

impl TowerAccumulator {
    pub fn new(cell: TowerCell, edges: [f64; 4]) -> Self {
        Self {
            cell,
            edges,
            ecal: Deposit::default(),
            hcal: Deposit::default(),
            track_ecal: Deposit::default(),
            track_hcal: Deposit::default(),
            track_hits: 0,
            photon_hits: 0,
            tracks: Vec::new(),
            constituents: Vec::new(),
        }
    }

    pub fn eta_center(&self) -> f64 {
        0.5 * (self.edges[0] + self.edges[1])
    }

    pub fn phi_center(&self) -> f64 {
        0.5 * (self.edges[2] + self.edges[3])
    }
}

#[derive(Debug)]
enum AggregatorState {
    NoActiveTower,
    AccumulatingTower { tower_id: u32, tower: TowerAccumulator },
}

pub struct TowerAggregator<'a> {
    grid: &'a GridIndex,
    particles: &'a [Arc<Candidate>],
    tracks: &'a [Arc<Candidate>],
    fractions: &'a HitFractions,
    state: AggregatorState,
}

impl<'a> TowerAggregator<'a> {
    pub fn new(
        grid: &'a GridIndex,
        particles: &'a [Arc<Candidate>],
        tracks: &'a [Arc<Candidate>],
        fractions: &'a HitFractions,
    ) -> Self {
        Self {
            grid,
            particles,
            tracks,
            fractions,
            state: AggregatorState::NoActiveTower,
        }
    }

    /// Adds one hit; hits must arrive in ascending key order. Returns the
    /// previous tower when this hit opens a new one.
    pub fn push(&mut self, hit: TowerHit) -> Result<Option<TowerAccumulator>, AggregationError> {
        let tower_id = hit.tower_id();
        let (finished, mut tower) =
            match std::mem::replace(&mut self.state, AggregatorState::NoActiveTower) {
                AggregatorState::AccumulatingTower {
                    tower_id: active,
                    tower,
                } if active == tower_id => (None, tower),
                previous => {
                    let cell = hit.cell();
                    let edges = self.grid.edges(cell).ok_or(AggregationError::UnknownCell {
                        eta_bin: cell.eta_bin,
                        phi_bin: cell.phi_bin,
                    })?;
                    let finished = match previous {
                        AggregatorState::AccumulatingTower { tower, .. } => Some(tower),
                        AggregatorState::NoActiveTower => None,
                    };
                    (finished, TowerAccumulator::new(cell, edges))
                }
            };

        self.accumulate(&mut tower, hit)?;
        self.state = AggregatorState::AccumulatingTower { tower_id, tower };
        Ok(finished)
    }

    fn accumulate(&self, tower: &mut TowerAccumulator, hit: TowerHit) -> Result<(), AggregationError> {
        let number = hit.number();
        if hit.is_track() {
            let track = source(self.tracks, number, CandidateOrigin::Track)?;
            let fraction = self.fractions.tracks.get(number).copied().unwrap_or_default();
            let energy = track.momentum.energy();
            let time = track.position.time();

            tower.track_ecal.add(energy * fraction.ecal, time);
            tower.track_hcal.add(energy * fraction.hcal, time);
            tower.track_hits += 1;
            tower.tracks.push(Arc::clone(track));
        } else {
            let particle = source(self.particles, number, CandidateOrigin::Particle)?;
            let fraction = self.fractions.particles.get(number).copied().unwrap_or_default();
            let energy = particle.momentum.energy();
            let time = particle.position.time();

            tower.ecal.add(energy * fraction.ecal, time);
            tower.hcal.add(energy * fraction.hcal, time);
            tower.constituents.push(Arc::downgrade(particle));
            if hit.is_photon_like() {
                tower.photon_hits += 1;
            }
        }

        Ok(())
    }

    /// Hands out the last active tower, if any.
    pub fn finish(self) -> Option<TowerAccumulator> {
        match self.state {
            AggregatorState::AccumulatingTower { tower, .. } => Some(tower),
            AggregatorState::NoActiveTower => None,
        }
    }
}

fn source<'c>(
    candidates: &'c [Arc<Candidate>],
    index: usize,
    origin: CandidateOrigin,
) -> Result<&'c Arc<Candidate>, AggregationError> {
    candidates
        .get(index)
        .ok_or(AggregationError::MissingSource {
            origin,
            index,
            available: candidates.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::{AggregationError, Deposit, TowerAggregator};
    use crate::calorimeter::fractions::EnergyFraction;
    use crate::calorimeter::grid::{GridIndex, TowerCell};
    use crate::calorimeter::hits::{HitFractions, PHOTON_FLAG, TRACK_FLAG, TowerHit};
    use crate::domain::{Candidate, LorentzVector};
    use std::sync::Arc;

    fn grid() -> GridIndex {
        GridIndex::uniform(&[-1.0, 0.0, 1.0], &[-1.0, 0.0, 1.0]).expect("grid should build")
    }

    fn candidate(energy: f64, time: f64, track: bool) -> Arc<Candidate> {
        let position = LorentzVector::new(1.0, 0.0, 0.0, time);
        let momentum = LorentzVector::new(0.0, 0.0, 0.0, energy);
        Arc::new(if track {
            Candidate::track(211, position, momentum)
        } else {
            Candidate::particle(22, position, momentum)
        })
    }

    fn cell(eta_bin: u16, phi_bin: u16) -> TowerCell {
        TowerCell { eta_bin, phi_bin }
    }

    #[test]
    fn deposit_time_is_sqrt_energy_weighted() {
        let mut deposit = Deposit::default();
        deposit.add(4.0, 1.0);
        deposit.add(16.0, 4.0);

        assert_eq!(deposit.energy, 20.0);
        assert!((deposit.mean_time() - 3.0).abs() < 1e-12);
        assert_eq!(Deposit::default().mean_time(), 0.0);
    }

    #[test]
    fn towers_are_emitted_on_transition_and_finish() {
        let grid = grid();
        let particles = vec![candidate(4.0, 1.0, false), candidate(9.0, 2.0, false)];
        let tracks = vec![candidate(1.0, 0.5, true)];
        let fractions = HitFractions {
            particles: vec![EnergyFraction::new(1.0, 0.0), EnergyFraction::new(0.5, 0.5)],
            tracks: vec![EnergyFraction::new(0.0, 1.0)],
        };

        let mut aggregator = TowerAggregator::new(&grid, &particles, &tracks, &fractions);
        let hits = [
            TowerHit::pack(cell(1, 1), PHOTON_FLAG, 0).unwrap(),
            TowerHit::pack(cell(2, 2), 0, 1).unwrap(),
            TowerHit::pack(cell(2, 2), TRACK_FLAG, 0).unwrap(),
        ];

        assert!(aggregator.push(hits[0]).unwrap().is_none());
        let first = aggregator
            .push(hits[1])
            .unwrap()
            .expect("first tower closes when the second opens");
        assert!(aggregator.push(hits[2]).unwrap().is_none());
        let second = aggregator.finish().expect("last tower is handed out");

        assert_eq!(first.cell, cell(1, 1));
        assert_eq!(first.edges, [-1.0, 0.0, -1.0, 0.0]);
        assert_eq!(first.ecal.energy, 4.0);
        assert_eq!(first.hcal.energy, 0.0);
        assert_eq!(first.photon_hits, 1);
        assert_eq!(first.constituents.len(), 1);

        assert_eq!(second.ecal.energy, 4.5);
        assert_eq!(second.hcal.energy, 4.5);
        assert_eq!(second.track_hcal.energy, 1.0);
        assert_eq!(second.track_ecal.energy, 0.0);
        assert_eq!(second.track_hits, 1);
        assert_eq!(second.photon_hits, 0);
        assert_eq!(second.tracks.len(), 1);
        assert!((second.ecal.mean_time() - 2.0).abs() < 1e-12);
        assert!((second.track_hcal.mean_time() - 0.5).abs() < 1e-12);
        assert_eq!(second.eta_center(), 0.5);
        assert_eq!(second.phi_center(), 0.5);
    }

    #[test]
    fn empty_input_finishes_without_tower() {
        let grid = grid();
        let fractions = HitFractions::default();
        let aggregator = TowerAggregator::new(&grid, &[], &[], &fractions);
        assert!(aggregator.finish().is_none());
    }

    #[test]
    fn dangling_hits_are_reported() {
        let grid = grid();
        let fractions = HitFractions::default();
        let mut aggregator = TowerAggregator::new(&grid, &[], &[], &fractions);

        assert!(matches!(
            aggregator.push(TowerHit::pack(cell(7, 1), 0, 0).unwrap()),
            Err(AggregationError::UnknownCell { eta_bin: 7, .. })
        ));
        assert!(matches!(
            aggregator.push(TowerHit::pack(cell(1, 1), 0, 3).unwrap()),
            Err(AggregationError::MissingSource { index: 3, .. })
        ));
    }
}

//! Calorimeter tower reconstruction.
//!
//! Particles and tracks are encoded into sorted tower hits, the hits of each
//! tower are summed, and every tower is smeared and published into the tower,
//! photon and energy-flow streams.

pub mod finalize;
pub mod fractions;
pub mod grid;
pub mod hits;
pub mod tower;

pub use finalize::{CalorimeterOutput, TowerFinalizer, TowerMeasurement};
pub use fractions::{EnergyFraction, EnergyFractionEntry, EnergyFractionTable, FractionError};
pub use grid::{EtaPhiBinSpec, GridError, GridIndex, TowerCell};
pub use hits::{EncodedHits, EncodingStats, HitEncoder, HitEncodingError, HitFractions, TowerHit};
pub use tower::{AggregationError, Deposit, TowerAccumulator, TowerAggregator};

use crate::config::{ArrayNames, CalorimeterConfig};
use crate::domain::{CaloError, CaloResult, Candidate};
use crate::event::{EventModule, EventStore};
use crate::resolution::ResolutionModel;
use rand::{Rng, RngCore};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Calorimeter {
    grid: GridIndex,
    fractions: EnergyFractionTable,
    resolution: ResolutionModel,
    arrays: ArrayNames,
}

impl Calorimeter {
    pub fn new(grid: GridIndex, fractions: EnergyFractionTable, resolution: ResolutionModel) -> Self {
        Self {
            grid,
            fractions,
            resolution,
            arrays: ArrayNames::default(),
        }
    }

    pub fn with_arrays(mut self, arrays: ArrayNames) -> Self {
        self.arrays = arrays;
        self
    }

    pub fn from_config(config: &CalorimeterConfig) -> CaloResult<Self> {
        let calorimeter = Self::new(config.grid()?, config.fraction_table()?, config.resolution()?)
            .with_arrays(config.arrays.clone());
        tracing::info!(
            eta_bins = calorimeter.grid.eta_bin_count(),
            towers = calorimeter.grid.tower_count(),
            fractions = calorimeter.fractions.len(),
            "calorimeter configured"
        );
        Ok(calorimeter)
    }

    pub fn grid(&self) -> &GridIndex {
        &self.grid
    }

    pub fn fractions(&self) -> &EnergyFractionTable {
        &self.fractions
    }

    pub fn resolution(&self) -> &ResolutionModel {
        &self.resolution
    }

    pub fn arrays(&self) -> &ArrayNames {
        &self.arrays
    }

    /// Builds the four output streams of one event.
    pub fn reconstruct<R: Rng + ?Sized>(
        &self,
        particles: &[Arc<Candidate>],
        tracks: &[Arc<Candidate>],
        rng: &mut R,
    ) -> CaloResult<CalorimeterOutput> {
        let encoded = HitEncoder::new(&self.grid, &self.fractions).encode(particles, tracks)?;
        let EncodingStats {
            encoded: hits,
            skipped_negligible,
            skipped_out_of_range,
        } = encoded.stats;
        tracing::debug!(
            particles = particles.len(),
            tracks = tracks.len(),
            hits,
            skipped_negligible,
            skipped_out_of_range,
            "encoded tower hits"
        );

        let finalizer = TowerFinalizer::new(&self.resolution);
        let mut aggregator = TowerAggregator::new(&self.grid, particles, tracks, &encoded.fractions);
        let mut output = CalorimeterOutput::default();

        for &hit in &encoded.hits {
            if let Some(tower) = aggregator.push(hit)? {
                publish(&finalizer, tower, rng, &mut output);
            }
        }
        if let Some(tower) = aggregator.finish() {
            publish(&finalizer, tower, rng, &mut output);
        }

        tracing::debug!(
            towers = output.towers.len(),
            photons = output.photons.len(),
            eflow_tracks = output.eflow_tracks.len(),
            eflow_towers = output.eflow_towers.len(),
            "reconstructed calorimeter towers"
        );
        Ok(output)
    }
}

fn publish<R: Rng + ?Sized>(
    finalizer: &TowerFinalizer<'_>,
    tower: TowerAccumulator,
    rng: &mut R,
    output: &mut CalorimeterOutput,
) {
    let cell = tower.cell;
    let measurement = finalizer.finalize(tower, rng, output);
    tracing::trace!(
        eta_bin = cell.eta_bin,
        phi_bin = cell.phi_bin,
        ecal = measurement.ecal_energy,
        hcal = measurement.hcal_energy,
        time = measurement.time,
        "finalized tower"
    );
}

impl EventModule for Calorimeter {
    fn name(&self) -> &str {
        "Calorimeter"
    }

    fn process(&self, store: &mut EventStore, rng: &mut dyn RngCore) -> CaloResult<()> {
        let particles = store.import(&self.arrays.particle_input)?.to_vec();
        let tracks = store.import(&self.arrays.track_input)?.to_vec();

        let output = self.reconstruct(&particles, &tracks, rng)?;

        store.export(&self.arrays.tower_output, output.towers);
        store.export(&self.arrays.photon_output, output.photons);
        store.export(&self.arrays.eflow_track_output, output.eflow_tracks);
        store.export(&self.arrays.eflow_tower_output, output.eflow_towers);
        Ok(())
    }
}

impl From<HitEncodingError> for CaloError {
    fn from(error: HitEncodingError) -> Self {
        CaloError::input_validation("EVENT.HIT_INDEX_OVERFLOW", error.to_string())
    }
}

impl From<AggregationError> for CaloError {
    fn from(error: AggregationError) -> Self {
        CaloError::internal("CALO.AGGREGATION", error.to_string())
    }
}

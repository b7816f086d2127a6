//! Multi-event processing with per-event random streams.

use super::store::EventStore;
use super::traits::EventModule;
use crate::config::ArrayNames;
use crate::domain::{CaloResult, Candidate, ExecutionMode};
use crate::numerics::stable_sum;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;

/// Seed of event `index`, mixed from the run seed so neighbouring events get
/// unrelated streams.
pub fn derive_event_seed(base_seed: u64, index: u64) -> u64 {
    let mut z = base_seed.wrapping_add(index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

pub fn process_event<M>(
    module: &M,
    store: &mut EventStore,
    base_seed: u64,
    index: usize,
) -> CaloResult<()>
where
    M: EventModule + ?Sized,
{
    let mut rng = StdRng::seed_from_u64(derive_event_seed(base_seed, index as u64));
    module.process(store, &mut rng)?;
    tracing::debug!(module = module.name(), event = index, "processed event");
    Ok(())
}

/// Runs `module` over every event. Results are in input order and do not
/// depend on `mode`. The first failing event aborts the run.
pub fn run_events<M>(
    module: &M,
    mut events: Vec<EventStore>,
    base_seed: u64,
    mode: ExecutionMode,
) -> CaloResult<Vec<EventStore>>
where
    M: EventModule + ?Sized,
{
    match mode {
        ExecutionMode::Serial => events
            .iter_mut()
            .enumerate()
            .try_for_each(|(index, store)| process_event(module, store, base_seed, index))?,
        ExecutionMode::Parallel => events
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(index, store)| process_event(module, store, base_seed, index))?,
    }
    Ok(events)
}

/// Candidate counts and energy totals of one processed event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub index: usize,
    pub particles: usize,
    pub tracks: usize,
    pub towers: usize,
    pub photons: usize,
    pub eflow_tracks: usize,
    pub eflow_towers: usize,
    pub tower_energy: f64,
    pub photon_energy: f64,
    pub eflow_track_energy: f64,
    pub eflow_tower_energy: f64,
}

impl EventSummary {
    pub fn from_store(index: usize, store: &EventStore, arrays: &ArrayNames) -> Self {
        let array = |name: &str| store.array(name).unwrap_or_default();
        let energy = |name: &str| stream_energy(array(name));

        Self {
            index,
            particles: array(&arrays.particle_input).len(),
            tracks: array(&arrays.track_input).len(),
            towers: array(&arrays.tower_output).len(),
            photons: array(&arrays.photon_output).len(),
            eflow_tracks: array(&arrays.eflow_track_output).len(),
            eflow_towers: array(&arrays.eflow_tower_output).len(),
            tower_energy: energy(&arrays.tower_output),
            photon_energy: energy(&arrays.photon_output),
            eflow_track_energy: energy(&arrays.eflow_track_output),
            eflow_tower_energy: energy(&arrays.eflow_tower_output),
        }
    }
}

fn stream_energy(candidates: &[Arc<Candidate>]) -> f64 {
    stable_sum(candidates.iter().map(|candidate| candidate.momentum.energy()))
}

/// Totals over a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub base_seed: u64,
    pub mode: String,
    pub event_count: usize,
    pub towers: usize,
    pub photons: usize,
    pub eflow_tracks: usize,
    pub eflow_towers: usize,
    pub tower_energy: f64,
    pub eflow_tower_energy: f64,
    pub events: Vec<EventSummary>,
}

impl RunSummary {
    pub fn new(base_seed: u64, mode: ExecutionMode, events: Vec<EventSummary>) -> Self {
        Self {
            base_seed,
            mode: mode.as_str().to_string(),
            event_count: events.len(),
            towers: events.iter().map(|event| event.towers).sum(),
            photons: events.iter().map(|event| event.photons).sum(),
            eflow_tracks: events.iter().map(|event| event.eflow_tracks).sum(),
            eflow_towers: events.iter().map(|event| event.eflow_towers).sum(),
            tower_energy: stable_sum(events.iter().map(|event| event.tower_energy)),
            eflow_tower_energy: stable_sum(events.iter().map(|event| event.eflow_tower_energy)),
            events,
        }
    }
}

//! JSON event files.

use super::store::EventStore;
use crate::config::ArrayNames;
use crate::domain::{CaloError, Candidate, LorentzVector};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct CandidateRecord {
    pub pid: i32,
    pub position: LorentzVector,
    pub momentum: LorentzVector,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EventRecord {
    #[serde(default)]
    pub particles: Vec<CandidateRecord>,
    #[serde(default)]
    pub tracks: Vec<CandidateRecord>,
}

impl EventRecord {
    /// Store holding the particles and tracks under the configured input names.
    pub fn to_store(&self, arrays: &ArrayNames) -> EventStore {
        let mut store = EventStore::new();
        store.export(
            &arrays.particle_input,
            self.particles.iter().map(|record| {
                Arc::new(Candidate::particle(
                    record.pid,
                    record.position,
                    record.momentum,
                ))
            }),
        );
        store.export(
            &arrays.track_input,
            self.tracks.iter().map(|record| {
                Arc::new(Candidate::track(record.pid, record.position, record.momentum))
            }),
        );
        store
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EventFile {
    pub events: Vec<EventRecord>,
}

#[derive(Debug, thiserror::Error)]
pub enum EventInputError {
    #[error("failed to read event file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse event file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<EventInputError> for CaloError {
    fn from(error: EventInputError) -> Self {
        match &error {
            EventInputError::Read { .. } => {
                CaloError::io_system("IO.EVENTS_READ", error.to_string())
            }
            EventInputError::Parse { .. } => {
                CaloError::input_validation("INPUT.EVENTS_PARSE", error.to_string())
            }
        }
    }
}

pub fn load_events(path: impl AsRef<Path>) -> Result<EventFile, EventInputError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| EventInputError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let events: EventFile =
        serde_json::from_str(&source).map_err(|source| EventInputError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::info!(
        path = %path.display(),
        events = events.events.len(),
        "loaded event file"
    );
    Ok(events)
}

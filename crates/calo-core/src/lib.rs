pub mod calorimeter;
pub mod config;
pub mod domain;
pub mod event;
pub mod numerics;
pub mod resolution;

pub use calorimeter::{Calorimeter, CalorimeterOutput};
pub use config::{CalorimeterConfig, ConfigError, load_calorimeter_config};
pub use domain::{CaloError, CaloErrorCategory, CaloResult, Candidate, CandidateOrigin, ExecutionMode};
pub use event::{EventModule, EventStore, run_events};

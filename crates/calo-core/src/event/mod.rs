pub mod input;
pub mod runner;
pub mod store;

mod traits;

pub use input::{CandidateRecord, EventFile, EventInputError, EventRecord, load_events};
pub use runner::{EventSummary, RunSummary, derive_event_seed, process_event, run_events};
pub use store::EventStore;
pub use traits::EventModule;

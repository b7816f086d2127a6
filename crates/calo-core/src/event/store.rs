use crate::domain::{CaloError, CaloResult, Candidate};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Named candidate arrays of one event.
///
/// Arrays are append-only: modules read their inputs through [`EventStore::import`]
/// and publish through [`EventStore::export`].
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    arrays: BTreeMap<String, Vec<Arc<Candidate>>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Input array `name`; a missing array is an input validation error.
    pub fn import(&self, name: &str) -> CaloResult<&[Arc<Candidate>]> {
        self.arrays.get(name).map(Vec::as_slice).ok_or_else(|| {
            CaloError::input_validation(
                "EVENT.MISSING_ARRAY",
                format!("event has no array named '{name}'"),
            )
        })
    }

    /// Appends to array `name`, creating it when absent.
    pub fn export(&mut self, name: &str, candidates: impl IntoIterator<Item = Arc<Candidate>>) {
        self.arrays
            .entry(name.to_string())
            .or_default()
            .extend(candidates);
    }

    pub fn array(&self, name: &str) -> Option<&[Arc<Candidate>]> {
        self.arrays.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::EventStore;
    use crate::domain::{CaloErrorCategory, Candidate, LorentzVector};
    use std::sync::Arc;

    fn particle(energy: f64) -> Arc<Candidate> {
        Arc::new(Candidate::particle(
            22,
            LorentzVector::default(),
            LorentzVector::new(0.0, 0.0, 0.0, energy),
        ))
    }

    #[test]
    fn export_appends_and_import_reads_back() {
        let mut store = EventStore::new();
        store.export("particles", [particle(1.0)]);
        store.export("particles", [particle(2.0), particle(3.0)]);
        store.export("empty", []);

        let energies = store
            .import("particles")
            .expect("array should exist")
            .iter()
            .map(|candidate| candidate.momentum.energy())
            .collect::<Vec<_>>();
        assert_eq!(energies, vec![1.0, 2.0, 3.0]);
        assert_eq!(store.array("empty").map(<[_]>::len), Some(0));
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["empty", "particles"]);
    }

    #[test]
    fn missing_input_is_an_input_validation_error() {
        let store = EventStore::new();
        let error = store.import("tracks").expect_err("array is missing");
        assert_eq!(error.category(), CaloErrorCategory::InputValidationError);
        assert_eq!(error.placeholder(), "EVENT.MISSING_ARRAY");
        assert!(store.array("tracks").is_none());
    }
}

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

pub type Generation = u64;

/// Monotonic request numbers per (document, field). A response is applied only
/// when its generation is still the latest issued for its key.
#[derive(Debug, Default)]
pub struct GenerationTracker {
    counter: AtomicU64,
    latest: DashMap<(String, String), Generation>,
}

impl GenerationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, document: &str, field: &str) -> Generation {
        let generation = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.latest
            .entry((document.to_string(), field.to_string()))
            .and_modify(|g| *g = (*g).max(generation))
            .or_insert(generation);
        generation
    }

    pub fn is_current(&self, document: &str, field: &str, generation: Generation) -> bool {
        self.latest
            .get(&(document.to_string(), field.to_string()))
            .is_some_and(|latest| *latest == generation)
    }

    /// Drop every key of a closed document.
    pub fn forget(&self, document: &str) {
        self.latest.retain(|(doc, _), _| doc != document);
    }

    pub fn tracked_keys(&self) -> usize {
        self.latest.len()
    }
}

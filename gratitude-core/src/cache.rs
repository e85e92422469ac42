//! Session-scoped record cache.
//!
//! The cache is filled by one bulk fetch and only ever cleared as a whole.
//! Once hydrated, even with nothing, a missing key means "no record" and the
//! backend is not asked again until the next clear. Every clear bumps the
//! epoch; a hydration that started under an older epoch is dropped instead of
//! merged, so a clear that races an in-flight fetch stays cleared.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::backend::LicenseBackend;
use crate::error::Result;
use crate::record::{AcquisitionRecord, parse_payload};
use crate::resolver::resolve;

/// Owned result of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedMatch {
    pub key: String,
    pub record: AcquisitionRecord,
    pub exact: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationOutcome {
    /// The mapping was replaced with `entries` records.
    Hydrated { entries: usize },
    /// The backend answered with nothing usable. The cache still counts as
    /// hydrated, holding no records.
    Empty,
    /// The cache was cleared while the fetch was in flight.
    Discarded,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, AcquisitionRecord>,
    hydrated: bool,
    epoch: u64,
}

#[derive(Default)]
pub struct RecordCache {
    state: Mutex<CacheState>,
}

impl fmt::Debug for RecordCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RecordCache")
            .field("entries", &state.entries.len())
            .field("hydrated", &state.hydrated)
            .field("epoch", &state.epoch)
            .finish()
    }
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, name: &str, min_match_length: usize) -> Option<CachedMatch> {
        let state = self.state.lock();
        match resolve(&state.entries, name, min_match_length) {
            Some(found) => {
                debug!(game = name, key = found.key, exact = found.exact, "cache HIT");
                Some(CachedMatch {
                    key: found.key.to_string(),
                    record: found.record.clone(),
                    exact: found.exact,
                })
            }
            None => {
                debug!(game = name, "cache MISS");
                None
            }
        }
    }

    /// Fetch the full record set and replace the mapping with it.
    ///
    /// Transport failures propagate and leave the cache unhydrated; payload
    /// problems degrade to [`HydrationOutcome::Empty`].
    pub async fn hydrate(&self, backend: &dyn LicenseBackend) -> Result<HydrationOutcome> {
        let epoch = self.epoch();
        let payload = backend.fetch_all().await?;
        let records = parse_payload(payload.as_deref());
        Ok(self.merge(epoch, records))
    }

    /// Install `records` fetched under `epoch`.
    pub fn merge(
        &self,
        epoch: u64,
        records: HashMap<String, AcquisitionRecord>,
    ) -> HydrationOutcome {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            debug!(
                started = epoch,
                current = state.epoch,
                "cache cleared during hydration; dropping fetched records"
            );
            return HydrationOutcome::Discarded;
        }

        let entries = records.len();
        state.entries = records;
        state.hydrated = true;

        if entries == 0 {
            info!("license cache hydrated with no records");
            return HydrationOutcome::Empty;
        }
        info!(entries, "license cache hydrated");
        HydrationOutcome::Hydrated { entries }
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.hydrated = false;
        state.epoch = state.epoch.wrapping_add(1);
        debug!(epoch = state.epoch, "license cache cleared");
    }

    pub fn is_hydrated(&self) -> bool {
        self.state.lock().hydrated
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::resolver::DEFAULT_MIN_MATCH_LENGTH;

    const PAYLOAD: &str = r#"{"Dota 2 - Gift": {"date": "9 Jul, 2013", "acquisition": "Gift/Guest Pass"}}"#;

    #[tokio::test]
    async fn hydrate_replaces_mapping() {
        let cache = RecordCache::new();
        let backend = MemoryBackend::with_payload(PAYLOAD);

        let outcome = cache.hydrate(&backend).await.expect("hydrate");

        assert_eq!(outcome, HydrationOutcome::Hydrated { entries: 1 });
        assert!(cache.is_hydrated());
        let found = cache
            .lookup("Dota 2", DEFAULT_MIN_MATCH_LENGTH)
            .expect("fuzzy hit");
        assert_eq!(found.key, "Dota 2 - Gift");
        assert!(!found.exact);
    }

    #[tokio::test]
    async fn absent_payload_hydrates_to_empty() {
        let cache = RecordCache::new();
        let backend = MemoryBackend::new();

        let outcome = cache.hydrate(&backend).await.expect("hydrate");

        assert_eq!(outcome, HydrationOutcome::Empty);
        assert!(cache.is_hydrated());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_hydrates_to_empty() {
        let cache = RecordCache::new();
        let backend = MemoryBackend::with_payload(r#"{"Dota 2": 42, "Hades": {"date": 1}}"#);

        let outcome = cache.hydrate(&backend).await.expect("hydrate");

        assert_eq!(outcome, HydrationOutcome::Empty);
        assert!(cache.is_hydrated());
        assert!(cache.lookup("Dota 2", DEFAULT_MIN_MATCH_LENGTH).is_none());
    }

    #[tokio::test]
    async fn backend_failure_propagates() {
        let cache = RecordCache::new();
        let backend = MemoryBackend::with_payload(PAYLOAD);
        backend.fail_next("connection reset");

        assert!(cache.hydrate(&backend).await.is_err());
        assert!(!cache.is_hydrated());
    }

    #[test]
    fn merge_under_stale_epoch_is_discarded() {
        let cache = RecordCache::new();
        let epoch = cache.epoch();
        cache.clear();

        let records = parse_payload(Some(PAYLOAD));
        assert_eq!(cache.merge(epoch, records), HydrationOutcome::Discarded);
        assert!(cache.lookup("Dota 2", DEFAULT_MIN_MATCH_LENGTH).is_none());
        assert!(!cache.is_hydrated());
    }

    #[test]
    fn clear_drops_entries_and_hydration() {
        let cache = RecordCache::new();
        cache.merge(cache.epoch(), parse_payload(Some(PAYLOAD)));
        assert_eq!(cache.len(), 1);

        cache.clear();

        assert_eq!(cache.len(), 0);
        assert!(!cache.is_hydrated());
        assert_eq!(cache.epoch(), 1);
    }
}

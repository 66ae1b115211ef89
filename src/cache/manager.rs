//! Read-through chain cache
//!
//! One slot per document, each behind its own mutex. A slot lock is held
//! for the whole load-and-replace of a rebuild and for every `put`, so a
//! rebuild can never overwrite a node committed concurrently.
//!
//! No TTL: entries live until cleared.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::debug;

use crate::chain::RevisionChain;
use crate::model::RevisionNode;
use crate::observability::Event;

type Slot = Arc<Mutex<Option<RevisionChain>>>;

/// Hit and rebuild counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub rebuilds: u64,
    pub documents: usize,
}

/// Process-wide mapping document_id → revision chain.
#[derive(Debug, Default)]
pub struct ChainCache {
    slots: Mutex<HashMap<String, Slot>>,
    hits: AtomicU64,
    rebuilds: AtomicU64,
}

// Slot contents are replaced wholesale, so a poisoned lock still guards a
// consistent value.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ChainCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, document_id: &str) -> Slot {
        let mut slots = lock(&self.slots);
        Arc::clone(slots.entry(document_id.to_string()).or_default())
    }

    fn existing_slot(&self, document_id: &str) -> Option<Slot> {
        lock(&self.slots).get(document_id).cloned()
    }

    /// Drops the slot of `document_id` if it is empty and nobody else holds
    /// it. Slots are only cloned under the map lock, so the count is exact.
    fn prune(&self, document_id: &str, slot: Slot) {
        let mut slots = lock(&self.slots);
        if Arc::strong_count(&slot) == 2 && lock(&slot).is_none() {
            slots.remove(document_id);
        }
    }

    /// Returns the cached chain, rebuilding it from `load` when forced or
    /// absent.
    ///
    /// `load` returns every stored node of the document; ordering is
    /// re-established here. A failed load leaves the slot untouched. Empty
    /// chains are returned but not cached.
    pub fn get<E, F>(&self, document_id: &str, force_rebuild: bool, load: F) -> Result<RevisionChain, E>
    where
        F: FnOnce() -> Result<Vec<RevisionNode>, E>,
    {
        let slot = self.slot(document_id);
        let mut entry = lock(&slot);

        if !force_rebuild {
            if let Some(chain) = entry.as_ref() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(chain.clone());
            }
        }

        let loaded = match load() {
            Ok(nodes) => nodes,
            Err(err) => {
                drop(entry);
                self.prune(document_id, slot);
                return Err(err);
            }
        };
        let chain = RevisionChain::build(document_id, loaded);
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        debug!(
            event = Event::CacheRebuilt.as_str(),
            document_id,
            revisions = chain.len(),
            forced = force_rebuild,
            "chain rebuilt from store"
        );

        *entry = if chain.is_empty() { None } else { Some(chain.clone()) };
        drop(entry);
        self.prune(document_id, slot);
        Ok(chain)
    }

    /// Inserts or replaces nodes in a cached chain.
    ///
    /// Documents that are not cached are left alone; the next `get`
    /// rebuilds them from the store, which already holds the nodes.
    pub fn put<I>(&self, document_id: &str, nodes: I)
    where
        I: IntoIterator<Item = RevisionNode>,
    {
        let Some(slot) = self.existing_slot(document_id) else {
            return;
        };
        let mut entry = lock(&slot);
        if let Some(chain) = entry.as_mut() {
            for node in nodes {
                chain.upsert(node);
            }
        }
    }

    /// Drops every cached chain.
    pub fn clear(&self) {
        let slots: Vec<Slot> = lock(&self.slots).values().cloned().collect();
        for slot in slots {
            *lock(&slot) = None;
        }
        debug!(event = Event::CacheCleared.as_str(), "cache cleared");
    }

    /// Drops one document's cached chain.
    pub fn clear_document(&self, document_id: &str) {
        if let Some(slot) = self.existing_slot(document_id) {
            *lock(&slot) = None;
        }
        debug!(event = Event::CacheCleared.as_str(), document_id, "document cache cleared");
    }

    pub fn is_cached(&self, document_id: &str) -> bool {
        self.existing_slot(document_id)
            .map(|s| lock(&s).is_some())
            .unwrap_or(false)
    }

    /// Documents with a slot, cached or mid-rebuild.
    pub fn slot_count(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn stats(&self) -> CacheStats {
        let slots: Vec<Slot> = lock(&self.slots).values().cloned().collect();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
            documents: slots.iter().filter(|s| lock(s).is_some()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::summarize;
    use crate::model::{PartSnapshot, RevisionMetadata};
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::thread;
    use uuid::Uuid;

    fn node(rev: &str, minute: i64) -> RevisionNode {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
        let parts = PartSnapshot::new();
        RevisionNode {
            id: Uuid::new_v4(),
            document_id: "DOC".into(),
            document_number: "N".into(),
            revision: rev.into(),
            previous_revision: None,
            next_revision: None,
            change_summary: summarize(None, &parts),
            part_count: 0,
            parts,
            metadata: RevisionMetadata::draft("t", created),
            issue_date: None,
            source_reference: None,
            version: 1,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_get_loads_once() {
        let cache = ChainCache::new();
        let loads = AtomicUsize::new(0);
        let load = || -> Result<Vec<RevisionNode>, ()> {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(vec![node("1.0", 0)])
        };

        cache.get("DOC", false, load).unwrap();
        cache.get("DOC", false, load).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        cache.get("DOC", true, load).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.rebuilds, 2);
        assert_eq!(stats.documents, 1);
    }

    #[test]
    fn test_failed_load_keeps_previous_entry() {
        let cache = ChainCache::new();
        cache.get::<(), _>("DOC", false, || Ok(vec![node("1.0", 0)])).unwrap();
        assert!(cache.get::<&str, _>("DOC", true, || Err("down")).is_err());

        let chain = cache.get::<(), _>("DOC", false, || Ok(vec![])).unwrap();
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_put_only_touches_cached_documents() {
        let cache = ChainCache::new();
        cache.put("DOC", [node("1.0", 0)]);
        assert!(!cache.is_cached("DOC"));

        cache.get::<(), _>("DOC", false, || Ok(vec![node("1.0", 0)])).unwrap();
        cache.put("DOC", [node("1.1", 1)]);
        let chain = cache.get::<(), _>("DOC", false, || Ok(vec![])).unwrap();
        assert_eq!(chain.revisions(), vec!["1.0", "1.1"]);
    }

    #[test]
    fn test_clear() {
        let cache = ChainCache::new();
        cache.get::<(), _>("A", false, || Ok(vec![node("1.0", 0)])).unwrap();
        cache.get::<(), _>("B", false, || Ok(vec![node("1.0", 0)])).unwrap();

        cache.clear_document("A");
        assert!(!cache.is_cached("A"));
        assert!(cache.is_cached("B"));

        cache.clear();
        assert!(!cache.is_cached("B"));
    }

    #[test]
    fn test_put_during_rebuild_survives() {
        let cache = Arc::new(ChainCache::new());
        cache.get::<(), _>("DOC", false, || Ok(vec![node("1.0", 0)])).unwrap();

        let (loading_tx, loading_rx) = mpsc::channel();
        let rebuild = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                cache
                    .get::<(), _>("DOC", true, || {
                        loading_tx.send(()).unwrap();
                        // The snapshot predates the commit of 1.1.
                        thread::sleep(std::time::Duration::from_millis(50));
                        Ok(vec![node("1.0", 0)])
                    })
                    .unwrap()
            })
        };

        loading_rx.recv().unwrap();
        cache.put("DOC", [node("1.1", 1)]);
        let rebuilt = rebuild.join().unwrap();

        assert_eq!(rebuilt.revisions(), vec!["1.0"]);
        let chain = cache.get::<(), _>("DOC", false, || Ok(vec![])).unwrap();
        assert_eq!(chain.revisions(), vec!["1.0", "1.1"]);
    }

    #[test]
    fn test_unknown_documents_leave_no_slot() {
        let cache = ChainCache::new();
        for _ in 0..3 {
            let chain = cache.get::<(), _>("MISSING", false, || Ok(vec![])).unwrap();
            assert!(chain.is_empty());
        }
        assert!(cache.get::<&str, _>("DOWN", false, || Err("down")).is_err());
        cache.put("OTHER", [node("1.0", 0)]);

        assert!(!cache.is_cached("MISSING"));
        assert_eq!(cache.slot_count(), 0);
        assert_eq!(cache.stats().rebuilds, 3);
    }
}

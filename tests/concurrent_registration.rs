//! Concurrent Registration Tests
//!
//! Registrations are handed to the blocking pool the way ingestion does.
//! Same-document registrations serialize; racing duplicates collapse into
//! one stored node, also when the race is only caught by the store's
//! unique constraint at commit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use revauth::authority::{spawn_registration, AuthorityEngine, Registration};
use revauth::model::{DocumentRef, Effectivity, PartRecord, RevisionNode, RevisionSubmission};
use revauth::store::{AuditEntry, InMemoryRevisionStore, RevisionStore, StoreResult, StoreSession};
use revauth::transaction::TransactionPolicy;

fn create_engine(store: Arc<InMemoryRevisionStore>) -> Arc<AuthorityEngine> {
    Arc::new(AuthorityEngine::new(store, TransactionPolicy::default()))
}

fn submission(document_id: &str, revision: &str) -> RevisionSubmission {
    RevisionSubmission::new(
        document_id,
        "00-00-00",
        revision,
        vec![PartRecord::new("P-100", Effectivity::list([1, 2]))],
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_duplicates_store_one_node() {
    let store = Arc::new(InMemoryRevisionStore::new());
    store.set_write_latency(Some(Duration::from_millis(5)));
    let engine = create_engine(store.clone());

    let handles: Vec<_> = (0..8)
        .map(|_| spawn_registration(Arc::clone(&engine), submission("DOC-R", "001.0")))
        .collect();

    let mut created = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            Registration::Created { .. } => created += 1,
            Registration::AlreadyExists { .. } => duplicates += 1,
        }
    }

    assert_eq!(created, 1);
    assert_eq!(duplicates, 7);
    assert_eq!(store.find_by_document("DOC-R").unwrap().len(), 1);
    assert_eq!(store.open_sessions(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sequential_revisions_form_one_chain() {
    let store = Arc::new(InMemoryRevisionStore::new());
    let engine = create_engine(store);

    for minor in 0..5 {
        spawn_registration(Arc::clone(&engine), submission("DOC-S", &format!("001.{minor}")))
            .await
            .unwrap()
            .unwrap();
    }

    let graph = engine.get_revision_graph("DOC-S", true).unwrap();
    assert_eq!(graph.len(), 5);
    for pair in graph.nodes.windows(2) {
        assert_eq!(pair[1].previous_revision.as_deref(), Some(pair[0].revision.as_str()));
        assert_eq!(pair[0].next_revision.as_deref(), Some(pair[1].revision.as_str()));
    }
    assert!(engine.validate_consistency("DOC-S").unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_different_documents_register_concurrently() {
    let store = Arc::new(InMemoryRevisionStore::new());
    let engine = create_engine(store.clone());

    let handles: Vec<_> = (0..6)
        .map(|i| spawn_registration(Arc::clone(&engine), submission(&format!("DOC-{i}"), "001.0")))
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_created());
    }

    assert_eq!(store.document_ids().unwrap().len(), 6);
    assert_eq!(engine.documents_containing_part("P-100").unwrap().len(), 6);
}

// =============================================================================
// Commit-Time Duplicates
// =============================================================================

/// Shares a store with other engines but answers the first
/// `stale_lookups` point lookups as if the revision were absent, like a
/// writer that checked before a competing commit landed.
#[derive(Debug)]
struct StaleLookupStore {
    inner: Arc<InMemoryRevisionStore>,
    stale_lookups: AtomicUsize,
}

impl RevisionStore for StaleLookupStore {
    fn find_revision(&self, document_id: &str, revision: &str) -> StoreResult<Option<RevisionNode>> {
        let stale = self
            .stale_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale {
            return Ok(None);
        }
        self.inner.find_revision(document_id, revision)
    }

    fn find_by_document(&self, document_id: &str) -> StoreResult<Vec<RevisionNode>> {
        self.inner.find_by_document(document_id)
    }

    fn document_ids(&self) -> StoreResult<Vec<String>> {
        self.inner.document_ids()
    }

    fn part_references(&self, part_number: &str) -> StoreResult<Vec<DocumentRef>> {
        self.inner.part_references(part_number)
    }

    fn audit_entries(&self, document_id: &str) -> StoreResult<Vec<AuditEntry>> {
        self.inner.audit_entries(document_id)
    }

    fn start_session(&self) -> StoreResult<Box<dyn StoreSession + '_>> {
        self.inner.start_session()
    }
}

#[test]
fn test_unique_constraint_at_commit_reports_already_exists() {
    let shared = Arc::new(InMemoryRevisionStore::new());
    let winner = create_engine(shared.clone());
    assert!(winner.register_revision(submission("DOC-U", "001.0")).unwrap().is_created());

    let loser = AuthorityEngine::new(
        Arc::new(StaleLookupStore {
            inner: shared.clone(),
            stale_lookups: AtomicUsize::new(1),
        }),
        TransactionPolicy::default(),
    );
    let reg = loser.register_revision(submission("DOC-U", "001.0")).unwrap();

    match reg {
        Registration::AlreadyExists { node } => assert_eq!(node.revision, "001.0"),
        other => panic!("expected AlreadyExists, got {other:?}"),
    }
    assert_eq!(shared.find_by_document("DOC-U").unwrap().len(), 1);
    assert_eq!(shared.audit_entries("DOC-U").unwrap().len(), 1);
    assert_eq!(shared.commits(), 1);
    assert_eq!(shared.open_sessions(), 0);

    let metrics = loser.metrics();
    assert_eq!(metrics.duplicates, 1);
    assert_eq!(metrics.registration_failures, 0);
    assert_eq!(metrics.transaction_retries, 0);
}

#[test]
fn test_engines_sharing_a_store_race_to_one_node() {
    let shared = Arc::new(InMemoryRevisionStore::new());
    shared.set_write_latency(Some(Duration::from_millis(5)));
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let engine = create_engine(shared.clone());
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                engine.register_revision(submission("DOC-V", "001.0")).unwrap()
            })
        })
        .collect();

    let created = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(Registration::is_created)
        .count();

    assert_eq!(created, 1);
    assert_eq!(shared.find_by_document("DOC-V").unwrap().len(), 1);
    assert_eq!(shared.open_sessions(), 0);
}

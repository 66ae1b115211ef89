//! Registration Scenario Tests
//!
//! End-to-end behavior of the authority engine over the in-memory store:
//! delta summaries, predecessor resolution, duplicate handling, cache
//! rebuild equivalence and resurrection findings.

use std::sync::Arc;
use std::time::Duration;

use revauth::authority::{AuthorityEngine, Registration};
use revauth::consistency::Anomaly;
use revauth::model::{
    Effectivity, FieldValue, PartChangeType, PartRecord, RevisionSubmission, SummaryKind, TrackedField,
};
use revauth::store::{InMemoryRevisionStore, RevisionStore};
use revauth::transaction::TransactionPolicy;

// =============================================================================
// Test Utilities
// =============================================================================

fn create_engine() -> (Arc<InMemoryRevisionStore>, AuthorityEngine) {
    let store = Arc::new(InMemoryRevisionStore::new());
    let policy = TransactionPolicy {
        backoff: Duration::ZERO,
        ..TransactionPolicy::default()
    };
    (Arc::clone(&store), AuthorityEngine::new(store, policy))
}

fn submit(document_id: &str, revision: &str, parts: Vec<PartRecord>) -> RevisionSubmission {
    RevisionSubmission::new(document_id, "32-11-00", revision, parts).created_by("integration")
}

fn part(part_number: &str) -> PartRecord {
    PartRecord::new(part_number, Effectivity::list([1, 2, 3]))
}

fn register(engine: &AuthorityEngine, document_id: &str, revision: &str, parts: Vec<PartRecord>) -> Registration {
    engine
        .register_revision(submit(document_id, revision, parts))
        .expect("registration should succeed")
}

// =============================================================================
// Delta Summaries
// =============================================================================

/// An effectivity extension is one modification and nothing else.
#[test]
fn test_effectivity_extension_is_single_modification() {
    let (_, engine) = create_engine();

    register(
        &engine,
        "IPC-32",
        "001.0",
        vec![PartRecord::new("867Z2251-28", Effectivity::list([68, 74]))],
    );
    let reg = register(
        &engine,
        "IPC-32",
        "001.1",
        vec![PartRecord::new("867Z2251-28", Effectivity::list([68, 74, 80]))],
    );

    let summary = &reg.node().change_summary;
    assert_eq!(summary.kind, SummaryKind::Update);
    assert!(summary.added_parts.is_empty());
    assert!(summary.removed_parts.is_empty());
    assert_eq!(summary.modified_parts.len(), 1);

    let change = &summary.modified_parts[0];
    assert_eq!(change.part_number, "867Z2251-28");
    assert_eq!(change.fields_changed, vec![TrackedField::Effectivity]);

    let field = change.change_for(TrackedField::Effectivity).unwrap();
    assert_eq!(field.old_value, FieldValue::Effectivity(Effectivity::list([68, 74])));
    assert_eq!(field.new_value, FieldValue::Effectivity(Effectivity::list([68, 74, 80])));
    assert!(reg.anomalies().is_empty());
}

#[test]
fn test_first_revision_is_initial() {
    let (_, engine) = create_engine();
    let reg = register(&engine, "IPC-1", "001.0", vec![part("A"), part("B")]);

    let summary = &reg.node().change_summary;
    assert_eq!(summary.kind, SummaryKind::Initial);
    assert_eq!(summary.total_parts, 2);
}

#[test]
fn test_compare_reports_added_and_removed() {
    let (_, engine) = create_engine();
    register(&engine, "IPC-1", "001.0", vec![part("A"), part("B")]);
    register(&engine, "IPC-1", "001.1", vec![part("B"), part("C")]);

    let view = engine.compare_revisions("IPC-1", "001.0", "001.1").unwrap();
    assert_eq!(view.delta.added.iter().collect::<Vec<_>>(), vec!["C"]);
    assert_eq!(view.delta.removed.iter().collect::<Vec<_>>(), vec!["A"]);
    assert!(view.delta.modified.is_empty());
}

// =============================================================================
// Predecessor Resolution
// =============================================================================

#[test]
fn test_predecessor_by_revision_number() {
    let (_, engine) = create_engine();
    register(&engine, "IPC-7", "030.3", vec![part("A")]);
    register(&engine, "IPC-7", "030.4", vec![part("A")]);

    let reg = register(&engine, "IPC-7", "030.5", vec![part("A")]);
    assert_eq!(reg.node().previous_revision.as_deref(), Some("030.4"));
}

#[test]
fn test_predecessor_falls_back_to_latest() {
    let (_, engine) = create_engine();
    register(&engine, "IPC-7", "030.2", vec![part("A")]);

    let reg = register(&engine, "IPC-7", "030.5", vec![part("A")]);
    assert_eq!(reg.node().previous_revision.as_deref(), Some("030.2"));
}

#[test]
fn test_malformed_token_uses_latest() {
    let (_, engine) = create_engine();
    register(&engine, "IPC-7", "A", vec![part("A")]);

    let reg = register(&engine, "IPC-7", "B-draft", vec![part("A")]);
    assert_eq!(reg.node().previous_revision.as_deref(), Some("A"));
}

// =============================================================================
// Duplicates
// =============================================================================

#[test]
fn test_duplicate_registration_stores_one_node() {
    let (store, engine) = create_engine();

    let first = register(&engine, "IPC-2", "001.0", vec![part("A")]);
    let second = register(&engine, "IPC-2", "001.0", vec![part("A")]);

    assert!(first.is_created());
    assert!(matches!(second, Registration::AlreadyExists { .. }));
    assert_eq!(second.node().id, first.node().id);
    assert_eq!(store.find_by_document("IPC-2").unwrap().len(), 1);
    assert_eq!(store.audit_entries("IPC-2").unwrap().len(), 1);
}

// =============================================================================
// Cache
// =============================================================================

#[test]
fn test_rebuild_after_clear_matches_cached_view() {
    let (_, engine) = create_engine();
    register(&engine, "IPC-3", "001.0", vec![part("A"), part("B")]);
    register(&engine, "IPC-3", "001.1", vec![part("B")]);
    register(&engine, "IPC-3", "001.2", vec![part("B"), part("C")]);

    let cached = engine.get_revision_graph("IPC-3", false).unwrap();
    engine.clear_cache();
    let rebuilt = engine.get_revision_graph("IPC-3", true).unwrap();

    assert_eq!(cached, rebuilt);
    assert_eq!(rebuilt.revisions(), vec!["001.0", "001.1", "001.2"]);
}

#[test]
fn test_clear_document_cache_only_affects_that_document() {
    let (_, engine) = create_engine();
    register(&engine, "IPC-4", "001.0", vec![part("A")]);
    register(&engine, "IPC-5", "001.0", vec![part("A")]);
    engine.get_revision_graph("IPC-4", false).unwrap();
    engine.get_revision_graph("IPC-5", false).unwrap();

    engine.clear_document_cache("IPC-4");
    assert_eq!(engine.cache_stats().documents, 1);

    let rebuilds = engine.metrics().cache_rebuilds;
    engine.get_revision_graph("IPC-4", false).unwrap();
    assert_eq!(engine.metrics().cache_rebuilds, rebuilds + 1);
}

// =============================================================================
// Resurrection
// =============================================================================

/// A part removed and later re-added without a declared ADD is reported
/// exactly once, at registration and by full validation.
#[test]
fn test_resurrection_reported_exactly_once() {
    let (_, engine) = create_engine();
    register(&engine, "IPC-6", "001.0", vec![part("A")]);
    register(&engine, "IPC-6", "001.1", vec![part("B")]);
    let reg = register(&engine, "IPC-6", "001.2", vec![part("A"), part("B")]);

    assert_eq!(reg.anomalies().len(), 1);
    match &reg.anomalies()[0] {
        Anomaly::Resurrection {
            part_number,
            removed_at,
            revision,
            ..
        } => {
            assert_eq!(part_number, "A");
            assert_eq!(removed_at, "001.1");
            assert_eq!(revision, "001.2");
        }
        other => panic!("unexpected anomaly {other:?}"),
    }
    assert!(reg.anomalies()[0].to_string().contains("reappeared without ADD"));

    let findings = engine.validate_consistency("IPC-6").unwrap();
    assert_eq!(findings.len(), 1);
    assert!(matches!(findings[0], Anomaly::Resurrection { .. }));
}

#[test]
fn test_declared_add_is_not_resurrection() {
    let (_, engine) = create_engine();
    register(&engine, "IPC-6", "001.0", vec![part("A")]);
    register(&engine, "IPC-6", "001.1", vec![part("B")]);
    let reg = register(
        &engine,
        "IPC-6",
        "001.2",
        vec![part("A").with_change_type(PartChangeType::Add), part("B")],
    );

    assert!(reg.anomalies().is_empty());
    assert!(engine.validate_consistency("IPC-6").unwrap().is_empty());
    assert!(engine.validate_part_lineage("A", "IPC-6").unwrap().anomalies.iter().all(|a| {
        !matches!(a, Anomaly::ReappearedWithoutAdd { .. })
    }));
}

#[test]
fn test_anomalies_do_not_block_commit() {
    let (store, engine) = create_engine();
    register(&engine, "IPC-8", "001.0", vec![part("A")]);
    register(&engine, "IPC-8", "001.1", vec![part("B")]);
    register(&engine, "IPC-8", "001.2", vec![part("A")]);

    assert!(store.revision_exists("IPC-8", "001.2").unwrap());
    assert!(engine.metrics().anomalies_found >= 1);
}

// =============================================================================
// Part Lineage
// =============================================================================

#[test]
fn test_part_lineage_oldest_first() {
    let (_, engine) = create_engine();
    register(&engine, "IPC-9", "001.0", vec![part("A")]);
    register(&engine, "IPC-9", "001.1", vec![part("B")]);
    register(&engine, "IPC-9", "001.2", vec![part("A")]);

    let lineage = engine.get_part_lineage("A", "IPC-9").unwrap();
    let presence: Vec<(&str, bool)> = lineage.iter().map(|e| (e.revision.as_str(), e.present)).collect();
    assert_eq!(presence, vec![("001.0", true), ("001.1", false), ("001.2", true)]);
    assert!(lineage[1].effectivity.is_none());

    let report = engine.validate_part_lineage("A", "IPC-9").unwrap();
    assert!(!report.is_consistent);
    assert_eq!(report.anomalies.len(), 2);
    assert!(matches!(report.anomalies[0], Anomaly::Disappeared { .. }));
    assert!(matches!(report.anomalies[1], Anomaly::ReappearedWithoutAdd { .. }));
}

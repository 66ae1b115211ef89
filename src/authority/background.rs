//! Background registration
//!
//! Ingestion hands a parsed submission off and returns; the write path
//! then runs on tokio's blocking pool since store I/O is synchronous.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::model::RevisionSubmission;

use super::engine::AuthorityEngine;
use super::errors::AuthorityResult;
use super::views::Registration;

/// Runs `register_revision` on the blocking pool. Must be called from
/// within a tokio runtime.
pub fn spawn_registration(
    engine: Arc<AuthorityEngine>,
    submission: RevisionSubmission,
) -> JoinHandle<AuthorityResult<Registration>> {
    tokio::task::spawn_blocking(move || engine.register_revision(submission))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Effectivity, PartRecord};
    use crate::store::InMemoryRevisionStore;
    use crate::transaction::TransactionPolicy;

    #[tokio::test]
    async fn test_spawned_registration_commits() {
        let engine = Arc::new(AuthorityEngine::new(
            Arc::new(InMemoryRevisionStore::new()),
            TransactionPolicy::default(),
        ));
        let submission = RevisionSubmission::new(
            "DOC-1",
            "n",
            "001.0",
            vec![PartRecord::new("A", Effectivity::range(1, 10))],
        );

        let registration = spawn_registration(Arc::clone(&engine), submission)
            .await
            .unwrap()
            .unwrap();
        assert!(registration.is_created());
        assert_eq!(engine.get_revision_graph("DOC-1", false).unwrap().len(), 1);
    }
}

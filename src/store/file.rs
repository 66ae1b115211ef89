//! File-backed revision store
//!
//! Append-only commit log at `<data_dir>/revisions/revisions.log`. Every
//! committed transaction is one checksummed record written with a single
//! `write_all` and fsynced before it becomes visible. Opening the store
//! takes the data directory lock, then replays the whole log; any
//! corruption aborts the open.
//!
//! A failed append or fsync truncates the log back to its length before
//! the append and fails fatally. If the truncation fails too the store
//! refuses every further commit.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock, RwLockReadGuard};

use tracing::{error, info};

use crate::crash_point::{maybe_crash, points};
use crate::model::{DocumentRef, RevisionNode};
use crate::observability::Event;

use super::audit::AuditEntry;
use super::backend::{BatchCommitter, RevisionStore, StagedSession, StoreSession};
use super::errors::{StoreError, StoreResult};
use super::lock::StoreLock;
use super::record::CommitRecord;
use super::state::StoreState;

const LOG_DIR: &str = "revisions";
const LOG_FILE: &str = "revisions.log";

#[derive(Debug)]
struct LogWriter {
    file: File,
    /// Length of the log up to the last durable record.
    len: u64,
    /// Set when a failed append could not be rolled back.
    broken: Option<String>,
}

#[derive(Debug)]
pub struct FileRevisionStore {
    log_path: PathBuf,
    state: RwLock<StoreState>,
    log: Mutex<LogWriter>,
    max_batch_bytes: usize,
    fail_next_sync: AtomicBool,
    _lock: StoreLock,
}

impl FileRevisionStore {
    /// Opens or creates the store under `data_dir` and replays its log.
    ///
    /// Fails with `LockHeld` while another store instance, in this process
    /// or another, has `data_dir` open.
    pub fn open(data_dir: &Path, max_batch_bytes: usize) -> StoreResult<Self> {
        let log_dir = data_dir.join(LOG_DIR);
        fs::create_dir_all(&log_dir)
            .map_err(|e| StoreError::io(&format!("create {}", log_dir.display()), e))?;
        let lock = StoreLock::acquire(data_dir)?;
        let log_path = log_dir.join(LOG_FILE);

        let (state, len) = Self::replay(&log_path)?;
        info!(
            event = Event::StoreOpened.as_str(),
            path = %log_path.display(),
            lock = %lock.path().display(),
            commits = state.sequence(),
            revisions = state.revision_count(),
            "revision log replayed"
        );

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| StoreError::io(&format!("open {}", log_path.display()), e))?;

        Ok(Self {
            log_path,
            state: RwLock::new(state),
            log: Mutex::new(LogWriter { file, len, broken: None }),
            max_batch_bytes,
            fail_next_sync: AtomicBool::new(false),
            _lock: lock,
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Fault injection: the next log fsync fails after the record has been
    /// written.
    pub fn fail_next_sync(&self) {
        self.fail_next_sync.store(true, Ordering::SeqCst);
    }

    /// Replays the log; returns the state and the replayed length.
    fn replay(log_path: &Path) -> StoreResult<(StoreState, u64)> {
        let mut state = StoreState::new();
        let file = match File::open(log_path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((state, 0)),
            Err(e) => return Err(StoreError::io(&format!("open {}", log_path.display()), e)),
        };

        let mut reader = BufReader::new(file);
        let mut offset = 0u64;
        let result = loop {
            match CommitRecord::read_from(&mut reader, offset) {
                Ok(None) => break Ok(()),
                Ok(Some((record, consumed))) => {
                    // Records were validated before they were written.
                    if let Err(e) = state.apply_batch(record.writes) {
                        break Err(StoreError::Corruption {
                            offset,
                            reason: format!("record does not apply: {}", e),
                        });
                    }
                    offset += consumed;
                }
                Err(e) => break Err(e),
            }
        };

        if let Err(e) = result {
            error!(
                event = Event::StoreCorruption.as_str(),
                path = %log_path.display(),
                error = %e,
                "revision log corrupted; refusing to open"
            );
            return Err(e);
        }

        Ok((state, offset))
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.state.read().map_err(|_| StoreError::poisoned())
    }

    /// Appends and fsyncs one framed record. On failure the log is cut back
    /// to its previous length.
    fn append(&self, log: &mut LogWriter, framed: &[u8]) -> StoreResult<()> {
        if let Some(reason) = &log.broken {
            return Err(StoreError::LogAppend {
                offset: log.len,
                reason: reason.clone(),
            });
        }

        let start = log.len;
        maybe_crash(points::REVISION_LOG_BEFORE_APPEND);
        let written = log.file.write_all(framed).and_then(|_| {
            maybe_crash(points::REVISION_LOG_AFTER_APPEND);
            if self.fail_next_sync.swap(false, Ordering::SeqCst) {
                return Err(std::io::Error::other("injected fsync failure"));
            }
            log.file.sync_all()
        });

        let err = match written {
            Ok(()) => {
                maybe_crash(points::REVISION_LOG_AFTER_FSYNC);
                log.len = start + framed.len() as u64;
                return Ok(());
            }
            Err(err) => err,
        };

        let rolled_back = log.file.set_len(start).and_then(|_| log.file.sync_all());
        let reason = match rolled_back {
            Ok(()) => format!("append rolled back: {}", err),
            Err(rollback) => {
                let reason = format!("append failed ({}) and rollback failed ({})", err, rollback);
                log.broken = Some(reason.clone());
                reason
            }
        };
        error!(
            event = Event::StoreAppendFailed.as_str(),
            path = %self.log_path.display(),
            offset = start,
            error = %reason,
            "revision log append failed"
        );
        Err(StoreError::LogAppend { offset: start, reason })
    }
}

impl BatchCommitter for FileRevisionStore {
    fn commit_batch(&self, record: CommitRecord, body: Vec<u8>) -> StoreResult<()> {
        let mut state = self.state.write().map_err(|_| StoreError::poisoned())?;
        state.validate_batch(&record.writes)?;

        let framed = CommitRecord::frame(&body)?;
        {
            let mut log = self.log.lock().map_err(|_| StoreError::poisoned())?;
            self.append(&mut log, &framed)?;
        }

        maybe_crash(points::REVISION_LOG_BEFORE_APPLY);
        state.apply_batch(record.writes)
    }
}

impl RevisionStore for FileRevisionStore {
    fn find_revision(&self, document_id: &str, revision: &str) -> StoreResult<Option<RevisionNode>> {
        Ok(self.read()?.find_revision(document_id, revision))
    }

    fn find_by_document(&self, document_id: &str) -> StoreResult<Vec<RevisionNode>> {
        Ok(self.read()?.find_by_document(document_id))
    }

    fn document_ids(&self) -> StoreResult<Vec<String>> {
        Ok(self.read()?.document_ids())
    }

    fn part_references(&self, part_number: &str) -> StoreResult<Vec<DocumentRef>> {
        Ok(self.read()?.part_references(part_number))
    }

    fn audit_entries(&self, document_id: &str) -> StoreResult<Vec<AuditEntry>> {
        Ok(self.read()?.audit_entries(document_id))
    }

    fn start_session(&self) -> StoreResult<Box<dyn StoreSession + '_>> {
        Ok(Box::new(StagedSession::new(self, self.max_batch_bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::summarize;
    use crate::model::{PartSnapshot, RevisionMetadata};
    use crate::store::backend::SessionGuard;
    use crate::store::FailureClass;
    use chrono::Utc;
    use std::io::{Seek, SeekFrom};
    use tempfile::TempDir;
    use uuid::Uuid;

    const LIMIT: usize = 1024 * 1024;

    fn node(rev: &str) -> RevisionNode {
        let now = Utc::now();
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
            metadata: RevisionMetadata::draft("t", now),
            issue_date: None,
            source_reference: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn insert(store: &FileRevisionStore, rev: &str) -> StoreResult<()> {
        let mut session = SessionGuard::new(store.start_session()?);
        session.start_transaction()?;
        session.insert_revision(node(rev))?;
        session.commit_transaction()
    }

    #[test]
    fn test_reopen_replays_commits() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileRevisionStore::open(dir.path(), LIMIT).unwrap();
            insert(&store, "1.0").unwrap();
            insert(&store, "1.1").unwrap();
        }

        let store = FileRevisionStore::open(dir.path(), LIMIT).unwrap();
        let revs: Vec<_> = store
            .find_by_document("DOC")
            .unwrap()
            .into_iter()
            .map(|n| n.revision)
            .collect();
        assert_eq!(revs, vec!["1.0", "1.1"]);
    }

    #[test]
    fn test_rejected_batch_not_logged() {
        let dir = TempDir::new().unwrap();
        let store = FileRevisionStore::open(dir.path(), LIMIT).unwrap();
        insert(&store, "1.0").unwrap();
        let size = fs::metadata(store.log_path()).unwrap().len();

        assert!(matches!(insert(&store, "1.0"), Err(StoreError::DuplicateKey(_))));
        assert_eq!(fs::metadata(store.log_path()).unwrap().len(), size);
    }

    #[test]
    fn test_corrupted_log_refuses_to_open() {
        let dir = TempDir::new().unwrap();
        let log_path = {
            let store = FileRevisionStore::open(dir.path(), LIMIT).unwrap();
            insert(&store, "1.0").unwrap();
            store.log_path().to_path_buf()
        };

        let mut file = OpenOptions::new().read(true).write(true).open(&log_path).unwrap();
        file.seek(SeekFrom::Start(10)).unwrap();
        file.write_all(b"#").unwrap();
        drop(file);

        let err = FileRevisionStore::open(dir.path(), LIMIT).unwrap_err();
        assert!(matches!(err, StoreError::Corruption { .. }));
    }

    #[test]
    fn test_torn_tail_refuses_to_open() {
        let dir = TempDir::new().unwrap();
        let log_path = {
            let store = FileRevisionStore::open(dir.path(), LIMIT).unwrap();
            insert(&store, "1.0").unwrap();
            store.log_path().to_path_buf()
        };
        let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
        file.write_all(&[7, 0]).unwrap();
        drop(file);

        assert!(FileRevisionStore::open(dir.path(), LIMIT).is_err());
    }

    #[test]
    fn test_failed_fsync_rolls_back_append() {
        let dir = TempDir::new().unwrap();
        let store = FileRevisionStore::open(dir.path(), LIMIT).unwrap();
        insert(&store, "1.0").unwrap();
        let size = fs::metadata(store.log_path()).unwrap().len();

        store.fail_next_sync();
        let err = insert(&store, "1.1").unwrap_err();
        assert!(matches!(err, StoreError::LogAppend { offset, .. } if offset == size));
        assert_eq!(err.class(), FailureClass::Fatal);
        assert_eq!(fs::metadata(store.log_path()).unwrap().len(), size);
        assert!(store.find_revision("DOC", "1.1").unwrap().is_none());

        // The same batch commits cleanly afterwards and replays once.
        insert(&store, "1.1").unwrap();
        drop(store);

        let store = FileRevisionStore::open(dir.path(), LIMIT).unwrap();
        let revs: Vec<_> = store
            .find_by_document("DOC")
            .unwrap()
            .into_iter()
            .map(|n| n.revision)
            .collect();
        assert_eq!(revs, vec!["1.0", "1.1"]);
    }

    #[test]
    fn test_second_open_of_data_dir_is_locked() {
        let dir = TempDir::new().unwrap();
        let store = FileRevisionStore::open(dir.path(), LIMIT).unwrap();
        insert(&store, "1.0").unwrap();

        let err = FileRevisionStore::open(dir.path(), LIMIT).unwrap_err();
        assert!(matches!(err, StoreError::LockHeld { .. }));
        assert_eq!(err.class(), FailureClass::Retryable);

        drop(store);
        let store = FileRevisionStore::open(dir.path(), LIMIT).unwrap();
        assert!(matches!(insert(&store, "1.0"), Err(StoreError::DuplicateKey(_))));
    }
}

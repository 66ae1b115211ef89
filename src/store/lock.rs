//! Exclusive data directory lock
//!
//! A store holds an OS lock on `<data_dir>/revauth.lock` for as long as it
//! is open, so at most one store instance replays and appends the log at a
//! time, across processes. The kernel drops the lock when the holder exits,
//! crashed or not. The file itself stays behind and carries the holder's
//! pid for diagnostics.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::errors::{StoreError, StoreResult};

const LOCK_FILE: &str = "revauth.lock";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLockMeta {
    pub pid: u32,
    pub acquired_at_ms: u64,
}

impl StoreLockMeta {
    fn current() -> Self {
        let acquired_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            pid: std::process::id(),
            acquired_at_ms,
        }
    }
}

/// Held for the lifetime of a `FileRevisionStore`; released on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    file: File,
}

impl StoreLock {
    /// Takes the lock without waiting. Fails with `LockHeld` while another
    /// store instance has `data_dir` open.
    pub fn acquire(data_dir: &Path) -> StoreResult<Self> {
        let path = data_dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| StoreError::io(&format!("open {}", path.display()), e))?;

        match file.try_lock() {
            Ok(()) => {}
            Err(std::fs::TryLockError::WouldBlock) => {
                return Err(StoreError::LockHeld {
                    path: path.display().to_string(),
                    holder: read_meta(&mut file).map(|meta| meta.pid),
                });
            }
            Err(std::fs::TryLockError::Error(e)) => {
                return Err(StoreError::io(&format!("lock {}", path.display()), e));
            }
        }

        let meta = serde_json::to_vec(&StoreLockMeta::current())?;
        file.set_len(0)
            .and_then(|_| file.seek(SeekFrom::Start(0)))
            .and_then(|_| file.write_all(&meta))
            .map_err(|e| StoreError::io(&format!("write {}", path.display()), e))?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn read_meta(file: &mut File) -> Option<StoreLockMeta> {
    let mut bytes = Vec::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_end(&mut bytes).ok()?;
    serde_json::from_slice(&bytes).ok()
}

//! Revision log record format
//!
//! One record per committed transaction:
//!
//! ```text
//! +------------------+
//! | Body Length      | (u32 LE)
//! +------------------+
//! | Body             | (JSON CommitRecord)
//! +------------------+
//! | Checksum         | (u32 LE, CRC32 over Body)
//! +------------------+
//! ```

use std::io::{self, Read};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::checksum::{compute_checksum, verify_checksum};
use super::errors::{StoreError, StoreResult};
use super::state::StagedWrite;

const LENGTH_BYTES: usize = 4;
const CHECKSUM_BYTES: usize = 4;

/// A committed batch as persisted in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub committed_at: DateTime<Utc>,
    pub writes: Vec<StagedWrite>,
}

impl CommitRecord {
    /// Serialized JSON body; its length is what the size limit applies to.
    pub fn encode_body(&self) -> StoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Frames an encoded body for appending to the log.
    pub fn frame(body: &[u8]) -> StoreResult<Vec<u8>> {
        let length = u32::try_from(body.len()).map_err(|_| StoreError::TransactionTooLarge {
            size: body.len(),
            limit: u32::MAX as usize,
        })?;
        let mut buf = Vec::with_capacity(LENGTH_BYTES + body.len() + CHECKSUM_BYTES);
        buf.extend_from_slice(&length.to_le_bytes());
        buf.extend_from_slice(body);
        buf.extend_from_slice(&compute_checksum(body).to_le_bytes());
        Ok(buf)
    }

    /// Reads one record starting at `offset`.
    ///
    /// Returns `Ok(None)` on a clean end of log. A partial record or a
    /// checksum mismatch is corruption.
    pub fn read_from<R: Read>(reader: &mut R, offset: u64) -> StoreResult<Option<(Self, u64)>> {
        let mut length_buf = [0u8; LENGTH_BYTES];
        match read_exact_or_eof(reader, &mut length_buf) {
            Ok(0) => return Ok(None),
            Ok(n) if n < LENGTH_BYTES => {
                return Err(corruption(offset, "truncated length prefix"));
            }
            Ok(_) => {}
            Err(e) => return Err(StoreError::io("read revision log", e)),
        }
        let length = u32::from_le_bytes(length_buf) as usize;

        let mut body = vec![0u8; length];
        let mut checksum_buf = [0u8; CHECKSUM_BYTES];
        let read_body = read_exact_or_eof(reader, &mut body).map_err(|e| StoreError::io("read revision log", e))?;
        let read_checksum =
            read_exact_or_eof(reader, &mut checksum_buf).map_err(|e| StoreError::io("read revision log", e))?;
        if read_body < length || read_checksum < CHECKSUM_BYTES {
            return Err(corruption(offset, "truncated record"));
        }

        if !verify_checksum(&body, u32::from_le_bytes(checksum_buf)) {
            return Err(corruption(offset, "checksum mismatch"));
        }

        let record: CommitRecord = serde_json::from_slice(&body)
            .map_err(|e| corruption(offset, &format!("undecodable body: {}", e)))?;
        let consumed = (LENGTH_BYTES + length + CHECKSUM_BYTES) as u64;
        Ok(Some((record, consumed)))
    }
}

fn corruption(offset: u64, reason: &str) -> StoreError {
    StoreError::Corruption {
        offset,
        reason: reason.to_string(),
    }
}

/// Fills `buf` unless EOF comes first; returns the bytes read.
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

//! Append-only batch log backing `MemNameStore`.
//!
//! Record framing:
//! ```text
//! [len u32 LE][crc32c u32 LE][bincode(Vec<Op>)]
//! ```
//! A record is one atomic batch. Replay stops at the first torn or corrupt
//! record and truncates it away, so a batch is either fully recovered or absent.
//! A failed append is cut back to the last committed record before the error
//! is returned; if that cut fails too, the log refuses further appends.

use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use crate::error::NameError;

use super::Op;

const HEADER_BYTES: usize = 8;

#[derive(Debug)]
pub struct BatchLog {
    path: PathBuf,
    file: std::fs::File,
    /// End of the last committed record.
    committed_len: u64,
    poisoned: bool,
}

impl BatchLog {
    pub const FILE_NAME: &'static str = "NAMES.log";

    /// Opens the log in `dir` and returns every complete batch in order.
    pub fn open(dir: &Path) -> Result<(Self, Vec<Vec<Op>>), NameError> {
        let path = dir.join(Self::FILE_NAME);
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let mut data = Vec::new();
        file.seek(std::io::SeekFrom::Start(0))?;
        file.read_to_end(&mut data)?;

        let (batches, valid_len) = replay(&data)?;
        if valid_len < data.len() {
            tracing::warn!(
                target: "kevadb.store",
                path = %path.display(),
                dropped_bytes = data.len() - valid_len,
                "dropping torn batch log tail"
            );
            file.set_len(valid_len as u64)?;
            file.sync_data()?;
        }
        Ok((
            Self {
                path,
                file,
                committed_len: valid_len as u64,
                poisoned: false,
            },
            batches,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Appends one batch record. On error the file is back at its previous
    /// committed length, so the batch is absent after a reopen.
    pub fn append(&mut self, ops: &[Op], sync: bool) -> Result<(), NameError> {
        if self.poisoned {
            return Err(NameError::Corrupt("batch log poisoned by a failed rollback"));
        }
        let payload = bincode::serialize(ops)?;
        let len: u32 = payload
            .len()
            .try_into()
            .map_err(|_| NameError::Corrupt("batch too large for log record"))?;
        let mut buf = Vec::with_capacity(HEADER_BYTES + payload.len());
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(&crc32c::crc32c(&payload).to_le_bytes());
        buf.extend_from_slice(&payload);

        self.trim_uncommitted_tail()?;
        let written = self.file.write_all(&buf).and_then(|()| {
            if sync {
                self.file.sync_data()
            } else {
                Ok(())
            }
        });
        match written {
            Ok(()) => {
                self.committed_len += buf.len() as u64;
                Ok(())
            }
            Err(err) => {
                self.rollback();
                Err(err.into())
            }
        }
    }

    /// Cuts bytes left past the last committed record by an earlier failed
    /// write, so the next record starts on a record boundary.
    fn trim_uncommitted_tail(&mut self) -> Result<(), NameError> {
        let on_disk = self.file.metadata()?.len();
        if on_disk == self.committed_len {
            return Ok(());
        }
        if on_disk < self.committed_len {
            self.poisoned = true;
            return Err(NameError::Corrupt("batch log shorter than its committed length"));
        }
        tracing::warn!(
            target: "kevadb.store",
            path = %self.path.display(),
            dropped_bytes = on_disk - self.committed_len,
            "dropping uncommitted batch log bytes"
        );
        if let Err(err) = self.file.set_len(self.committed_len) {
            self.poisoned = true;
            return Err(err.into());
        }
        Ok(())
    }

    fn rollback(&mut self) {
        let cut = self
            .file
            .set_len(self.committed_len)
            .and_then(|()| self.file.sync_data());
        if let Err(err) = cut {
            tracing::error!(
                target: "kevadb.store",
                path = %self.path.display(),
                error = %err,
                "batch log rollback failed; refusing further appends"
            );
            self.poisoned = true;
        }
    }
}

/// Returns the decoded batches and the length of the valid prefix.
fn replay(data: &[u8]) -> Result<(Vec<Vec<Op>>, usize), NameError> {
    let mut batches = Vec::new();
    let mut offset = 0usize;
    while offset + HEADER_BYTES <= data.len() {
        let mut word = [0u8; 4];
        word.copy_from_slice(&data[offset..offset + 4]);
        let len = u32::from_le_bytes(word) as usize;
        word.copy_from_slice(&data[offset + 4..offset + 8]);
        let crc_expected = u32::from_le_bytes(word);

        let start = offset + HEADER_BYTES;
        if start + len > data.len() {
            break;
        }
        let payload = &data[start..start + len];
        if crc32c::crc32c(payload) != crc_expected {
            break;
        }
        let ops: Vec<Op> = bincode::deserialize(payload)?;
        batches.push(ops);
        offset = start + len;
    }
    Ok((batches, offset))
}

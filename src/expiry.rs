//! Expire-index entries.
//!
//! Rows are keyed by `[height u32 BE][name encoding]`. Big-endian heights keep
//! byte order equal to numeric order, so "everything indexed at or below H" is
//! one bounded scan.

use serde::{Deserialize, Serialize};

use crate::name_key::{DecodeError, NameKey, NameTooLong};

/// A name indexed at the height of its last update.
///
/// A name indexed at `height` expires at `height + expiration_depth`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExpireEntry {
    pub height: u32,
    pub name: NameKey,
}

/// Pending change to one expire-index row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpireOp {
    Add,
    Remove,
}

impl ExpireEntry {
    pub fn new(height: u32, name: NameKey) -> Self {
        Self { height, name }
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), NameTooLong> {
        let mark = buf.len();
        buf.extend_from_slice(&self.height.to_be_bytes());
        if let Err(err) = self.name.encode_into(buf) {
            buf.truncate(mark);
            return Err(err);
        }
        Ok(())
    }

    pub fn encode_to_vec(&self) -> Result<Vec<u8>, NameTooLong> {
        let mut buf = Vec::with_capacity(4 + self.name.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    pub fn decode(input: &[u8]) -> Result<Self, DecodeError> {
        if input.len() < 4 {
            return Err(DecodeError::Truncated);
        }
        let mut height = [0u8; 4];
        height.copy_from_slice(&input[..4]);
        Ok(Self {
            height: u32::from_be_bytes(height),
            name: NameKey::decode(&input[4..])?,
        })
    }

    /// Prefix shared by every row indexed at `height`.
    pub fn height_prefix(height: u32) -> [u8; 4] {
        height.to_be_bytes()
    }
}

//! Name records: the current value and provenance of a registered name.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Ledger transaction output that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: [u8; 32],
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: [u8; 32], index: u32) -> Self {
        Self { txid, index }
    }
}

/// Stored state of one name.
///
/// Field order is part of the persisted format: `(value, height, update_ref, owner)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    pub value: Bytes,
    /// Height of the block containing the last update. Used for expiry.
    pub height: u32,
    pub update_ref: OutPoint,
    /// Opaque descriptor authorising the next update.
    pub owner: Bytes,
}

impl NameRecord {
    pub fn new(
        value: impl Into<Bytes>,
        height: u32,
        update_ref: OutPoint,
        owner: impl Into<Bytes>,
    ) -> Self {
        Self {
            value: value.into(),
            height,
            update_ref,
            owner: owner.into(),
        }
    }

    /// True iff the record is expired at `height` under `depth`.
    ///
    /// Heights below the update height never count as expired.
    pub fn is_expired(&self, height: u32, depth: u32) -> bool {
        match height.checked_sub(self.height) {
            Some(age) => age >= depth,
            None => false,
        }
    }

    pub fn encode(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(bytes)
    }
}

use serde::{Deserialize, Serialize};

use crate::record::NameRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NameDbOptions {
    /// Blocks after which an unrefreshed name is expired.
    pub expiration_depth: u32,
    /// Keep per-name undo stacks of superseded records.
    pub history_enabled: bool,
    /// Store-wide fsync floor. When set, every batch is synced regardless of
    /// `WriteOptions::sync`; clear it to let each write decide.
    pub fsync_writes: bool,
}

impl Default for NameDbOptions {
    fn default() -> Self {
        Self {
            expiration_depth: 36_000,
            history_enabled: false,
            fsync_writes: true,
        }
    }
}

impl NameDbOptions {
    pub fn is_expired(&self, record: &NameRecord, height: u32) -> bool {
        record.is_expired(height, self.expiration_depth)
    }

    /// Expiry against the active chain tip.
    pub fn is_expired_at_tip(&self, record: &NameRecord, tip: &dyn ChainTip) -> bool {
        self.is_expired(record, tip.tip_height())
    }

    /// Whether a batch written with `opts` is synced before it is visible.
    pub fn sync_write(&self, opts: WriteOptions) -> bool {
        self.fsync_writes || opts.sync
    }

    /// Update height whose names expire exactly at `height`, if any.
    pub fn expiring_update_height(&self, height: u32) -> Option<u32> {
        height.checked_sub(self.expiration_depth)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Sync this batch. Can only add a sync; `NameDbOptions::fsync_writes`
    /// cannot be turned off per write.
    pub sync: bool,
}

/// Height of the active chain tip, owned by the surrounding node.
pub trait ChainTip {
    fn tip_height(&self) -> u32;
}

impl ChainTip for u32 {
    fn tip_height(&self) -> u32 {
        *self
    }
}

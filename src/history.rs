//! Per-name undo stacks.

use serde::{Deserialize, Serialize};

use crate::error::ConsistencyFault;
use crate::record::NameRecord;

/// Stack of superseded records for one name, oldest first.
///
/// An empty stack means the history row should be dropped from storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameHistory {
    data: Vec<NameRecord>,
}

impl NameHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[NameRecord] {
        &self.data
    }

    pub fn top(&self) -> Option<&NameRecord> {
        self.data.last()
    }

    /// Pushes a superseded record. Heights must not decrease.
    pub fn push(&mut self, entry: NameRecord) -> Result<(), ConsistencyFault> {
        if let Some(top) = self.data.last() {
            if top.height > entry.height {
                return Err(ConsistencyFault::HistoryOutOfOrder {
                    top: top.height,
                    pushed: entry.height,
                });
            }
        }
        self.data.push(entry);
        Ok(())
    }

    /// Pops the top, which must equal `entry` (the record being restored).
    pub fn pop(&mut self, entry: &NameRecord) -> Result<(), ConsistencyFault> {
        match self.data.last() {
            None => Err(ConsistencyFault::HistoryEmpty),
            Some(top) if top != entry => Err(ConsistencyFault::HistoryMismatch {
                top: top.height,
                popped: entry.height,
            }),
            Some(_) => {
                self.data.pop();
                Ok(())
            }
        }
    }

    pub fn encode(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(bytes)
    }
}

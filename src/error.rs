use crate::name_key::{DecodeError, NameKey, NameTooLong};

/// Broken caller invariant. The current operation must abort; nothing here is
/// ever repaired in place.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsistencyFault {
    #[error("history push out of order: top height {top}, pushed height {pushed}")]
    HistoryOutOfOrder { top: u32, pushed: u32 },

    #[error("history pop on empty stack")]
    HistoryEmpty,

    #[error("history pop does not match stack top (top height {top}, popped height {popped})")]
    HistoryMismatch { top: u32, popped: u32 },

    #[error("name cache has no entries but {history} history and {expire} expire-index changes pending")]
    OrphanedCacheState { history: usize, expire: usize },

    #[error("update {name} re-applies the current update outpoint")]
    StaleUpdate { name: NameKey },

    #[error("undo of {name} does not match its current record")]
    UndoMismatch { name: NameKey },
}

#[derive(Debug, thiserror::Error)]
pub enum NameError {
    #[error("consistency fault: {0}")]
    Fault(#[from] ConsistencyFault),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    TooLong(#[from] NameTooLong),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt row: {0}")]
    Corrupt(&'static str),
}

impl NameError {
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }
}

pub type Result<T, E = NameError> = std::result::Result<T, E>;

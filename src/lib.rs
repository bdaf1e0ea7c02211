//! `kevadb` is the name layer of a ledger-backed key-value registry.
//!
//! Block processing never writes the name database directly. Changes go into a
//! `NameCache`, which:
//! - Orders names exactly like the durable store:
//!   `(namespace.len() + key.len() ASC, (namespace, key) ASC)`.
//! - Answers merged scans through `CacheNameIterator` (pending changes shadow
//!   and delete durable rows).
//! - Nests: a child cache is `apply`-ed onto its parent.
//! - Flushes into one atomic `WriteBatch`.
//!
//! Broken invariants (out-of-order history, mismatched undo) surface as
//! `ConsistencyFault` and are never healed in place.

pub mod cache;
pub mod error;
pub mod expiry;
pub mod history;
pub mod name_key;
pub mod options;
pub mod record;
pub mod store;
pub mod view;

pub use cache::{CacheNameIterator, NameCache, NameEntry, NameIterator};
pub use error::{ConsistencyFault, NameError};
pub use expiry::{ExpireEntry, ExpireOp};
pub use history::NameHistory;
pub use name_key::{NameKey, NameTooLong};
pub use options::{ChainTip, NameDbOptions, WriteOptions};
pub use record::{NameRecord, OutPoint};
pub use store::{flush, MemNameStore, NameRead, NameStore, Op, OpKind, StoreIter, WriteBatch};
pub use view::{NameUndo, NameUpdate, NameView};

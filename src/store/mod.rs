//! Durable name store contract and the reference store.
//!
//! Column layout (one byte-ordered keyspace):
//! - `n` + name encoding -> bincode `NameRecord`
//! - `h` + name encoding -> bincode `NameHistory`
//! - `x` + height BE + name encoding -> empty (expire index)

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use crossbeam_skiplist::SkipMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::cache::NameIterator;
use crate::error::NameError;
use crate::expiry::ExpireEntry;
use crate::history::NameHistory;
use crate::name_key::{NameKey, NameTooLong};
use crate::options::{NameDbOptions, WriteOptions};
use crate::record::NameRecord;

mod iter;
mod log;

pub use iter::{NameColumnIter, StoreIter};
pub use log::BatchLog;

pub const NAME_COLUMN: u8 = b'n';
pub const HISTORY_COLUMN: u8 = b'h';
pub const EXPIRE_COLUMN: u8 = b'x';

pub fn name_row_key(name: &NameKey) -> Result<Bytes, NameTooLong> {
    let mut buf = Vec::with_capacity(1 + name.encoded_len());
    buf.push(NAME_COLUMN);
    name.encode_into(&mut buf)?;
    Ok(Bytes::from(buf))
}

pub fn history_row_key(name: &NameKey) -> Result<Bytes, NameTooLong> {
    let mut buf = Vec::with_capacity(1 + name.encoded_len());
    buf.push(HISTORY_COLUMN);
    name.encode_into(&mut buf)?;
    Ok(Bytes::from(buf))
}

pub fn expire_row_key(entry: &ExpireEntry) -> Result<Bytes, NameTooLong> {
    let mut buf = Vec::with_capacity(5 + entry.name.encoded_len());
    buf.push(EXPIRE_COLUMN);
    entry.encode_into(&mut buf)?;
    Ok(Bytes::from(buf))
}

fn expire_height_prefix(height: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(EXPIRE_COLUMN);
    buf.put_slice(&ExpireEntry::height_prefix(height));
    buf.freeze()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    Put,
    Del,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Op {
    pub kind: OpKind,
    pub key: Bytes,
    pub value: Bytes,
}

impl Op {
    pub fn put(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            kind: OpKind::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Bytes>) -> Self {
        Self {
            kind: OpKind::Del,
            key: key.into(),
            value: Bytes::new(),
        }
    }
}

/// Ordered list of row writes applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<Op>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.ops.push(Op::put(key, value));
    }

    pub fn delete(&mut self, key: impl Into<Bytes>) {
        self.ops.push(Op::delete(key));
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<Op> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Read side of the name database.
pub trait NameRead {
    fn get_name(&self, name: &NameKey) -> Result<Option<NameRecord>, NameError>;

    fn get_history(&self, name: &NameKey) -> Result<Option<NameHistory>, NameError>;

    /// Names the expire index holds at exactly `height`.
    fn names_for_height(&self, height: u32) -> Result<BTreeSet<NameKey>, NameError>;

    /// Scan positioned at the first name.
    fn iter_names(&self) -> Result<Box<dyn NameIterator + '_>, NameError>;
}

pub trait NameStore: NameRead {
    fn write_batch(&self, batch: WriteBatch, opts: WriteOptions) -> Result<(), NameError>;
}

/// Skiplist-backed store with an optional batch log for durability.
///
/// Batches are applied under the write side of `commit`; readers hold the
/// read side so they never observe half a batch.
#[derive(Debug)]
pub struct MemNameStore {
    rows: SkipMap<Bytes, Bytes>,
    commit: RwLock<()>,
    log: Option<Mutex<BatchLog>>,
    options: NameDbOptions,
}

impl MemNameStore {
    pub fn in_memory() -> Self {
        Self {
            rows: SkipMap::new(),
            commit: RwLock::new(()),
            log: None,
            options: NameDbOptions::default(),
        }
    }

    /// Opens (or creates) a log-backed store in `dir`, replaying every
    /// complete batch.
    pub fn open(dir: impl AsRef<Path>, options: NameDbOptions) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).with_context(|| format!("create dir {dir:?}"))?;
        let (log, batches) = BatchLog::open(dir).context("open batch log")?;

        let rows = SkipMap::new();
        for ops in &batches {
            apply_ops(&rows, ops);
        }
        tracing::info!(
            target: "kevadb.store",
            dir = %dir.display(),
            batches = batches.len(),
            rows = rows.len(),
            "replayed name batch log"
        );

        Ok(Self {
            rows,
            commit: RwLock::new(()),
            log: Some(Mutex::new(log)),
            options,
        })
    }

    pub fn options(&self) -> &NameDbOptions {
        &self.options
    }

    pub fn len_rows(&self) -> usize {
        let _guard = self.commit.read();
        self.rows.len()
    }

    fn get_row(&self, key: &[u8]) -> Option<Bytes> {
        let _guard = self.commit.read();
        self.rows.get(key).map(|entry| entry.value().clone())
    }
}

fn apply_ops(rows: &SkipMap<Bytes, Bytes>, ops: &[Op]) {
    for op in ops {
        match op.kind {
            OpKind::Put => {
                rows.insert(op.key.clone(), op.value.clone());
            }
            OpKind::Del => {
                rows.remove(&op.key);
            }
        }
    }
}

impl NameRead for MemNameStore {
    fn get_name(&self, name: &NameKey) -> Result<Option<NameRecord>, NameError> {
        self.get_row(&name_row_key(name)?)
            .map(|bytes| NameRecord::decode(&bytes))
            .transpose()
            .map_err(NameError::from)
    }

    fn get_history(&self, name: &NameKey) -> Result<Option<NameHistory>, NameError> {
        self.get_row(&history_row_key(name)?)
            .map(|bytes| NameHistory::decode(&bytes))
            .transpose()
            .map_err(NameError::from)
    }

    fn names_for_height(&self, height: u32) -> Result<BTreeSet<NameKey>, NameError> {
        let prefix = expire_height_prefix(height);
        let _guard = self.commit.read();
        let mut names = BTreeSet::new();
        for entry in self.rows.range(prefix.clone()..) {
            let key = entry.key();
            if !key.starts_with(&prefix) {
                break;
            }
            let expire = ExpireEntry::decode(&key[1..])?;
            names.insert(expire.name);
        }
        Ok(names)
    }

    fn iter_names(&self) -> Result<Box<dyn NameIterator + '_>, NameError> {
        Ok(Box::new(NameColumnIter::new(&self.rows, &self.commit)))
    }
}

impl NameStore for MemNameStore {
    fn write_batch(&self, batch: WriteBatch, opts: WriteOptions) -> Result<(), NameError> {
        if batch.is_empty() {
            return Ok(());
        }
        let ops = batch.into_ops();
        let _guard = self.commit.write();
        if let Some(log) = &self.log {
            log.lock().append(&ops, self.options.sync_write(opts))?;
        }
        apply_ops(&self.rows, &ops);
        tracing::debug!(target: "kevadb.store", ops = ops.len(), "committed name batch");
        Ok(())
    }
}

/// Writes `cache` into `store` as one batch and clears it once the write
/// succeeded. On error the cache keeps its pending changes.
pub fn flush(
    cache: &mut crate::cache::NameCache,
    store: &dyn NameStore,
    opts: WriteOptions,
) -> Result<(), NameError> {
    let mut batch = WriteBatch::new();
    cache.write_batch(&mut batch)?;
    store.write_batch(batch, opts)?;
    cache.clear();
    Ok(())
}

//! Write-back cache of pending name changes.
//!
//! Everything a block does to the name database lands here first: new or
//! updated records, deletions, history stacks and expire-index changes. The
//! cache is then merged into an enclosing cache (`apply`), flushed into an
//! atomic batch (`write_batch`) or dropped.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;

use crate::error::{ConsistencyFault, NameError};
use crate::expiry::{ExpireEntry, ExpireOp};
use crate::history::NameHistory;
use crate::name_key::NameKey;
use crate::record::NameRecord;
use crate::store::{self, WriteBatch};

mod iter;

pub use iter::{CacheNameIterator, NameEntry, NameIterator};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameCache {
    /// New or updated names. Sorted like the durable store.
    entries: BTreeMap<NameKey, NameRecord>,
    /// Deleted names. Never overlaps `entries`.
    deleted: BTreeSet<NameKey>,
    /// New or updated history stacks. Empty stacks delete the row.
    history: BTreeMap<NameKey, NameHistory>,
    expire_index: BTreeMap<ExpireEntry, ExpireOp>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.deleted.clear();
        self.history.clear();
        self.expire_index.clear();
    }

    /// True iff no changes are cached.
    ///
    /// History or expire-index changes without any entry or deletion mean the
    /// cache was driven inconsistently and are reported as a fault.
    pub fn is_empty(&self) -> Result<bool, ConsistencyFault> {
        if !self.entries.is_empty() || !self.deleted.is_empty() {
            return Ok(false);
        }
        if !self.history.is_empty() || !self.expire_index.is_empty() {
            return Err(ConsistencyFault::OrphanedCacheState {
                history: self.history.len(),
                expire: self.expire_index.len(),
            });
        }
        Ok(true)
    }

    pub fn len_entries(&self) -> usize {
        self.entries.len()
    }

    pub fn len_deleted(&self) -> usize {
        self.deleted.len()
    }

    pub fn is_deleted(&self, name: &NameKey) -> bool {
        self.deleted.contains(name)
    }

    /// Cached record for `name`. Looks only at pending entries, not at
    /// deletions or the durable store.
    pub fn get(&self, name: &NameKey) -> Option<&NameRecord> {
        self.entries.get(name)
    }

    pub fn get_namespace(&self, namespace: impl Into<Bytes>) -> Option<&NameRecord> {
        self.get(&NameKey::namespace_record(namespace))
    }

    /// Inserts or updates a name, lifting a pending deletion.
    pub fn set(&mut self, name: NameKey, record: NameRecord) {
        self.deleted.remove(&name);
        self.entries.insert(name, record);
    }

    /// Deletes a name. Names never cached still get a tombstone so the flush
    /// removes them from the durable store.
    pub fn remove(&mut self, name: NameKey) {
        self.entries.remove(&name);
        self.deleted.insert(name);
    }

    /// Merged scan of `base` with this cache. Takes ownership of `base`.
    pub fn iterate_names<'a>(&'a self, base: Box<dyn NameIterator + 'a>) -> CacheNameIterator<'a> {
        CacheNameIterator::new(self, base)
    }

    pub fn get_history(&self, name: &NameKey) -> Option<&NameHistory> {
        self.history.get(name)
    }

    pub fn set_history(&mut self, name: NameKey, history: NameHistory) {
        self.history.insert(name, history);
    }

    pub fn add_expire_index(&mut self, name: NameKey, height: u32) {
        self.expire_index
            .insert(ExpireEntry::new(height, name), ExpireOp::Add);
    }

    pub fn remove_expire_index(&mut self, name: NameKey, height: u32) {
        self.expire_index
            .insert(ExpireEntry::new(height, name), ExpireOp::Remove);
    }

    /// Applies pending expire-index changes at `height` to `names`, the set
    /// the durable index holds for that height.
    pub fn update_names_for_height(&self, height: u32, names: &mut BTreeSet<NameKey>) {
        let start = ExpireEntry::new(height, NameKey::new(Bytes::new(), Bytes::new()));
        for (entry, op) in self
            .expire_index
            .range(start..)
            .take_while(|(entry, _)| entry.height == height)
        {
            match op {
                ExpireOp::Add => {
                    names.insert(entry.name.clone());
                }
                ExpireOp::Remove => {
                    names.remove(&entry.name);
                }
            }
        }
    }

    /// Applies `other` on top of this cache, as if `other` were flushed into it.
    pub fn apply(&mut self, other: &NameCache) {
        for (name, record) in &other.entries {
            self.set(name.clone(), record.clone());
        }
        for name in &other.deleted {
            self.remove(name.clone());
        }
        for (name, history) in &other.history {
            self.history.insert(name.clone(), history.clone());
        }
        for (entry, op) in &other.expire_index {
            self.expire_index.insert(entry.clone(), *op);
        }
        tracing::debug!(
            target: "kevadb.cache",
            entries = other.entries.len(),
            deleted = other.deleted.len(),
            history = other.history.len(),
            expire = other.expire_index.len(),
            "applied child name cache"
        );
    }

    /// Writes every cached change into `batch`. The cache itself is left
    /// untouched; callers clear it once the batch is durable.
    pub fn write_batch(&self, batch: &mut WriteBatch) -> Result<(), NameError> {
        for (name, record) in &self.entries {
            batch.put(store::name_row_key(name)?, record.encode()?);
        }
        for name in &self.deleted {
            batch.delete(store::name_row_key(name)?);
        }
        for (name, history) in &self.history {
            if history.is_empty() {
                batch.delete(store::history_row_key(name)?);
            } else {
                batch.put(store::history_row_key(name)?, history.encode()?);
            }
        }
        for (entry, op) in &self.expire_index {
            match op {
                ExpireOp::Add => batch.put(store::expire_row_key(entry)?, Bytes::new()),
                ExpireOp::Remove => batch.delete(store::expire_row_key(entry)?),
            }
        }
        tracing::debug!(
            target: "kevadb.cache",
            puts = self.entries.len(),
            deletes = self.deleted.len(),
            history = self.history.len(),
            expire = self.expire_index.len(),
            "wrote name cache to batch"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::OutPoint;

    fn record(value: &'static str, height: u32) -> NameRecord {
        NameRecord::new(value, height, OutPoint::new([1; 32], height), "o")
    }

    #[test]
    fn set_and_remove_keep_entries_and_deleted_disjoint() {
        let mut cache = NameCache::new();
        let name = NameKey::new("a", "x");

        cache.set(name.clone(), record("1", 1));
        assert_eq!(cache.get(&name), Some(&record("1", 1)));
        assert!(!cache.is_deleted(&name));

        cache.remove(name.clone());
        assert_eq!(cache.get(&name), None);
        assert!(cache.is_deleted(&name));

        cache.set(name.clone(), record("2", 2));
        assert!(!cache.is_deleted(&name));
        assert_eq!(cache.len_entries(), 1);
        assert_eq!(cache.len_deleted(), 0);
    }

    #[test]
    fn orphaned_history_is_a_fault() {
        let mut cache = NameCache::new();
        assert_eq!(cache.is_empty(), Ok(true));

        cache.set_history(NameKey::new("a", "x"), NameHistory::new());
        assert!(matches!(
            cache.is_empty(),
            Err(ConsistencyFault::OrphanedCacheState { history: 1, expire: 0 })
        ));

        cache.remove(NameKey::new("a", "x"));
        assert_eq!(cache.is_empty(), Ok(false));

        cache.clear();
        assert_eq!(cache.is_empty(), Ok(true));
    }

    #[test]
    fn update_names_for_height_only_touches_that_height() {
        let mut cache = NameCache::new();
        cache.add_expire_index(NameKey::new("a", "new"), 10);
        cache.remove_expire_index(NameKey::new("a", "old"), 10);
        cache.add_expire_index(NameKey::new("a", "other"), 11);
        cache.add_expire_index(NameKey::new("a", "before"), 9);

        let mut names: BTreeSet<NameKey> =
            [NameKey::new("a", "old"), NameKey::new("a", "kept")].into();
        cache.update_names_for_height(10, &mut names);

        let expected: BTreeSet<NameKey> =
            [NameKey::new("a", "new"), NameKey::new("a", "kept")].into();
        assert_eq!(names, expected);
    }
}

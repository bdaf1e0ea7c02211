use std::ops::Bound;

use bytes::Bytes;
use crossbeam_skiplist::SkipMap;
use parking_lot::RwLock;

use crate::cache::{NameEntry, NameIterator};
use crate::error::NameError;
use crate::name_key::NameKey;
use crate::record::NameRecord;

use super::{name_row_key, NAME_COLUMN};

/// Scan over an already materialized, sorted run of names.
pub struct StoreIter {
    entries: Vec<NameEntry>,
    index: usize,
}

impl StoreIter {
    /// `entries` must already be in ascending name order.
    pub fn new(entries: Vec<NameEntry>) -> Self {
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        Self { entries, index: 0 }
    }

    pub fn seek_to_first(&mut self) {
        self.index = 0;
    }
}

impl NameIterator for StoreIter {
    fn seek(&mut self, start: &NameKey) {
        self.index = match self.entries.binary_search_by(|(name, _)| name.cmp(start)) {
            Ok(i) | Err(i) => i,
        };
    }
}

impl Iterator for StoreIter {
    type Item = Result<NameEntry, NameError>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.get(self.index)?.clone();
        self.index += 1;
        Some(Ok(entry))
    }
}

/// Cursor over the name column of a `MemNameStore`.
///
/// Rows are read one at a time under the commit gate, so every step sees
/// whole batches and a seek costs one skiplist search. Batches committed
/// during the scan are visible for rows the cursor has not reached yet.
pub struct NameColumnIter<'a> {
    rows: &'a SkipMap<Bytes, Bytes>,
    commit: &'a RwLock<()>,
    from: Bound<Bytes>,
    done: bool,
}

impl<'a> NameColumnIter<'a> {
    pub(super) fn new(rows: &'a SkipMap<Bytes, Bytes>, commit: &'a RwLock<()>) -> Self {
        Self {
            rows,
            commit,
            from: Bound::Included(Bytes::from_static(&[NAME_COLUMN])),
            done: false,
        }
    }

    fn lower_bound(&self) -> Option<(Bytes, Bytes)> {
        let bound = match &self.from {
            Bound::Included(key) => Bound::Included(key.as_ref()),
            Bound::Excluded(key) => Bound::Excluded(key.as_ref()),
            Bound::Unbounded => Bound::Unbounded,
        };
        let _guard = self.commit.read();
        self.rows
            .lower_bound(bound)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
    }
}

impl NameIterator for NameColumnIter<'_> {
    fn seek(&mut self, start: &NameKey) {
        match name_row_key(start) {
            Ok(key) => {
                self.from = Bound::Included(key);
                self.done = false;
            }
            // Longer than any stored name.
            Err(_) => self.done = true,
        }
    }
}

impl Iterator for NameColumnIter<'_> {
    type Item = Result<NameEntry, NameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some((key, value)) = self.lower_bound() else {
            self.done = true;
            return None;
        };
        if key.first() != Some(&NAME_COLUMN) {
            self.done = true;
            return None;
        }
        let entry = NameKey::decode(&key[1..])
            .map_err(NameError::from)
            .and_then(|name| Ok((name, NameRecord::decode(&value)?)));
        match &entry {
            Ok(_) => self.from = Bound::Excluded(key),
            Err(_) => self.done = true,
        }
        Some(entry)
    }
}

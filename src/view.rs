//! A processing unit: a `NameCache` layered over a base reader.
//!
//! Reads through a view see the cache's pending changes on top of the base.
//! The base is either a durable store or an enclosing view, which gives nested
//! staging: finish the child with `into_cache` and `apply` it to the parent.

use std::collections::BTreeSet;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::cache::{NameCache, NameIterator};
use crate::error::{ConsistencyFault, NameError};
use crate::history::NameHistory;
use crate::name_key::NameKey;
use crate::options::NameDbOptions;
use crate::record::{NameRecord, OutPoint};
use crate::store::NameRead;

/// Validated name operation extracted from a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameUpdate {
    pub name: NameKey,
    pub value: Bytes,
    pub update_ref: OutPoint,
    pub owner: Bytes,
}

impl NameUpdate {
    fn into_record(self, height: u32) -> NameRecord {
        NameRecord {
            value: self.value,
            height,
            update_ref: self.update_ref,
            owner: self.owner,
        }
    }
}

/// What `undo_update` needs to revert one applied update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameUndo {
    pub name: NameKey,
    pub height: u32,
    pub update_ref: OutPoint,
    /// Record before the update, `None` if the name was new.
    pub previous: Option<NameRecord>,
}

pub struct NameView<'a> {
    base: &'a dyn NameRead,
    cache: NameCache,
}

impl<'a> NameView<'a> {
    pub fn new(base: &'a dyn NameRead) -> Self {
        Self::with_cache(base, NameCache::new())
    }

    pub fn with_cache(base: &'a dyn NameRead, cache: NameCache) -> Self {
        Self { base, cache }
    }

    pub fn cache(&self) -> &NameCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut NameCache {
        &mut self.cache
    }

    pub fn into_cache(self) -> NameCache {
        self.cache
    }

    pub fn get_namespace(&self, namespace: impl Into<Bytes>) -> Result<Option<NameRecord>, NameError> {
        self.get_name(&NameKey::namespace_record(namespace))
    }

    /// Names whose records expire exactly at `height`.
    pub fn names_expiring_at(
        &self,
        height: u32,
        options: &NameDbOptions,
    ) -> Result<BTreeSet<NameKey>, NameError> {
        match options.expiring_update_height(height) {
            Some(update_height) => self.names_for_height(update_height),
            None => Ok(BTreeSet::new()),
        }
    }

    /// Applies a validated update at `height` and returns its undo data.
    pub fn apply_update(
        &mut self,
        update: NameUpdate,
        height: u32,
        options: &NameDbOptions,
    ) -> Result<NameUndo, NameError> {
        let name = update.name.clone();
        let previous = self.get_name(&name)?;

        if let Some(old) = &previous {
            if old.update_ref == update.update_ref {
                return Err(ConsistencyFault::StaleUpdate { name }.into());
            }
            if options.history_enabled {
                let mut history = self.get_history(&name)?.unwrap_or_default();
                history.push(old.clone())?;
                self.cache.set_history(name.clone(), history);
            }
            self.cache.remove_expire_index(name.clone(), old.height);
        }

        let undo = NameUndo {
            name: name.clone(),
            height,
            update_ref: update.update_ref,
            previous,
        };
        self.cache.set(name.clone(), update.into_record(height));
        self.cache.add_expire_index(name, height);

        tracing::debug!(
            target: "kevadb.view",
            name = %undo.name,
            height,
            new = undo.previous.is_none(),
            "applied name update"
        );
        Ok(undo)
    }

    /// Reverts an update previously returned by `apply_update`.
    pub fn undo_update(&mut self, undo: &NameUndo, options: &NameDbOptions) -> Result<(), NameError> {
        let name = undo.name.clone();
        match self.get_name(&name)? {
            Some(current)
                if current.height == undo.height && current.update_ref == undo.update_ref => {}
            _ => return Err(ConsistencyFault::UndoMismatch { name }.into()),
        }
        self.cache.remove_expire_index(name.clone(), undo.height);

        match &undo.previous {
            Some(prev) => {
                if options.history_enabled {
                    let mut history = self.get_history(&name)?.unwrap_or_default();
                    history.pop(prev)?;
                    self.cache.set_history(name.clone(), history);
                }
                self.cache.set(name.clone(), prev.clone());
                self.cache.add_expire_index(name, prev.height);
            }
            None => self.cache.remove(name),
        }

        tracing::debug!(
            target: "kevadb.view",
            name = %undo.name,
            height = undo.height,
            "undid name update"
        );
        Ok(())
    }
}

impl NameRead for NameView<'_> {
    fn get_name(&self, name: &NameKey) -> Result<Option<NameRecord>, NameError> {
        if self.cache.is_deleted(name) {
            return Ok(None);
        }
        match self.cache.get(name) {
            Some(record) => Ok(Some(record.clone())),
            None => self.base.get_name(name),
        }
    }

    fn get_history(&self, name: &NameKey) -> Result<Option<NameHistory>, NameError> {
        match self.cache.get_history(name) {
            Some(history) => Ok(Some(history.clone())),
            None => self.base.get_history(name),
        }
    }

    fn names_for_height(&self, height: u32) -> Result<BTreeSet<NameKey>, NameError> {
        let mut names = self.base.names_for_height(height)?;
        self.cache.update_names_for_height(height, &mut names);
        Ok(names)
    }

    fn iter_names(&self) -> Result<Box<dyn NameIterator + '_>, NameError> {
        let base = self.base.iter_names()?;
        Ok(Box::new(self.cache.iterate_names(base)))
    }
}

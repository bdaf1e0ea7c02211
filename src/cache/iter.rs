use std::cmp::Ordering;
use std::collections::btree_map;
use std::iter::Peekable;

use crate::error::NameError;
use crate::name_key::NameKey;
use crate::record::NameRecord;

use super::NameCache;

pub type NameEntry = (NameKey, NameRecord);

/// Ordered scan over names.
///
/// Yield order: ascending `NameKey`. `seek` moves to the first name `>= start`;
/// seeking past the end is allowed and exhausts the iterator.
pub trait NameIterator: Iterator<Item = Result<NameEntry, NameError>> {
    fn seek(&mut self, start: &NameKey);
}

impl<I: NameIterator + ?Sized> NameIterator for Box<I> {
    fn seek(&mut self, start: &NameKey) {
        (**self).seek(start);
    }
}

/// Durable names with a cache's pending changes applied on top.
///
/// Owns the base iterator; borrows the cache, so the cache cannot change while
/// the scan is live.
pub struct CacheNameIterator<'a> {
    cache: &'a NameCache,
    base: Box<dyn NameIterator + 'a>,
    next_base: Option<NameEntry>,
    cached: Peekable<btree_map::Range<'a, NameKey, NameRecord>>,
}

impl<'a> CacheNameIterator<'a> {
    pub(super) fn new(cache: &'a NameCache, base: Box<dyn NameIterator + 'a>) -> Self {
        Self {
            cache,
            base,
            next_base: None,
            cached: cache.entries.range::<NameKey, _>(..).peekable(),
        }
    }
}

impl NameIterator for CacheNameIterator<'_> {
    fn seek(&mut self, start: &NameKey) {
        self.base.seek(start);
        self.next_base = None;
        self.cached = self.cache.entries.range(start.clone()..).peekable();
    }
}

impl Iterator for CacheNameIterator<'_> {
    type Item = Result<NameEntry, NameError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.next_base.is_none() {
                match self.base.next() {
                    Some(Ok(v)) => self.next_base = Some(v),
                    Some(Err(e)) => return Some(Err(e)),
                    None => {}
                }
            }

            if let Some((name, _)) = &self.next_base {
                if self.cache.is_deleted(name) {
                    self.next_base = None;
                    continue;
                }
            }

            let order = match (&self.next_base, self.cached.peek()) {
                (None, None) => return None,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some((base_name, _)), Some((cached_name, _))) => base_name.cmp(cached_name),
            };

            return match order {
                Ordering::Less => self.next_base.take().map(Ok),
                Ordering::Equal => {
                    // Cached entry shadows the stale durable copy.
                    self.next_base = None;
                    self.cached
                        .next()
                        .map(|(name, record)| Ok((name.clone(), record.clone())))
                }
                Ordering::Greater => self
                    .cached
                    .next()
                    .map(|(name, record)| Ok((name.clone(), record.clone()))),
            };
        }
    }
}

use dashmap::DashMap;
use log::debug;
use std::hash::Hash;

use crate::store::Change;

/// One hash index over a volatile collection, keyed by a field of `T`.
///
/// The index is never a second source of truth: [`get_or_repair`] falls back
/// to a caller-supplied scan of the source collection and re-inserts what it
/// finds.
///
/// [`get_or_repair`]: KeyIndex::get_or_repair
pub(crate) struct KeyIndex<K, T> {
    label: &'static str,
    entries: DashMap<K, T>,
    key_of: fn(&T) -> K,
}

impl<K, T> KeyIndex<K, T>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    T: Clone,
{
    pub(crate) fn new(label: &'static str, key_of: fn(&T) -> K) -> Self {
        Self {
            label,
            entries: DashMap::new(),
            key_of,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn get(&self, key: &K) -> Option<T> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Index hit, else `scan` the source; a scan hit repairs the index.
    pub(crate) fn get_or_repair(&self, key: &K, scan: impl FnOnce() -> Option<T>) -> Option<T> {
        if let Some(hit) = self.get(key) {
            return Some(hit);
        }
        let found = scan()?;
        debug!("{} cache miss for {:?} repaired from source scan", self.label, key);
        self.insert(&found);
        Some(found)
    }

    pub(crate) fn insert(&self, item: &T) {
        self.entries.insert((self.key_of)(item), item.clone());
    }

    /// Drop the entry keyed by `item`.
    pub(crate) fn remove(&self, item: &T) {
        self.entries.remove(&(self.key_of)(item));
    }

    /// Re-key on replace: drop the old key when the key field changed.
    pub(crate) fn replace(&self, old: &T, new: &T) {
        let old_key = (self.key_of)(old);
        let new_key = (self.key_of)(new);
        if old_key != new_key {
            self.entries.remove(&old_key);
        }
        self.entries.insert(new_key, new.clone());
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }

    /// Rebuild from the full current content of the source.
    pub(crate) fn seed<'a>(&self, items: impl IntoIterator<Item = &'a T>)
    where
        T: 'a,
    {
        self.entries.clear();
        for item in items {
            self.insert(item);
        }
    }

    /// Apply a change batch from a collection whose items are `T`.
    pub(crate) fn apply(&self, changes: &[Change<T>]) {
        for change in changes {
            match change {
                Change::Added { item, .. } => self.insert(item),
                Change::Replaced { old, new, .. } => self.replace(old, new),
                Change::Removed { item, .. } => self.remove(item),
                Change::Cleared { .. } => self.clear(),
            }
        }
    }

    /// Rewrite in place every entry for which `rewrite` returns a new value.
    /// Keys are left untouched. Returns how many entries changed.
    pub(crate) fn rewrite(&self, rewrite: impl Fn(&T) -> Option<T>) -> usize {
        let mut changed = 0;
        for mut entry in self.entries.iter_mut() {
            if let Some(updated) = rewrite(entry.value()) {
                *entry.value_mut() = updated;
                changed += 1;
            }
        }
        changed
    }
}

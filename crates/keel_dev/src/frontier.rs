//! The invalidation frontier.

use std::collections::{BTreeMap, BTreeSet};

use keel_cache::CacheEntry;

/// The set of modules known to be stale in the current pass.
///
/// Seeded with the modules a batch of file changes touched directly, then
/// closed over the cache's reverse edges: anything that imports a stale
/// module, directly or transitively, is stale too. Closing always runs to a
/// fixed point before any rebuild starts, so no module is rebuilt twice for
/// one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationFrontier {
    seeds: BTreeSet<String>,
    keys: BTreeSet<String>,
}

impl InvalidationFrontier {
    /// Creates an empty frontier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directly invalidated module.
    pub fn seed(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.keys.insert(key.clone());
        self.seeds.insert(key);
    }

    /// Expands the frontier with every transitive dependent recorded in
    /// `entries`. Returns the number of modules added.
    pub fn close(&mut self, entries: &BTreeMap<String, CacheEntry>) -> usize {
        let before = self.keys.len();
        let mut stack: Vec<String> = self.keys.iter().cloned().collect();
        while let Some(key) = stack.pop() {
            let Some(entry) = entries.get(&key) else {
                continue;
            };
            for dependent in &entry.dependents {
                if self.keys.insert(dependent.clone()) {
                    stack.push(dependent.clone());
                }
            }
        }
        self.keys.len() - before
    }

    /// Modules invalidated directly by the batch.
    pub fn seeds(&self) -> &BTreeSet<String> {
        &self.seeds
    }

    /// Every module in the frontier.
    pub fn keys(&self) -> &BTreeSet<String> {
        &self.keys
    }

    /// Returns `true` if `key` is in the frontier.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Drops `key`, for example because its file was deleted before its
    /// rebuild started.
    pub fn remove(&mut self, key: &str) -> bool {
        self.seeds.remove(key);
        self.keys.remove(key)
    }

    /// Number of modules in the frontier.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` once the frontier has been consumed.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Empties the frontier.
    pub fn clear(&mut self) {
        self.seeds.clear();
        self.keys.clear();
    }
}

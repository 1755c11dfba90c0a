use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::model::StorageMode;

/// Disjoint assignment of keys to storage modes
///
/// Each known key belongs to exactly one mode; moving a key between modes
/// is O(1). Membership says nothing about position: callers iterate their
/// own order and filter by mode.
#[derive(Debug, Clone)]
pub struct GroupPartition<K> {
    assignment: HashMap<K, StorageMode>,
    members: HashMap<StorageMode, HashSet<K>>,
}

impl<K> Default for GroupPartition<K> {
    fn default() -> Self {
        Self {
            assignment: HashMap::new(),
            members: HashMap::new(),
        }
    }
}

impl<K> GroupPartition<K>
where
    K: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `key` in `mode`, removing it from any previous group
    pub fn assign(&mut self, key: K, mode: StorageMode) {
        if let Some(previous) = self.assignment.insert(key.clone(), mode) {
            if previous == mode {
                return;
            }
            if let Some(set) = self.members.get_mut(&previous) {
                set.remove(&key);
            }
        }
        self.members.entry(mode).or_default().insert(key);
    }

    /// Forget `key`, returning the mode it belonged to
    pub fn remove(&mut self, key: &K) -> Option<StorageMode> {
        let mode = self.assignment.remove(key)?;
        if let Some(set) = self.members.get_mut(&mode) {
            set.remove(key);
        }
        Some(mode)
    }

    pub fn mode_of(&self, key: &K) -> Option<StorageMode> {
        self.assignment.get(key).copied()
    }

    pub fn contains(&self, mode: StorageMode, key: &K) -> bool {
        self.mode_of(key) == Some(mode)
    }

    /// Members of `mode` in no particular order
    pub fn members(&self, mode: StorageMode) -> impl Iterator<Item = &K> + '_ {
        self.members.get(&mode).into_iter().flatten()
    }

    pub fn len(&self, mode: StorageMode) -> usize {
        self.members.get(&mode).map_or(0, HashSet::len)
    }

    pub fn total(&self) -> usize {
        self.assignment.len()
    }

    pub fn clear(&mut self) {
        self.assignment.clear();
        self.members.clear();
    }
}

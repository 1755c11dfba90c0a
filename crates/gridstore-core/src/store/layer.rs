use std::rc::Rc;

use serde_json::{Map, Value};

use super::snapshot::LayerSnapshot;
use crate::collections::selectable::SelectablePredicate;
use crate::collections::{GroupPartition, SelectableOrderedCollection};
use crate::errors::{Result, StorageError};
use crate::model::{Anchor, LayerId, ObjectId, ObjectState, StorageMode};

/// Objects placed in one (grid, layer)
///
/// Combines the ordered object collection with the question/answer/ui
/// partition and a small scratch record. Only `set_object` changes the
/// objects; the storage manager routes every logged edit through it.
/// Selection and scratch state are never recorded in history.
#[derive(Debug, Clone)]
pub struct LayerObjectStore {
    layer_id: LayerId,
    objects: SelectableOrderedCollection<ObjectId, ObjectState>,
    groups: GroupPartition<ObjectId>,
    scratch: Map<String, Value>,
}

impl LayerObjectStore {
    /// Create an empty store in which every object is selectable
    pub fn new(layer_id: impl Into<LayerId>) -> Self {
        Self {
            layer_id: layer_id.into(),
            objects: SelectableOrderedCollection::all_selectable(),
            groups: GroupPartition::new(),
            scratch: Map::new(),
        }
    }

    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    /// Create, overwrite, or delete one object
    ///
    /// `None` removes the object from the collection and its group. A
    /// payload upserts the object at `anchor` and moves it into `mode`.
    ///
    /// # Returns
    /// `false` if `anchor` named an object that is not present, in which
    /// case the object was placed at the tail instead.
    pub(crate) fn set_object(
        &mut self,
        mode: StorageMode,
        id: &str,
        object: Option<ObjectState>,
        anchor: &Anchor,
    ) -> bool {
        let key = id.to_string();
        match object {
            None => {
                self.objects.delete(&key);
                self.groups.remove(&key);
                true
            }
            Some(value) => {
                let before = anchor.key().map(str::to_string);
                let anchor_found = self.objects.set(key.clone(), value, before.as_ref());
                self.groups.assign(key, mode);
                anchor_found
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&ObjectState> {
        self.objects.get(&id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.has(&id.to_string())
    }

    pub fn mode_of(&self, id: &str) -> Option<StorageMode> {
        self.groups.mode_of(&id.to_string())
    }

    /// The object ordered immediately after `id`, across all modes
    pub fn successor(&self, id: &str) -> Option<&ObjectId> {
        self.objects.next(&id.to_string())
    }

    /// The object ordered immediately before `id`, across all modes
    pub fn predecessor(&self, id: &str) -> Option<&ObjectId> {
        self.objects.prev(&id.to_string())
    }

    /// Anchor that would put `id` back exactly where it sits now
    pub fn anchor_of(&self, id: &str) -> Anchor {
        self.successor(id).cloned().into()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Entries of `mode` in the store's total order
    pub fn entries(&self, mode: StorageMode) -> impl Iterator<Item = (&ObjectId, &ObjectState)> + '_ {
        self.objects
            .iter()
            .filter(move |(k, _)| self.groups.contains(mode, k))
    }

    /// Keys of `mode` in the store's total order
    pub fn keys(&self, mode: StorageMode) -> impl Iterator<Item = &ObjectId> + '_ {
        self.entries(mode).map(|(k, _)| k)
    }

    /// All keys in total order, regardless of mode
    pub fn all_keys(&self) -> impl Iterator<Item = &ObjectId> + '_ {
        self.objects.keys()
    }

    /// Delete every member of `mode` (not recorded in history)
    pub(crate) fn clear_group(&mut self, mode: StorageMode) -> usize {
        let members: Vec<ObjectId> = self.groups.members(mode).cloned().collect();
        for key in &members {
            self.objects.delete(key);
            self.groups.remove(key);
        }
        members.len()
    }

    // ===== Selection =====

    pub fn set_selectable(&mut self, selectable: SelectablePredicate<ObjectState>) {
        self.objects.set_selectable(selectable);
    }

    pub fn set_selectable_fn<F>(&mut self, selectable: F)
    where
        F: Fn(&ObjectState) -> bool + 'static,
    {
        self.set_selectable(Rc::new(selectable));
    }

    pub fn current_key(&self) -> Option<&ObjectId> {
        self.objects.current_key()
    }

    pub fn select(&mut self, id: &str) -> bool {
        self.objects.select(&id.to_string())
    }

    pub fn clear_selection(&mut self) {
        self.objects.clear_selection();
    }

    // ===== Scratch =====

    pub fn scratch(&self) -> &Map<String, Value> {
        &self.scratch
    }

    pub fn scratch_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.scratch
    }

    // ===== Snapshots =====

    /// Plain-data copy of order, payloads, and group assignment
    pub fn snapshot(&self) -> LayerSnapshot {
        let mut snapshot = LayerSnapshot::default();
        for (key, value) in self.objects.iter() {
            snapshot.order.push(key.clone());
            snapshot.map.insert(key.clone(), value.clone());
            if let Some(mode) = self.groups.mode_of(key) {
                snapshot.groups.insert(key.clone(), mode);
            }
        }
        snapshot
    }

    /// Replace the store's objects with a snapshot's contents
    ///
    /// Selection is cleared; scratch state is kept.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSnapshot` if the snapshot's order, map, and groups
    /// do not name exactly the same keys once each. The store is left
    /// unchanged in that case.
    pub(crate) fn restore(&mut self, snapshot: LayerSnapshot) -> Result<()> {
        snapshot.validate().map_err(|reason| StorageError::InvalidSnapshot {
            layer_id: self.layer_id.clone(),
            reason,
        })?;

        let LayerSnapshot {
            order,
            mut map,
            groups,
        } = snapshot;

        self.objects.clear();
        self.groups.clear();
        for key in order {
            let (Some(value), Some(mode)) = (map.remove(&key), groups.get(&key)) else {
                continue;
            };
            self.objects.set(key.clone(), value, None);
            self.groups.assign(key, *mode);
        }
        self.objects.clear_selection();
        Ok(())
    }
}

//! Retroactive recomputation of edit logs against the current filters
//!
//! A scrub rewinds a log to its start, then replays every entry in
//! chronological order into a fresh log, as if the current filter set had
//! always been registered:
//! - synthesized entries are replayed unfiltered;
//! - rejected entries are excised, and later anchors naming an excised
//!   object resolve to where it would have been;
//! - extra actions are only emitted for (entry, filter) pairs that have
//!   not contributed before.
//!
//! Entry ids survive the rebuild, so the processed-pair index stays valid
//! across repeated scrubs. The cursor ends on the same surviving entry it
//! was on before.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::{apply_to, StorageManager};
use crate::collections::OrderedKeyedCollection;
use crate::errors::Result;
use crate::filters::FilterContext;
use crate::history::{EditLog, EntryId};
use crate::model::{Anchor, HistoryAction, HistoryContext, LayerId, ObjectId};
use crate::store::LayerObjectStore;

/// Layer orders as they would be had excised objects been kept
///
/// Excised objects stay here as ghosts. Invariant: a store's order is its
/// shadow order restricted to the objects the store holds, so an anchor
/// naming a ghost resolves to the first real object after it.
#[derive(Debug, Default)]
struct ShadowOrder {
    layers: HashMap<LayerId, OrderedKeyedCollection<ObjectId, ()>>,
}

impl ShadowOrder {
    /// Copy of `action` with its anchor translated into one the store holds
    ///
    /// Starts shadowing the store's layer on first use.
    fn place(&mut self, store: &LayerObjectStore, action: &HistoryAction) -> HistoryAction {
        let order = self
            .layers
            .entry(store.layer_id().to_string())
            .or_insert_with(|| {
                let mut order = OrderedKeyedCollection::new();
                for key in store.all_keys() {
                    order.set(key.clone(), (), None);
                }
                order
            });

        let anchor = match &action.anchor {
            Anchor::Before(key) if !store.contains(key) && order.has(key) => {
                let mut next = order.next(key);
                loop {
                    match next {
                        Some(candidate) if store.contains(candidate) => {
                            break Anchor::before(candidate.clone())
                        }
                        Some(candidate) => next = order.next(candidate),
                        None => break Anchor::End,
                    }
                }
            }
            anchor => anchor.clone(),
        };
        HistoryAction {
            anchor,
            ..action.clone()
        }
    }

    /// Mirror an action, applied or excised, in its layer's shadow
    fn track(&mut self, action: &HistoryAction) {
        let Some(order) = self.layers.get_mut(&action.layer_id) else {
            return;
        };
        match &action.object {
            None => {
                order.delete(&action.object_id);
            }
            Some(_) => {
                let before = action.anchor.key().map(str::to_string);
                order.set(action.object_id.clone(), (), before.as_ref());
            }
        }
    }
}

impl StorageManager {
    /// Scrub every log with an entry on one of `layers`
    ///
    /// Not atomic by itself; the caller restores state on error.
    pub(super) fn scrub_layers(&mut self, layers: &BTreeSet<LayerId>) -> Result<()> {
        let mut targets: Vec<HistoryContext> = self
            .logs
            .iter()
            .filter(|(_, log)| layers.iter().any(|layer| log.touches_layer(layer)))
            .map(|(ctx, _)| ctx.clone())
            .collect();
        targets.sort();

        for ctx in &targets {
            self.scrub_log(ctx)?;
        }
        Ok(())
    }

    fn scrub_log(&mut self, ctx: &HistoryContext) -> Result<()> {
        let stores = &mut self.stores;
        let Some(log) = self.logs.get_mut(ctx) else {
            return Ok(());
        };
        let done = log.index();
        log.rewind_to(0, |action| apply_to(stores, &ctx.grid_id, action));
        let entries = log.take_entries();
        let original_len = entries.len();

        let mut shadow = ShadowOrder::default();
        let mut rebuilt_done = None;
        let mut excised_count = 0usize;
        let mut extra_count = 0usize;

        for (position, entry) in entries.into_iter().enumerate() {
            if position == done {
                rebuilt_done = Some(self.logs.get(ctx).map_or(0, EditLog::len));
            }

            let storage = ctx.storage_ref(entry.action.layer_id.clone());
            let Some(store) = self.stores.get(&storage) else {
                continue;
            };
            let original = entry.action;
            let mut action = shadow.place(store, &original);

            if entry.synthesized {
                self.apply_and_record(ctx, &action, true, Some(entry.id));
                shadow.track(&original);
                continue;
            }

            let evaluation = {
                let filter_ctx = FilterContext::new(ctx, &self.stores);
                let pipeline = &self.pipeline;
                pipeline.evaluate(&filter_ctx, &action, |filter| {
                    pipeline.is_processed(ctx, entry.id, filter)
                })?
            };

            let extras = self.resolve_extras(ctx, &mut action, evaluation.extra_actions)?;
            extra_count += extras.len();
            if evaluation.keep {
                let recorded = self.apply_and_record(ctx, &action, false, Some(entry.id));
                shadow.track(&original);
                if let Some(owner) = recorded.entry_id() {
                    self.pipeline.mark_processed(ctx, owner, &evaluation.consulted);
                }
            } else {
                excised_count += 1;
                let absent = self
                    .stores
                    .get(&storage)
                    .is_some_and(|store| !store.contains(&original.object_id));
                if absent {
                    shadow.track(&original);
                }
            }
            self.replay_extras(ctx, &mut shadow, extras);
        }

        let stores = &mut self.stores;
        let log = self.logs.entry(ctx.clone()).or_default();
        let target = rebuilt_done.unwrap_or(log.len());
        log.rewind_to(target, |action| apply_to(stores, &ctx.grid_id, action));

        let live: HashSet<EntryId> = log.entries().iter().map(|e| e.id).collect();
        log.take_discarded();
        self.pipeline.retain_entries(ctx, |entry| live.contains(&entry));

        tracing::info!(
            grid_id = %ctx.grid_id,
            edit_mode = %ctx.edit_mode,
            original_len,
            history_len = live.len(),
            history_index = target,
            excised = excised_count,
            extra_actions = extra_count,
            "edit log scrubbed"
        );
        Ok(())
    }

    fn replay_extras(
        &mut self,
        ctx: &HistoryContext,
        shadow: &mut ShadowOrder,
        extras: Vec<HistoryAction>,
    ) {
        for extra in extras {
            let Some(store) = self.stores.get(&ctx.storage_ref(extra.layer_id.clone())) else {
                continue;
            };
            let placed = shadow.place(store, &extra);
            self.apply_and_record(ctx, &placed, true, None);
            shadow.track(&extra);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{FilterDescriptor, FilterResult, StorageFilter};
    use crate::model::{PartialHistoryAction, StorageMode, StorageRef};
    use serde_json::json;

    fn reject(id: &'static str) -> StorageFilter {
        StorageFilter::new(move |_, action: &HistoryAction| {
            Ok(if action.object_id == id {
                FilterResult::reject()
            } else {
                FilterResult::keep()
            })
        })
    }

    fn set(id: &str, anchor: Anchor) -> HistoryAction {
        HistoryAction {
            object_id: id.to_string(),
            layer_id: "l".to_string(),
            batch_id: None,
            storage_mode: StorageMode::Question,
            object: Some(json!(1)),
            anchor,
        }
    }

    fn store_with(keys: &[&str]) -> LayerObjectStore {
        let mut store = LayerObjectStore::new("l");
        for key in keys {
            store.set_object(StorageMode::Question, key, Some(json!(1)), &Anchor::End);
        }
        store
    }

    #[test]
    fn test_shadow_resolves_ghost_to_next_real_object() {
        let mut store = store_with(&["y", "w"]);
        let mut shadow = ShadowOrder::default();
        let ghost = set("x", Anchor::before("y"));
        shadow.place(&store, &ghost);
        shadow.track(&ghost);

        // y goes away after the ghost was placed before it
        let delete_y = set("y", Anchor::End).into_delete();
        store.set_object(StorageMode::Question, "y", None, &Anchor::End);
        shadow.track(&delete_y);

        let placed = shadow.place(&store, &set("z", Anchor::before("x")));
        assert_eq!(placed.anchor, Anchor::before("w"));
    }

    #[test]
    fn test_shadow_leaves_other_anchors_alone() {
        let store = store_with(&["a"]);
        let mut shadow = ShadowOrder::default();
        let ghost = set("g", Anchor::End);
        shadow.place(&store, &ghost);
        shadow.track(&ghost);

        assert_eq!(shadow.place(&store, &set("z", Anchor::before("a"))).anchor, Anchor::before("a"));
        assert_eq!(shadow.place(&store, &set("z", Anchor::before("zz"))).anchor, Anchor::before("zz"));
        assert_eq!(shadow.place(&store, &set("z", Anchor::before("g"))).anchor, Anchor::End);
        assert_eq!(shadow.place(&store, &set("z", Anchor::End)).anchor, Anchor::End);
    }

    #[test]
    fn test_scrub_excises_rejected_entries_and_keeps_cursor() {
        let mut manager = StorageManager::new();
        manager.add_storage(StorageRef::new("g1", "l"));
        let ctx = HistoryContext::question("g1");
        for id in ["a", "b", "c"] {
            manager
                .add_to_history(&ctx, "l", vec![PartialHistoryAction::set(id, json!(id))])
                .unwrap();
        }
        manager.undo_history(&ctx);

        manager
            .add_storage_filters(&ctx, vec![FilterDescriptor::new(reject("b"))], "l")
            .unwrap();

        let log = manager.history(&ctx).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.index(), 1);
        let keys: Vec<_> = manager
            .get_objects(&ctx.storage_ref("l"))
            .unwrap()
            .all_keys()
            .cloned()
            .collect();
        assert_eq!(keys, vec!["a"]);
    }

    #[test]
    fn test_scrub_forgets_pairs_of_excised_entries() {
        // GIVEN an entry processed by a filter that keeps everything
        let mut manager = StorageManager::new();
        manager.add_storage(StorageRef::new("g1", "l"));
        let ctx = HistoryContext::question("g1");
        let keep = StorageFilter::new(|_, _| Ok(FilterResult::keep()));
        manager
            .add_storage_filters(&ctx, vec![FilterDescriptor::new(keep.clone())], "l")
            .unwrap();
        manager
            .add_to_history(&ctx, "l", vec![PartialHistoryAction::set("b", json!(1))])
            .unwrap();
        let entry = manager.history(&ctx).unwrap().entries()[0].id;
        assert!(manager.pipeline.is_processed(&ctx, entry, keep.id()));

        // WHEN a later filter excises that entry
        manager
            .add_storage_filters(&ctx, vec![FilterDescriptor::new(reject("b"))], "l")
            .unwrap();

        // THEN the excised entry's pairs are gone
        assert!(manager.history(&ctx).unwrap().is_empty());
        assert!(!manager.pipeline.is_processed(&ctx, entry, keep.id()));
    }
}

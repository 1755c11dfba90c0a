//! Storage manager
//!
//! The root of the kernel. Owns one [`LayerObjectStore`] per (grid, layer),
//! one [`EditLog`] per (grid, edit mode), and the [`FilterPipeline`].
//!
//! Public operations own lifecycle logging:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure
//!
//! Per-action details are logged with `tracing::debug!()` and below.

mod history_ops;
mod scrub;

use std::collections::HashMap;
use std::time::Instant;

use crate::config::StorageConfig;
use crate::errors::{Result, StorageError};
use crate::filters::{FilterDescriptor, FilterPipeline, StorageFilter};
use crate::history::{apply_history_action, EditLog};
use crate::model::{HistoryAction, HistoryContext, PartialHistoryAction, StorageMode, StorageRef};
use crate::store::{LayerObjectStore, LayerSnapshot};
use crate::{log_op_end, log_op_error, log_op_start};

/// Persistence and undo/redo core for one puzzle
///
/// Single-threaded; every operation runs to completion before returning.
#[derive(Debug)]
pub struct StorageManager {
    config: StorageConfig,
    stores: HashMap<StorageRef, LayerObjectStore>,
    logs: HashMap<HistoryContext, EditLog>,
    pipeline: FilterPipeline,
    next_batch_id: u64,
}

impl Default for StorageManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageManager {
    pub fn new() -> Self {
        Self::with_config(StorageConfig::default())
    }

    pub fn with_config(config: StorageConfig) -> Self {
        Self {
            config,
            stores: HashMap::new(),
            logs: HashMap::new(),
            pipeline: FilterPipeline::new(),
            next_batch_id: 1,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    // ===== Stores =====

    /// Register a (grid, layer) store
    ///
    /// Also creates the grid's per-mode edit logs if they do not exist yet.
    /// Registering an existing store keeps its contents.
    ///
    /// # Returns
    /// `true` if the store was newly created.
    pub fn add_storage(&mut self, storage: StorageRef) -> bool {
        for mode in StorageMode::ALL {
            self.logs
                .entry(HistoryContext::new(storage.grid_id.clone(), mode))
                .or_default();
        }
        if self.stores.contains_key(&storage) {
            return false;
        }
        tracing::debug!(grid_id = %storage.grid_id, layer_id = %storage.layer_id, "storage added");
        let store = LayerObjectStore::new(storage.layer_id.clone());
        self.stores.insert(storage, store);
        true
    }

    /// Discard a store
    ///
    /// Every log entry of the grid on that layer is dropped too, with the
    /// cursors kept on the same surviving entries. A store registered
    /// again under the same reference starts without history.
    ///
    /// # Errors
    ///
    /// Returns `StorageNotFound` if the store is not registered.
    pub fn remove_storage(&mut self, storage: &StorageRef) -> Result<LayerObjectStore> {
        let store = self
            .stores
            .remove(storage)
            .ok_or_else(|| not_found(storage))?;

        let contexts: Vec<HistoryContext> = self
            .logs
            .keys()
            .filter(|ctx| ctx.grid_id == storage.grid_id)
            .cloned()
            .collect();
        let mut dropped = 0;
        for ctx in &contexts {
            if let Some(log) = self.logs.get_mut(ctx) {
                dropped += log.discard_layer(&storage.layer_id);
            }
            self.forget_discarded(ctx);
        }
        tracing::debug!(
            grid_id = %storage.grid_id,
            layer_id = %storage.layer_id,
            dropped_entries = dropped,
            "storage removed"
        );
        Ok(store)
    }

    pub fn has_storage(&self, storage: &StorageRef) -> bool {
        self.stores.contains_key(storage)
    }

    /// Registered stores, sorted by grid then layer
    pub fn storage_refs(&self) -> Vec<&StorageRef> {
        let mut refs: Vec<_> = self.stores.keys().collect();
        refs.sort();
        refs
    }

    /// Read access to a store
    ///
    /// # Errors
    ///
    /// Returns `StorageNotFound` if the store is not registered.
    pub fn get_objects(&self, storage: &StorageRef) -> Result<&LayerObjectStore> {
        self.stores.get(storage).ok_or_else(|| not_found(storage))
    }

    /// Access to a store's selection and scratch state
    ///
    /// Objects themselves can only change through history.
    ///
    /// # Errors
    ///
    /// Returns `StorageNotFound` if the store is not registered.
    pub fn get_objects_mut(&mut self, storage: &StorageRef) -> Result<&mut LayerObjectStore> {
        self.stores.get_mut(storage).ok_or_else(|| not_found(storage))
    }

    /// Plain-data snapshot of a store, for external persistence
    ///
    /// # Errors
    ///
    /// Returns `StorageNotFound` if the store is not registered.
    pub fn get_stored(&self, storage: &StorageRef) -> Result<LayerSnapshot> {
        Ok(self.get_objects(storage)?.snapshot())
    }

    /// Replace a store's contents with a snapshot
    ///
    /// History is left untouched; hosts normally call this on a fresh
    /// manager or follow it with [`StorageManager::clear_history`].
    ///
    /// # Errors
    ///
    /// Returns `StorageNotFound` if the store is not registered, or
    /// `InvalidSnapshot` if the snapshot is inconsistent.
    pub fn load_stored(&mut self, storage: &StorageRef, snapshot: LayerSnapshot) -> Result<()> {
        log_op_start!("load_stored", grid_id = %storage.grid_id, layer_id = %storage.layer_id);
        let start = Instant::now();

        self.get_objects_mut(storage)
            .and_then(|store| store.restore(snapshot))
            .map_err(|e| {
                log_op_error!(
                    "load_stored",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64
                );
                e
            })?;

        log_op_end!(
            "load_stored",
            duration_ms = start.elapsed().as_millis() as u64
        );
        Ok(())
    }

    /// Delete every object of `mode` in one layer
    ///
    /// UI feedback is dropped directly. Question and answer objects are
    /// deleted through history as one batch, so the clear can be undone.
    ///
    /// # Errors
    ///
    /// Returns `StorageNotFound` if the store is not registered, or any
    /// error a filter raises.
    pub fn clear_group(
        &mut self,
        ctx: &HistoryContext,
        layer_id: &str,
        mode: StorageMode,
    ) -> Result<usize> {
        let storage = ctx.storage_ref(layer_id);
        if mode == StorageMode::Ui {
            return Ok(self.get_objects_mut(&storage)?.clear_group(mode));
        }

        let batch = self.get_new_batch_id();
        let deletes: Vec<PartialHistoryAction> = self
            .get_objects(&storage)?
            .keys(mode)
            .map(|id| PartialHistoryAction::delete(id.clone()).in_mode(mode).in_batch(batch))
            .collect();
        let count = deletes.len();
        if count > 0 {
            self.add_to_history(ctx, layer_id, deletes)?;
        }
        Ok(count)
    }

    /// Next batch id for correlating one gesture's edits
    pub fn get_new_batch_id(&mut self) -> u64 {
        let id = self.next_batch_id;
        self.next_batch_id += 1;
        id
    }

    // ===== Filters =====

    /// Register filters and recompute the history they affect
    ///
    /// Each descriptor's filter watches its explicit layers, or
    /// `default_layer`. Every log with an entry on a layer that gained a
    /// filter is scrubbed. The registration and the scrub happen together:
    /// if a filter fails while scrubbing, the manager is left exactly as it
    /// was before the call.
    ///
    /// # Errors
    ///
    /// Returns the first error a filter raises while scrubbing.
    pub fn add_storage_filters(
        &mut self,
        ctx: &HistoryContext,
        descriptors: Vec<FilterDescriptor>,
        default_layer: &str,
    ) -> Result<()> {
        log_op_start!(
            "add_storage_filters",
            grid_id = %ctx.grid_id,
            layer_id = default_layer,
            filter_count = descriptors.len()
        );
        let start = Instant::now();

        let pipeline_before = self.pipeline.clone();
        let affected = self.pipeline.register(descriptors, default_layer);

        if !affected.is_empty() && self.config.scrub_on_register {
            let stores_before = self.stores.clone();
            let logs_before = self.logs.clone();
            if let Err(e) = self.scrub_layers(&affected) {
                self.stores = stores_before;
                self.logs = logs_before;
                self.pipeline = pipeline_before;
                log_op_error!(
                    "add_storage_filters",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64
                );
                return Err(e);
            }
        }

        log_op_end!(
            "add_storage_filters",
            duration_ms = start.elapsed().as_millis() as u64,
            affected_layers = affected.len()
        );
        Ok(())
    }

    /// Remove filters from every layer they watch
    ///
    /// History is not recomputed: objects a removed filter rejected stay
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns `FilterNotRegistered` if any filter is unknown; nothing is
    /// removed in that case.
    pub fn remove_storage_filters(&mut self, filters: &[StorageFilter]) -> Result<()> {
        log_op_start!("remove_storage_filters", filter_count = filters.len());
        let start = Instant::now();

        self.pipeline.unregister(filters).map_err(|e| {
            log_op_error!(
                "remove_storage_filters",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "remove_storage_filters",
            duration_ms = start.elapsed().as_millis() as u64
        );
        Ok(())
    }

    /// Filters watching `layer_id`, in registration order
    pub fn filters_for(&self, layer_id: &str) -> &[StorageFilter] {
        self.pipeline.filters_for(layer_id)
    }
}

fn not_found(storage: &StorageRef) -> StorageError {
    StorageError::StorageNotFound {
        grid_id: storage.grid_id.clone(),
        layer_id: storage.layer_id.clone(),
    }
}

/// Apply one logged action to its store in `grid_id`
///
/// Returns `None` when the store is gone; the log then drops the slot.
fn apply_to(
    stores: &mut HashMap<StorageRef, LayerObjectStore>,
    grid_id: &str,
    action: &HistoryAction,
) -> Option<HistoryAction> {
    let store = stores.get_mut(&StorageRef::new(grid_id, action.layer_id.clone()))?;
    Some(apply_history_action(store, action).inverse)
}

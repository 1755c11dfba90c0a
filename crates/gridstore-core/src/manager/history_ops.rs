//! Edit submission and undo/redo

use std::collections::HashSet;
use std::time::Instant;

use super::{apply_to, StorageManager};
use crate::errors::{Result, StorageError};
use crate::filters::FilterContext;
use crate::history::{apply_history_action, normalize_history_action, EditLog, EntryId, Recorded};
use crate::model::{BatchId, HistoryAction, HistoryContext, PartialHistoryAction};
use crate::{log_op_end, log_op_error, log_op_start};

impl StorageManager {
    /// Apply and record a group of edits
    ///
    /// Each action is resolved against `layer_id` and the context's edit
    /// mode, passed through the filters watching its layer, applied to its
    /// store, and recorded in the context's edit log. A vetoed action is
    /// applied as a delete of its object. Extra actions from filters are
    /// applied right after the action that produced them, in the same
    /// batch.
    ///
    /// # Errors
    ///
    /// Returns `MalformedAction` or `StorageNotFound` before anything is
    /// applied if an action cannot be resolved or routed. Filter errors
    /// propagate; actions earlier in the group stay applied.
    pub fn add_to_history(
        &mut self,
        ctx: &HistoryContext,
        layer_id: &str,
        actions: Vec<PartialHistoryAction>,
    ) -> Result<()> {
        log_op_start!(
            "add_to_history",
            grid_id = %ctx.grid_id,
            edit_mode = %ctx.edit_mode,
            layer_id = layer_id,
            action_count = actions.len()
        );
        let start = Instant::now();

        self.add_to_history_impl(ctx, layer_id, actions)
            .map_err(|e| {
                log_op_error!(
                    "add_to_history",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64
                );
                e
            })?;

        log_op_end!(
            "add_to_history",
            duration_ms = start.elapsed().as_millis() as u64,
            history_len = self.logs.get(ctx).map_or(0, EditLog::len)
        );
        Ok(())
    }

    /// Undo the last batch of the context's log
    ///
    /// Returns the actions applied, in application order; empty when there
    /// is nothing to undo.
    pub fn undo_history(&mut self, ctx: &HistoryContext) -> Vec<HistoryAction> {
        log_op_start!("undo_history", grid_id = %ctx.grid_id, edit_mode = %ctx.edit_mode);
        let start = Instant::now();

        let stores = &mut self.stores;
        let applied = self
            .logs
            .get_mut(ctx)
            .map(|log| log.undo(|action| apply_to(stores, &ctx.grid_id, action)))
            .unwrap_or_default();
        self.forget_discarded(ctx);

        log_op_end!(
            "undo_history",
            duration_ms = start.elapsed().as_millis() as u64,
            applied_len = applied.len(),
            history_index = self.logs.get(ctx).map_or(0, EditLog::index)
        );
        applied
    }

    /// Redo the next batch of the context's log
    pub fn redo_history(&mut self, ctx: &HistoryContext) -> Vec<HistoryAction> {
        log_op_start!("redo_history", grid_id = %ctx.grid_id, edit_mode = %ctx.edit_mode);
        let start = Instant::now();

        let stores = &mut self.stores;
        let applied = self
            .logs
            .get_mut(ctx)
            .map(|log| log.redo(|action| apply_to(stores, &ctx.grid_id, action)))
            .unwrap_or_default();
        self.forget_discarded(ctx);

        log_op_end!(
            "redo_history",
            duration_ms = start.elapsed().as_millis() as u64,
            applied_len = applied.len(),
            history_index = self.logs.get(ctx).map_or(0, EditLog::index)
        );
        applied
    }

    pub fn can_undo(&self, ctx: &HistoryContext) -> bool {
        self.logs.get(ctx).is_some_and(EditLog::can_undo)
    }

    pub fn can_redo(&self, ctx: &HistoryContext) -> bool {
        self.logs.get(ctx).is_some_and(EditLog::can_redo)
    }

    /// The edit log of a (grid, edit mode), if one was created
    pub fn history(&self, ctx: &HistoryContext) -> Option<&EditLog> {
        self.logs.get(ctx)
    }

    /// Contexts with an edit log, sorted
    pub fn history_contexts(&self) -> Vec<&HistoryContext> {
        let mut contexts: Vec<_> = self.logs.keys().collect();
        contexts.sort();
        contexts
    }

    /// Drop every edit log entry of a grid; store contents are kept
    pub fn clear_history(&mut self, grid_id: &str) {
        let contexts: Vec<HistoryContext> = self
            .logs
            .keys()
            .filter(|ctx| ctx.grid_id == grid_id)
            .cloned()
            .collect();
        for ctx in contexts {
            if let Some(log) = self.logs.get_mut(&ctx) {
                log.clear();
            }
            self.pipeline.forget_log(&ctx);
        }
        tracing::debug!(grid_id = grid_id, "history cleared");
    }

    fn add_to_history_impl(
        &mut self,
        ctx: &HistoryContext,
        layer_id: &str,
        actions: Vec<PartialHistoryAction>,
    ) -> Result<()> {
        let resolved = actions
            .into_iter()
            .map(|action| action.resolve(layer_id, ctx.edit_mode))
            .collect::<Result<Vec<_>>>()?;
        for action in &resolved {
            self.require_store(ctx, &action.layer_id)?;
        }

        for action in resolved {
            self.submit(ctx, action)?;
        }
        Ok(())
    }

    /// Filter, apply, and record one caller action and its extras
    ///
    /// Extra actions are applied unfiltered.
    fn submit(&mut self, ctx: &HistoryContext, action: HistoryAction) -> Result<()> {
        let evaluation = {
            let filter_ctx = FilterContext::new(ctx, &self.stores);
            self.pipeline.evaluate(&filter_ctx, &action, |_| false)?
        };
        let mut action = if evaluation.keep {
            action
        } else {
            action.into_delete()
        };
        let extras = self.resolve_extras(ctx, &mut action, evaluation.extra_actions)?;

        let recorded = self.apply_and_record(ctx, &action, false, None);
        if let Some(entry) = recorded.entry_id() {
            self.pipeline.mark_processed(ctx, entry, &evaluation.consulted);
        }

        for extra in extras {
            self.apply_and_record(ctx, &extra, true, None);
        }
        Ok(())
    }

    /// Resolve a filter's extra actions against the action that produced them
    ///
    /// Extras default to the action's layer and batch. If the action has no
    /// batch, it is given a fresh one so that it and its extras undo as one
    /// step.
    pub(super) fn resolve_extras(
        &mut self,
        ctx: &HistoryContext,
        primary: &mut HistoryAction,
        extras: Vec<PartialHistoryAction>,
    ) -> Result<Vec<HistoryAction>> {
        if extras.is_empty() {
            return Ok(Vec::new());
        }
        if primary.batch_id.is_none() {
            primary.batch_id = Some(BatchId::Id(self.get_new_batch_id()));
        }

        let mut resolved = Vec::with_capacity(extras.len());
        for extra in extras {
            let extra = PartialHistoryAction {
                batch_id: extra.batch_id.or(primary.batch_id),
                ..extra
            };
            let action = extra.resolve(&primary.layer_id, ctx.edit_mode)?;
            self.require_store(ctx, &action.layer_id)?;
            resolved.push(action);
        }
        Ok(resolved)
    }

    /// Apply one resolved action and record it in the context's log
    ///
    /// Actions on a store that no longer exists are dropped. A delete is
    /// recorded in the group of the object it removes.
    pub(super) fn apply_and_record(
        &mut self,
        ctx: &HistoryContext,
        action: &HistoryAction,
        synthesized: bool,
        reuse_id: Option<EntryId>,
    ) -> Recorded {
        let Some(store) = self.stores.get_mut(&ctx.storage_ref(action.layer_id.clone())) else {
            return Recorded::Skipped;
        };
        let action = &normalize_history_action(store, action.clone());
        let applied = apply_history_action(store, action);
        if !applied.anchor_resolved && self.config.warn_on_missing_anchor {
            tracing::warn!(
                grid_id = %ctx.grid_id,
                layer_id = %action.layer_id,
                object_id = %action.object_id,
                anchor = ?action.anchor,
                "anchor not found, object placed at end"
            );
        }

        let recorded = self
            .logs
            .entry(ctx.clone())
            .or_default()
            .record(action, applied.inverse, synthesized, reuse_id);
        tracing::debug!(
            grid_id = %ctx.grid_id,
            layer_id = %action.layer_id,
            object_id = %action.object_id,
            batch_id = ?action.batch_id,
            synthesized,
            outcome = ?recorded,
            "history action applied"
        );
        self.forget_discarded(ctx);
        recorded
    }

    /// Drop processed (entry, filter) pairs of entries that left the log
    pub(super) fn forget_discarded(&mut self, ctx: &HistoryContext) {
        let Some(log) = self.logs.get_mut(ctx) else {
            return;
        };
        let discarded: HashSet<EntryId> = log.take_discarded().into_iter().collect();
        if discarded.is_empty() {
            return;
        }
        tracing::trace!(
            grid_id = %ctx.grid_id,
            edit_mode = %ctx.edit_mode,
            discarded = discarded.len(),
            "processed pairs pruned"
        );
        self.pipeline
            .retain_entries(ctx, |entry| !discarded.contains(&entry));
    }

    fn require_store(&self, ctx: &HistoryContext, layer_id: &str) -> Result<()> {
        if self.stores.contains_key(&ctx.storage_ref(layer_id)) {
            Ok(())
        } else {
            Err(StorageError::StorageNotFound {
                grid_id: ctx.grid_id.clone(),
                layer_id: layer_id.to_string(),
            })
        }
    }
}

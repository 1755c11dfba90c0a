use crate::model::{BatchId, HistoryAction, StorageMode};

/// Stable identity of a log entry, preserved across scrubs
pub type EntryId = u64;

/// One slot of an edit log
///
/// Before the cursor a slot holds the action that undoes it; at or after
/// the cursor it holds the action that redoes it. Undo and redo swap the
/// slot for its own inverse in place.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub id: EntryId,
    pub action: HistoryAction,
    /// Produced from a filter's extra actions rather than submitted by a caller
    pub synthesized: bool,
}

/// What `EditLog::record` did with an edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// A new undo step was pushed
    Appended(EntryId),
    /// The edit continued the batch already held by this entry
    Merged(EntryId),
    /// The edit undid its own batch's creation; this entry was removed
    Cancelled(EntryId),
    /// Ephemeral or no-op edit, not recorded
    Skipped,
}

impl Recorded {
    /// The entry that now represents the edit, if any
    pub fn entry_id(&self) -> Option<EntryId> {
        match self {
            Recorded::Appended(id) | Recorded::Merged(id) => Some(*id),
            Recorded::Cancelled(_) | Recorded::Skipped => None,
        }
    }
}

/// Append-only action sequence with an undo/redo cursor
///
/// Entries before `index` are done; entries at or after it are available
/// to redo. Invariant: `index <= entries.len()`.
///
/// Ids of entries that leave the log (a discarded redo tail, a cancelled
/// batch, a slot whose store is gone) are kept until
/// [`EditLog::take_discarded`] collects them.
#[derive(Debug, Clone, Default)]
pub struct EditLog {
    entries: Vec<LogEntry>,
    index: usize,
    next_entry_id: EntryId,
    discarded: Vec<EntryId>,
}

impl EditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn actions(&self) -> impl Iterator<Item = &HistoryAction> + '_ {
        self.entries.iter().map(|e| &e.action)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index < self.entries.len()
    }

    /// Whether any entry touches `layer_id`
    pub fn touches_layer(&self, layer_id: &str) -> bool {
        self.entries.iter().any(|e| e.action.layer_id == layer_id)
    }

    /// Record an applied edit
    ///
    /// `applied` is the edit as it was applied and `inverse` the action
    /// that reverses it. The redo tail is discarded first. An edit on the
    /// same layer and object as the last entry, in the same defined batch,
    /// continues that entry; if the batch started from "no object" and
    /// ends with "no object", the entry is removed altogether.
    ///
    /// `reuse_id` keeps an existing entry id (used when a log is rebuilt).
    pub fn record(
        &mut self,
        applied: &HistoryAction,
        inverse: HistoryAction,
        synthesized: bool,
        reuse_id: Option<EntryId>,
    ) -> Recorded {
        if BatchId::is_ignore(applied.batch_id.as_ref()) || applied.storage_mode == StorageMode::Ui {
            return Recorded::Skipped;
        }
        if applied.object.is_none() && inverse.object.is_none() {
            return Recorded::Skipped;
        }

        self.discarded
            .extend(self.entries.drain(self.index..).map(|e| e.id));

        if let Some(last) = self.entries.last() {
            let continues = last.synthesized == synthesized
                && last.action.layer_id == applied.layer_id
                && last.action.object_id == applied.object_id
                && BatchId::same_batch(last.action.batch_id.as_ref(), applied.batch_id.as_ref());
            if continues {
                let id = last.id;
                if last.action.object.is_none() && applied.object.is_none() {
                    self.entries.pop();
                    self.index -= 1;
                    self.discarded.push(id);
                    return Recorded::Cancelled(id);
                }
                return Recorded::Merged(id);
            }
        }

        let id = match reuse_id {
            Some(id) => {
                self.next_entry_id = self.next_entry_id.max(id + 1);
                id
            }
            None => {
                let id = self.next_entry_id;
                self.next_entry_id += 1;
                id
            }
        };
        self.entries.push(LogEntry {
            id,
            action: inverse,
            synthesized,
        });
        self.index += 1;
        Recorded::Appended(id)
    }

    /// Undo one whole batch
    ///
    /// `apply` applies an action to its store and returns the inverse, or
    /// `None` if the store no longer exists; such a slot can never be
    /// replayed and is dropped from the log. Returns the actions actually
    /// applied, in application order.
    pub fn undo<F>(&mut self, mut apply: F) -> Vec<HistoryAction>
    where
        F: FnMut(&HistoryAction) -> Option<HistoryAction>,
    {
        let mut applied = Vec::new();
        while self.index > 0 {
            self.index -= 1;
            let slot = self.index;
            let (action, _) = self.swap_slot(slot, &mut apply, &mut applied);
            let continues = slot > 0
                && BatchId::same_batch(
                    action.batch_id.as_ref(),
                    self.entries[slot - 1].action.batch_id.as_ref(),
                );
            if !continues {
                break;
            }
        }
        applied
    }

    /// Redo one whole batch (mirror of [`EditLog::undo`])
    pub fn redo<F>(&mut self, mut apply: F) -> Vec<HistoryAction>
    where
        F: FnMut(&HistoryAction) -> Option<HistoryAction>,
    {
        let mut applied = Vec::new();
        while self.index < self.entries.len() {
            let slot = self.index;
            let (action, kept) = self.swap_slot(slot, &mut apply, &mut applied);
            if kept {
                self.index += 1;
            }
            let continues = self.index < self.entries.len()
                && BatchId::same_batch(
                    action.batch_id.as_ref(),
                    self.entries[self.index].action.batch_id.as_ref(),
                );
            if !continues {
                break;
            }
        }
        applied
    }

    /// Undo single entries, ignoring batches, until the cursor reaches `target`
    pub fn rewind_to<F>(&mut self, target: usize, mut apply: F)
    where
        F: FnMut(&HistoryAction) -> Option<HistoryAction>,
    {
        let mut applied = Vec::new();
        while self.index > target {
            self.index -= 1;
            self.swap_slot(self.index, &mut apply, &mut applied);
        }
    }

    /// Remove every entry, returning them in chronological order
    ///
    /// The cursor goes back to 0. Entry id allocation continues where it
    /// left off.
    pub fn take_entries(&mut self) -> Vec<LogEntry> {
        self.index = 0;
        std::mem::take(&mut self.entries)
    }

    /// Drop every entry on `layer_id`, keeping the cursor on the same
    /// surviving entries
    pub fn discard_layer(&mut self, layer_id: &str) -> usize {
        let done = self.entries[..self.index]
            .iter()
            .filter(|e| e.action.layer_id == layer_id)
            .count();
        let before = self.entries.len();
        let discarded = &mut self.discarded;
        self.entries.retain(|e| {
            let keep = e.action.layer_id != layer_id;
            if !keep {
                discarded.push(e.id);
            }
            keep
        });
        self.index -= done;
        before - self.entries.len()
    }

    /// Ids of entries that left the log since the last call
    pub fn take_discarded(&mut self) -> Vec<EntryId> {
        std::mem::take(&mut self.discarded)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = 0;
        self.discarded.clear();
    }

    /// Swap a slot for its inverse, or drop it if it cannot be applied
    ///
    /// Returns the slot's action and whether the slot is still in the log.
    fn swap_slot<F>(
        &mut self,
        slot: usize,
        apply: &mut F,
        applied: &mut Vec<HistoryAction>,
    ) -> (HistoryAction, bool)
    where
        F: FnMut(&HistoryAction) -> Option<HistoryAction>,
    {
        let action = self.entries[slot].action.clone();
        match apply(&action) {
            Some(inverse) => {
                self.entries[slot].action = inverse;
                applied.push(action.clone());
                (action, true)
            }
            None => {
                let entry = self.entries.remove(slot);
                self.discarded.push(entry.id);
                (action, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::apply::apply_history_action;
    use crate::model::Anchor;
    use crate::store::LayerObjectStore;
    use serde_json::json;

    fn action(id: &str, object: Option<serde_json::Value>, batch: Option<u64>) -> HistoryAction {
        HistoryAction {
            object_id: id.to_string(),
            layer_id: "layer1".to_string(),
            batch_id: batch.map(BatchId::Id),
            storage_mode: StorageMode::Question,
            object,
            anchor: Anchor::End,
        }
    }

    fn apply_and_record(log: &mut EditLog, store: &mut LayerObjectStore, a: HistoryAction) -> Recorded {
        let applied = apply_history_action(store, &a);
        log.record(&a, applied.inverse, false, None)
    }

    #[test]
    fn test_record_appends_inverse_and_advances() {
        let mut log = EditLog::new();
        let mut store = LayerObjectStore::new("layer1");
        let outcome = apply_and_record(&mut log, &mut store, action("a", Some(json!(1)), None));

        assert_eq!(outcome, Recorded::Appended(0));
        assert_eq!(log.len(), 1);
        assert_eq!(log.index(), 1);
        assert_eq!(log.entries()[0].action.object, None);
    }

    #[test]
    fn test_unspecified_batches_do_not_merge() {
        let mut log = EditLog::new();
        let mut store = LayerObjectStore::new("layer1");
        apply_and_record(&mut log, &mut store, action("a", Some(json!(1)), None));
        apply_and_record(&mut log, &mut store, action("a", Some(json!(2)), None));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_same_batch_same_object_merges() {
        let mut log = EditLog::new();
        let mut store = LayerObjectStore::new("layer1");
        apply_and_record(&mut log, &mut store, action("a", Some(json!(1)), Some(1)));
        let outcome = apply_and_record(&mut log, &mut store, action("a", Some(json!(2)), Some(1)));

        assert_eq!(outcome, Recorded::Merged(0));
        assert_eq!(log.len(), 1);
        // the merged entry still restores the pre-batch state
        assert_eq!(log.entries()[0].action.object, None);
    }

    #[test]
    fn test_create_then_delete_in_batch_cancels() {
        let mut log = EditLog::new();
        let mut store = LayerObjectStore::new("layer1");
        apply_and_record(&mut log, &mut store, action("a", Some(json!({})), Some(1)));
        let outcome = apply_and_record(&mut log, &mut store, action("a", None, Some(1)));

        assert_eq!(outcome, Recorded::Cancelled(0));
        assert!(log.is_empty());
        assert_eq!(log.index(), 0);
    }

    #[test]
    fn test_ignore_batch_and_ui_mode_are_skipped() {
        let mut log = EditLog::new();
        let mut store = LayerObjectStore::new("layer1");
        let mut ignored = action("a", Some(json!(1)), None);
        ignored.batch_id = Some(BatchId::Ignore);
        assert_eq!(apply_and_record(&mut log, &mut store, ignored), Recorded::Skipped);

        let mut ui = action("b", Some(json!(1)), None);
        ui.storage_mode = StorageMode::Ui;
        assert_eq!(apply_and_record(&mut log, &mut store, ui), Recorded::Skipped);

        assert!(log.is_empty());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_noop_delete_is_skipped() {
        let mut log = EditLog::new();
        let mut store = LayerObjectStore::new("layer1");
        let outcome = apply_and_record(&mut log, &mut store, action("ghost", None, None));
        assert_eq!(outcome, Recorded::Skipped);
        assert!(log.is_empty());
    }

    #[test]
    fn test_new_edit_discards_redo_tail() {
        let mut log = EditLog::new();
        let mut store = LayerObjectStore::new("layer1");
        apply_and_record(&mut log, &mut store, action("a", Some(json!(1)), None));
        apply_and_record(&mut log, &mut store, action("b", Some(json!(1)), None));
        log.undo(|a| Some(apply_history_action(&mut store, a).inverse));
        assert!(log.can_redo());

        apply_and_record(&mut log, &mut store, action("c", Some(json!(1)), None));
        assert_eq!(log.len(), 2);
        assert!(!log.can_redo());
        assert_eq!(log.entries()[1].action.object_id, "c");
    }

    #[test]
    fn test_undo_walks_whole_batch() {
        let mut log = EditLog::new();
        let mut store = LayerObjectStore::new("layer1");
        apply_and_record(&mut log, &mut store, action("x", Some(json!(0)), None));
        apply_and_record(&mut log, &mut store, action("a", Some(json!(1)), Some(5)));
        apply_and_record(&mut log, &mut store, action("b", Some(json!(2)), Some(5)));

        let undone = log.undo(|a| Some(apply_history_action(&mut store, a).inverse));
        assert_eq!(undone.len(), 2);
        assert_eq!(log.index(), 1);
        assert_eq!(store.len(), 1);

        let redone = log.redo(|a| Some(apply_history_action(&mut store, a).inverse));
        assert_eq!(redone.len(), 2);
        assert_eq!(log.index(), 3);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_undo_at_start_returns_nothing() {
        let mut log = EditLog::new();
        assert!(log.undo(|_| None).is_empty());
        assert!(log.redo(|_| None).is_empty());
    }

    #[test]
    fn test_slots_that_cannot_apply_are_dropped() {
        let mut log = EditLog::new();
        let mut store = LayerObjectStore::new("layer1");
        apply_and_record(&mut log, &mut store, action("a", Some(json!(1)), None));
        apply_and_record(&mut log, &mut store, action("b", Some(json!(1)), None));

        let undone = log.undo(|_| None);
        assert!(undone.is_empty());
        assert_eq!(log.len(), 1);
        assert_eq!(log.index(), 1);
        assert_eq!(log.take_discarded(), vec![1]);
        assert!(!log.can_redo());

        // the surviving entry is still in undo form
        log.undo(|a| Some(apply_history_action(&mut store, a).inverse));
        let redone = log.redo(|_| None);
        assert!(redone.is_empty());
        assert!(log.is_empty());
        assert_eq!(log.index(), 0);
    }

    #[test]
    fn test_discard_layer_keeps_cursor_on_survivors() {
        let mut log = EditLog::new();
        let mut store = LayerObjectStore::new("layer1");
        apply_and_record(&mut log, &mut store, action("a", Some(json!(1)), None));
        let mut other = action("b", Some(json!(1)), None);
        other.layer_id = "layer2".to_string();
        let inverse = HistoryAction {
            object: None,
            ..other.clone()
        };
        log.record(&other, inverse, false, None);
        apply_and_record(&mut log, &mut store, action("c", Some(json!(1)), None));
        log.undo(|a| Some(apply_history_action(&mut store, a).inverse));

        assert_eq!(log.discard_layer("layer2"), 1);
        assert_eq!(log.len(), 2);
        assert_eq!(log.index(), 1);
        assert_eq!(log.entries()[0].action.object_id, "a");
        assert_eq!(log.take_discarded(), vec![1]);
    }

    #[test]
    fn test_truncated_and_cancelled_entries_are_reported() {
        let mut log = EditLog::new();
        let mut store = LayerObjectStore::new("layer1");
        apply_and_record(&mut log, &mut store, action("a", Some(json!(1)), None));
        log.undo(|a| Some(apply_history_action(&mut store, a).inverse));
        apply_and_record(&mut log, &mut store, action("b", Some(json!({})), Some(4)));
        apply_and_record(&mut log, &mut store, action("b", None, Some(4)));

        assert!(log.is_empty());
        assert_eq!(log.take_discarded(), vec![0, 1]);
        assert!(log.take_discarded().is_empty());
    }

    #[test]
    fn test_reused_ids_advance_allocation() {
        let mut log = EditLog::new();
        let a = action("a", Some(json!(1)), None);
        let inverse = action("a", None, None);
        assert_eq!(log.record(&a, inverse.clone(), false, Some(9)), Recorded::Appended(9));

        let b = action("b", Some(json!(1)), None);
        let outcome = log.record(&b, action("b", None, None), false, None);
        assert_eq!(outcome, Recorded::Appended(10));
    }
}

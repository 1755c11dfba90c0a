//! Single-action application
//!
//! Every change to a layer store's objects goes through
//! [`apply_history_action`]. The inverse is derived from the store's
//! *current* state, never from earlier history, which makes re-applying
//! the same action a no-op and lets undo/redo slots invert in place.

use crate::model::HistoryAction;
use crate::store::LayerObjectStore;

/// Result of applying one action to a store
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedAction {
    /// The action that restores the state observed before application
    pub inverse: HistoryAction,
    /// `false` if the action's anchor named an absent object and the
    /// object was appended at the tail instead
    pub anchor_resolved: bool,
}

/// Apply `action` to `store`, returning its inverse
///
/// The inverse captures the object's payload (or absence), its group,
/// and its successor strictly before the store is mutated.
pub fn apply_history_action(store: &mut LayerObjectStore, action: &HistoryAction) -> AppliedAction {
    let inverse = HistoryAction {
        object: store.get(&action.object_id).cloned(),
        anchor: store.anchor_of(&action.object_id),
        storage_mode: store
            .mode_of(&action.object_id)
            .unwrap_or(action.storage_mode),
        ..action.clone()
    };

    let anchor_resolved = store.set_object(
        action.storage_mode,
        &action.object_id,
        action.object.clone(),
        &action.anchor,
    );

    AppliedAction {
        inverse,
        anchor_resolved,
    }
}

/// Complete a delete with the group of the object it removes
///
/// A delete carries no payload, so its group is whatever the caller
/// guessed. Taking the group from the store makes the inverse of the
/// inverse equal to the action itself.
pub fn normalize_history_action(store: &LayerObjectStore, action: HistoryAction) -> HistoryAction {
    if action.object.is_some() {
        return action;
    }
    match store.mode_of(&action.object_id) {
        Some(storage_mode) => HistoryAction {
            storage_mode,
            ..action
        },
        None => action,
    }
}

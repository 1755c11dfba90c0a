//! History action types
//!
//! A `PartialHistoryAction` is what gesture interpreters submit; it is
//! resolved against the routing context into a fully specified
//! `HistoryAction` before it touches a store or an edit log.

use serde::{Deserialize, Serialize};

use super::routing::{LayerId, ObjectId, ObjectState};
use crate::errors::{Result, StorageError};

/// Partition of stored objects: puzzle content, answer key, or UI feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Question,
    Answer,
    Ui,
}

impl StorageMode {
    pub const ALL: [StorageMode; 3] = [StorageMode::Question, StorageMode::Answer, StorageMode::Ui];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::Question => "question",
            StorageMode::Answer => "answer",
            StorageMode::Ui => "ui",
        }
    }
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Placement of an object in a store's total order
///
/// `Before(key)` inserts immediately before `key`; `End` appends at the
/// tail. Recorded actions use the same type to remember where an object
/// sat, so reversal restores the exact position. Serializes as the key
/// string, or `null` for `End`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Anchor {
    Before(ObjectId),
    #[default]
    End,
}

impl Anchor {
    pub fn before(key: impl Into<ObjectId>) -> Self {
        Anchor::Before(key.into())
    }

    /// The key this anchor names, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            Anchor::Before(key) => Some(key),
            Anchor::End => None,
        }
    }
}

impl From<Option<ObjectId>> for Anchor {
    fn from(key: Option<ObjectId>) -> Self {
        key.map_or(Anchor::End, Anchor::Before)
    }
}

/// Correlation id grouping the edits of one gesture into one undo step
///
/// Fields hold `Option<BatchId>`: `None` is the unspecified batch, which
/// never matches any other batch (not even another `None`). `Ignore`
/// marks edits that are applied but never recorded in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BatchIdRepr", into = "BatchIdRepr")]
pub enum BatchId {
    Id(u64),
    Ignore,
}

impl BatchId {
    /// Whether two optional batch ids name the same defined batch
    pub fn same_batch(a: Option<&BatchId>, b: Option<&BatchId>) -> bool {
        matches!((a, b), (Some(BatchId::Id(x)), Some(BatchId::Id(y))) if x == y)
    }

    pub fn is_ignore(batch: Option<&BatchId>) -> bool {
        matches!(batch, Some(BatchId::Ignore))
    }
}

impl From<u64> for BatchId {
    fn from(id: u64) -> Self {
        BatchId::Id(id)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum BatchIdRepr {
    Id(u64),
    Text(String),
}

impl TryFrom<BatchIdRepr> for BatchId {
    type Error = String;

    fn try_from(repr: BatchIdRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            BatchIdRepr::Id(id) => Ok(BatchId::Id(id)),
            BatchIdRepr::Text(text) if text == "ignore" => Ok(BatchId::Ignore),
            BatchIdRepr::Text(text) => text
                .trim()
                .parse::<u64>()
                .map(BatchId::Id)
                .map_err(|_| format!("invalid batch id: {:?}", text)),
        }
    }
}

impl From<BatchId> for BatchIdRepr {
    fn from(batch: BatchId) -> Self {
        match batch {
            BatchId::Id(id) => BatchIdRepr::Id(id),
            BatchId::Ignore => BatchIdRepr::Text("ignore".to_string()),
        }
    }
}

/// A fully resolved, reversible transition of one object in one layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryAction {
    pub object_id: ObjectId,
    pub layer_id: LayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
    pub storage_mode: StorageMode,
    /// Resulting payload; `None` deletes the object
    pub object: Option<ObjectState>,
    #[serde(default)]
    pub anchor: Anchor,
}

impl HistoryAction {
    pub fn is_delete(&self) -> bool {
        self.object.is_none()
    }

    /// The same transition turned into a delete of the object
    pub fn into_delete(self) -> Self {
        Self {
            object: None,
            anchor: Anchor::End,
            ..self
        }
    }
}

/// Caller-supplied, under-specified edit
///
/// Unset fields are filled in by [`PartialHistoryAction::resolve`]: the
/// layer from the caller, the storage mode from the current edit mode,
/// and the anchor as `End`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PartialHistoryAction {
    pub id: ObjectId,
    #[serde(default)]
    pub object: Option<ObjectState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_mode: Option<StorageMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_id: Option<LayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,
}

impl PartialHistoryAction {
    /// Create or overwrite `id` with `object`
    pub fn set(id: impl Into<ObjectId>, object: ObjectState) -> Self {
        Self {
            id: id.into(),
            object: Some(object),
            ..Self::default()
        }
    }

    /// Delete `id`
    pub fn delete(id: impl Into<ObjectId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn in_batch(mut self, batch_id: impl Into<BatchId>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn in_layer(mut self, layer_id: impl Into<LayerId>) -> Self {
        self.layer_id = Some(layer_id.into());
        self
    }

    pub fn in_mode(mut self, mode: StorageMode) -> Self {
        self.storage_mode = Some(mode);
        self
    }

    pub fn before(mut self, key: impl Into<ObjectId>) -> Self {
        self.anchor = Some(Anchor::before(key));
        self
    }

    /// Resolve into a `HistoryAction`
    ///
    /// # Errors
    ///
    /// Returns `MalformedAction` if the object id is empty or the action
    /// anchors an object before itself.
    pub fn resolve(self, default_layer: &str, default_mode: StorageMode) -> Result<HistoryAction> {
        if self.id.trim().is_empty() {
            return Err(StorageError::MalformedAction {
                reason: "object id cannot be empty".to_string(),
            });
        }
        let anchor = self.anchor.unwrap_or_default();
        if anchor.key() == Some(self.id.as_str()) {
            return Err(StorageError::MalformedAction {
                reason: format!("object {} cannot be anchored before itself", self.id),
            });
        }

        Ok(HistoryAction {
            object_id: self.id,
            layer_id: self.layer_id.unwrap_or_else(|| default_layer.to_string()),
            batch_id: self.batch_id,
            storage_mode: self.storage_mode.unwrap_or(default_mode),
            object: self.object,
            anchor,
        })
    }
}

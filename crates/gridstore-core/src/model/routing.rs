use serde::{Deserialize, Serialize};

use super::action::StorageMode;

/// Identifier of one placed object within one layer's store
pub type ObjectId = String;

/// Identifier of a layer (e.g. "cages", "numbers")
pub type LayerId = String;

/// Identifier of a grid within the puzzle
pub type GridId = String;

/// Layer-defined object payload, opaque to the storage kernel
pub type ObjectState = serde_json::Value;

/// Routing identity of one layer store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageRef {
    pub grid_id: GridId,
    pub layer_id: LayerId,
}

impl StorageRef {
    pub fn new(grid_id: impl Into<GridId>, layer_id: impl Into<LayerId>) -> Self {
        Self {
            grid_id: grid_id.into(),
            layer_id: layer_id.into(),
        }
    }
}

impl std::fmt::Display for StorageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.grid_id, self.layer_id)
    }
}

/// Routing context supplied by the orchestrator on every history call
///
/// The edit mode selects which of the grid's edit logs receives the edit,
/// and is the default storage mode for actions that do not name one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HistoryContext {
    pub grid_id: GridId,
    pub edit_mode: StorageMode,
}

impl HistoryContext {
    pub fn new(grid_id: impl Into<GridId>, edit_mode: StorageMode) -> Self {
        Self {
            grid_id: grid_id.into(),
            edit_mode,
        }
    }

    /// Context for question-mode editing of a grid
    pub fn question(grid_id: impl Into<GridId>) -> Self {
        Self::new(grid_id, StorageMode::Question)
    }

    /// Context for answer-mode editing of a grid
    pub fn answer(grid_id: impl Into<GridId>) -> Self {
        Self::new(grid_id, StorageMode::Answer)
    }

    /// Storage reference for a layer of this context's grid
    pub fn storage_ref(&self, layer_id: impl Into<LayerId>) -> StorageRef {
        StorageRef::new(self.grid_id.clone(), layer_id)
    }
}

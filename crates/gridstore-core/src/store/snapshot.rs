//! Plain-data layer snapshots
//!
//! The snapshot is the only externally visible form of a layer store: it
//! is what rendering, export, and wire encoding read. It carries no undo
//! semantics. Maps are `BTreeMap`s so the canonical JSON form (and thus
//! the digest) is deterministic.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::Result;
use crate::model::{ObjectId, ObjectState, StorageMode};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerSnapshot {
    /// Keys in total order
    pub order: Vec<ObjectId>,
    /// Payload per key
    pub map: BTreeMap<ObjectId, ObjectState>,
    /// Storage mode per key
    pub groups: BTreeMap<ObjectId, StorageMode>,
}

impl LayerSnapshot {
    /// Check that order, map, and groups name the same keys exactly once
    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = HashSet::with_capacity(self.order.len());
        for key in &self.order {
            if !seen.insert(key.as_str()) {
                return Err(format!("key {} appears more than once in order", key));
            }
            if !self.map.contains_key(key) {
                return Err(format!("key {} has no payload", key));
            }
            if !self.groups.contains_key(key) {
                return Err(format!("key {} has no storage mode", key));
            }
        }
        if self.map.len() != seen.len() || self.groups.len() != seen.len() {
            return Err("map or groups name keys missing from order".to_string());
        }
        Ok(())
    }

    /// Keys of one storage mode, in total order
    pub fn keys(&self, mode: StorageMode) -> Vec<&ObjectId> {
        self.order
            .iter()
            .filter(|k| self.groups.get(*k) == Some(&mode))
            .collect()
    }

    /// Hex-encoded SHA-256 of the canonical JSON form
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if JSON serialization fails.
    pub fn digest(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}

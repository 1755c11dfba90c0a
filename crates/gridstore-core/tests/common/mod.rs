use gridstore_core::{HistoryContext, StorageManager, StorageRef};

pub const GRID: &str = "g1";

/// Create a manager with one store per layer of grid `g1`
#[allow(dead_code)]
pub fn manager_with_layers(layers: &[&str]) -> StorageManager {
    let mut manager = StorageManager::new();
    for layer in layers {
        manager.add_storage(StorageRef::new(GRID, *layer));
    }
    manager
}

#[allow(dead_code)]
pub fn question() -> HistoryContext {
    HistoryContext::question(GRID)
}

/// Keys of one layer of `g1`, in total order
#[allow(dead_code)]
pub fn keys(manager: &StorageManager, layer: &str) -> Vec<String> {
    manager
        .get_objects(&StorageRef::new(GRID, layer))
        .expect("store should exist")
        .all_keys()
        .cloned()
        .collect()
}

/// Digest of every registered store, in a stable order
#[allow(dead_code)]
pub fn state_digest(manager: &StorageManager) -> Vec<(String, String)> {
    manager
        .storage_refs()
        .into_iter()
        .map(|storage| {
            let digest = manager
                .get_stored(storage)
                .and_then(|snapshot| snapshot.digest())
                .expect("snapshot should digest");
            (storage.to_string(), digest)
        })
        .collect()
}

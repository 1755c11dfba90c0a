pub mod layer;
pub mod snapshot;

pub use layer::LayerObjectStore;
pub use snapshot::LayerSnapshot;

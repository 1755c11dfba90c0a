//! Order-preserving keyed collections backing the layer stores

pub mod groups;
pub mod ordered;
pub mod selectable;

pub use groups::GroupPartition;
pub use ordered::OrderedKeyedCollection;
pub use selectable::SelectableOrderedCollection;

pub mod action;
pub mod routing;

pub use action::{Anchor, BatchId, HistoryAction, PartialHistoryAction, StorageMode};
pub use routing::{GridId, HistoryContext, LayerId, ObjectId, ObjectState, StorageRef};

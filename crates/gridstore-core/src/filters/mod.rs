//! Validation/derivation filters over incoming edits

pub mod filter;
pub mod pipeline;

pub use filter::{FilterContext, FilterDescriptor, FilterId, FilterResult, StorageFilter};
pub use pipeline::{Evaluation, FilterPipeline};

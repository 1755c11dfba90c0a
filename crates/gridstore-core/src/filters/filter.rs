use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::Result;
use crate::model::{HistoryAction, HistoryContext, LayerId, PartialHistoryAction, StorageMode, StorageRef};
use crate::store::LayerObjectStore;

/// Identity of a filter handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterId(u64);

impl FilterId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "filter-{}", self.0)
    }
}

static NEXT_FILTER_ID: AtomicU64 = AtomicU64::new(1);

/// A filter's verdict on one action
#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    /// `false` vetoes the action
    pub keep: bool,
    /// Edits to synthesize after the action is applied
    pub extra_actions: Vec<PartialHistoryAction>,
}

impl FilterResult {
    pub fn keep() -> Self {
        Self {
            keep: true,
            extra_actions: Vec::new(),
        }
    }

    pub fn reject() -> Self {
        Self {
            keep: false,
            extra_actions: Vec::new(),
        }
    }

    pub fn with_extra_actions(mut self, actions: impl IntoIterator<Item = PartialHistoryAction>) -> Self {
        self.extra_actions.extend(actions);
        self
    }
}

/// Read-only view handed to filters while they run
pub struct FilterContext<'a> {
    history: &'a HistoryContext,
    stores: &'a HashMap<StorageRef, LayerObjectStore>,
}

impl<'a> FilterContext<'a> {
    pub(crate) fn new(
        history: &'a HistoryContext,
        stores: &'a HashMap<StorageRef, LayerObjectStore>,
    ) -> Self {
        Self { history, stores }
    }

    pub fn grid_id(&self) -> &str {
        &self.history.grid_id
    }

    pub fn edit_mode(&self) -> StorageMode {
        self.history.edit_mode
    }

    /// Current contents of another layer of the same grid
    pub fn objects(&self, layer_id: &str) -> Option<&'a LayerObjectStore> {
        self.stores
            .get(&StorageRef::new(self.history.grid_id.clone(), layer_id))
    }
}

type FilterFn = dyn Fn(&FilterContext<'_>, &HistoryAction) -> Result<FilterResult>;

/// A registered predicate over incoming edits
///
/// Each handle made by [`StorageFilter::new`] has its own identity; clones
/// share it. Registering clones of one handle is the same as registering
/// it once, and removal is by handle.
#[derive(Clone)]
pub struct StorageFilter {
    id: FilterId,
    func: Rc<FilterFn>,
}

impl StorageFilter {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&FilterContext<'_>, &HistoryAction) -> Result<FilterResult> + 'static,
    {
        Self {
            id: FilterId(NEXT_FILTER_ID.fetch_add(1, Ordering::Relaxed)),
            func: Rc::new(func),
        }
    }

    pub fn id(&self) -> FilterId {
        self.id
    }

    pub(crate) fn call(&self, ctx: &FilterContext<'_>, action: &HistoryAction) -> Result<FilterResult> {
        (self.func)(ctx, action)
    }
}

impl PartialEq for StorageFilter {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StorageFilter {}

impl Hash for StorageFilter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for StorageFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StorageFilter").field(&self.id).finish()
    }
}

/// A filter plus the layers it watches
///
/// Without explicit layers the filter watches the default layer given at
/// registration.
#[derive(Debug, Clone)]
pub struct FilterDescriptor {
    pub filter: StorageFilter,
    pub layer_ids: Option<Vec<LayerId>>,
}

impl FilterDescriptor {
    pub fn new(filter: StorageFilter) -> Self {
        Self {
            filter,
            layer_ids: None,
        }
    }

    pub fn for_layers<I, L>(filter: StorageFilter, layers: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<LayerId>,
    {
        Self {
            filter,
            layer_ids: Some(layers.into_iter().map(Into::into).collect()),
        }
    }
}

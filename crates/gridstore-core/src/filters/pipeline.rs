use std::collections::{BTreeSet, HashMap, HashSet};

use super::filter::{FilterContext, FilterDescriptor, FilterId, StorageFilter};
use crate::errors::{Result, StorageError};
use crate::history::EntryId;
use crate::model::{HistoryAction, HistoryContext, LayerId, PartialHistoryAction};

/// Combined verdict of every filter watching an action's layer
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// `false` if any filter vetoed the action
    pub keep: bool,
    /// Extra actions collected from all filters, in registration order
    pub extra_actions: Vec<PartialHistoryAction>,
    /// Filters that were consulted, in registration order
    pub consulted: Vec<FilterId>,
}

/// Per-layer ordered filter lists
///
/// Also remembers which (log entry, filter) pairs have already
/// contributed their extra actions, so that recomputing a log never
/// synthesizes the same edits twice.
#[derive(Debug, Clone, Default)]
pub struct FilterPipeline {
    by_layer: HashMap<LayerId, Vec<StorageFilter>>,
    layers_by_filter: HashMap<FilterId, BTreeSet<LayerId>>,
    processed: HashSet<(HistoryContext, EntryId, FilterId)>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register filters, returning the layers that gained a filter
    ///
    /// A filter already present on a layer is not added again.
    pub fn register(
        &mut self,
        descriptors: Vec<FilterDescriptor>,
        default_layer: &str,
    ) -> BTreeSet<LayerId> {
        let mut affected = BTreeSet::new();
        for descriptor in descriptors {
            let layers = descriptor
                .layer_ids
                .unwrap_or_else(|| vec![default_layer.to_string()]);
            for layer in layers {
                let list = self.by_layer.entry(layer.clone()).or_default();
                if list.contains(&descriptor.filter) {
                    continue;
                }
                list.push(descriptor.filter.clone());
                self.layers_by_filter
                    .entry(descriptor.filter.id())
                    .or_default()
                    .insert(layer.clone());
                affected.insert(layer);
            }
        }
        affected
    }

    /// Remove filters from every layer they watch
    ///
    /// # Errors
    ///
    /// Returns `FilterNotRegistered` if any filter is unknown; nothing is
    /// removed in that case.
    pub fn unregister(&mut self, filters: &[StorageFilter]) -> Result<()> {
        if let Some(unknown) = filters
            .iter()
            .find(|f| !self.layers_by_filter.contains_key(&f.id()))
        {
            return Err(StorageError::FilterNotRegistered {
                filter_id: unknown.id().as_u64(),
            });
        }

        for filter in filters {
            let Some(layers) = self.layers_by_filter.remove(&filter.id()) else {
                continue;
            };
            for layer in layers {
                if let Some(list) = self.by_layer.get_mut(&layer) {
                    list.retain(|f| f != filter);
                    if list.is_empty() {
                        self.by_layer.remove(&layer);
                    }
                }
            }
        }
        Ok(())
    }

    /// Filters watching `layer_id`, in registration order
    pub fn filters_for(&self, layer_id: &str) -> &[StorageFilter] {
        self.by_layer.get(layer_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Layers a filter currently watches
    pub fn layers_of(&self, filter: &StorageFilter) -> Option<&BTreeSet<LayerId>> {
        self.layers_by_filter.get(&filter.id())
    }

    /// Run every filter on the action's layer
    ///
    /// All filters run even after one vetoes, so their extra actions are
    /// still collected. Extras from filters for which `skip_extras`
    /// answers true are discarded.
    ///
    /// # Errors
    ///
    /// Propagates the first error a filter returns.
    pub fn evaluate<S>(
        &self,
        ctx: &FilterContext<'_>,
        action: &HistoryAction,
        skip_extras: S,
    ) -> Result<Evaluation>
    where
        S: Fn(FilterId) -> bool,
    {
        let mut evaluation = Evaluation {
            keep: true,
            extra_actions: Vec::new(),
            consulted: Vec::new(),
        };
        for filter in self.filters_for(&action.layer_id) {
            let result = filter.call(ctx, action)?;
            if !result.keep {
                tracing::trace!(
                    filter_id = %filter.id(),
                    layer_id = %action.layer_id,
                    object_id = %action.object_id,
                    "filter rejected action"
                );
                evaluation.keep = false;
            }
            if !skip_extras(filter.id()) {
                evaluation.extra_actions.extend(result.extra_actions);
            }
            evaluation.consulted.push(filter.id());
        }
        Ok(evaluation)
    }

    pub fn mark_processed(&mut self, log: &HistoryContext, entry: EntryId, filters: &[FilterId]) {
        for filter in filters {
            self.processed.insert((log.clone(), entry, *filter));
        }
    }

    pub fn is_processed(&self, log: &HistoryContext, entry: EntryId, filter: FilterId) -> bool {
        self.processed.contains(&(log.clone(), entry, filter))
    }

    /// Forget processed pairs for a log whose entries were discarded
    pub fn forget_log(&mut self, log: &HistoryContext) {
        self.processed.retain(|(ctx, _, _)| ctx != log);
    }

    /// Forget processed pairs of one log's entries that `keep` rejects
    pub fn retain_entries<F>(&mut self, log: &HistoryContext, keep: F)
    where
        F: Fn(EntryId) -> bool,
    {
        self.processed
            .retain(|(ctx, entry, _)| ctx != log || keep(*entry));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterResult;
    use crate::model::{Anchor, StorageMode, StorageRef};
    use crate::store::LayerObjectStore;
    use serde_json::json;

    fn keep_all() -> StorageFilter {
        StorageFilter::new(|_, _| Ok(FilterResult::keep()))
    }

    fn action(layer: &str) -> HistoryAction {
        HistoryAction {
            object_id: "a".to_string(),
            layer_id: layer.to_string(),
            batch_id: None,
            storage_mode: StorageMode::Question,
            object: Some(json!(1)),
            anchor: Anchor::End,
        }
    }

    #[test]
    fn test_register_is_idempotent_per_layer() {
        let mut pipeline = FilterPipeline::new();
        let filter = keep_all();

        let first = pipeline.register(vec![FilterDescriptor::new(filter.clone())], "cages");
        let second = pipeline.register(
            vec![
                FilterDescriptor::new(filter.clone()),
                FilterDescriptor::new(filter.clone()),
            ],
            "cages",
        );

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(pipeline.filters_for("cages").len(), 1);
    }

    #[test]
    fn test_register_explicit_layers_extends_reverse_index() {
        let mut pipeline = FilterPipeline::new();
        let filter = keep_all();
        pipeline.register(vec![FilterDescriptor::new(filter.clone())], "cages");
        let affected = pipeline.register(
            vec![FilterDescriptor::for_layers(filter.clone(), ["cages", "used"])],
            "ignored",
        );

        assert_eq!(affected.into_iter().collect::<Vec<_>>(), vec!["used"]);
        let layers: Vec<_> = pipeline.layers_of(&filter).unwrap().iter().cloned().collect();
        assert_eq!(layers, vec!["cages", "used"]);
        assert!(pipeline.filters_for("ignored").is_empty());
    }

    #[test]
    fn test_unregister_removes_everywhere() {
        let mut pipeline = FilterPipeline::new();
        let filter = keep_all();
        let other = keep_all();
        pipeline.register(
            vec![
                FilterDescriptor::for_layers(filter.clone(), ["cages", "used"]),
                FilterDescriptor::new(other.clone()),
            ],
            "cages",
        );

        pipeline.unregister(&[filter.clone()]).unwrap();
        assert_eq!(pipeline.filters_for("cages"), &[other]);
        assert!(pipeline.filters_for("used").is_empty());
        assert!(pipeline.layers_of(&filter).is_none());
    }

    #[test]
    fn test_unregister_unknown_filter_fails_without_changes() {
        let mut pipeline = FilterPipeline::new();
        let known = keep_all();
        pipeline.register(vec![FilterDescriptor::new(known.clone())], "cages");

        let result = pipeline.unregister(&[known.clone(), keep_all()]);
        assert!(matches!(result, Err(StorageError::FilterNotRegistered { .. })));
        assert_eq!(pipeline.filters_for("cages").len(), 1);
    }

    #[test]
    fn test_evaluate_runs_all_filters_after_veto() {
        let mut pipeline = FilterPipeline::new();
        let veto = StorageFilter::new(|_, _| {
            Ok(FilterResult::reject().with_extra_actions([PartialHistoryAction::delete("v")]))
        });
        let derive = StorageFilter::new(|_, a: &HistoryAction| {
            Ok(FilterResult::keep()
                .with_extra_actions([PartialHistoryAction::set(a.object_id.clone(), json!(true))]))
        });
        pipeline.register(
            vec![
                FilterDescriptor::new(veto.clone()),
                FilterDescriptor::new(derive.clone()),
            ],
            "cages",
        );

        let ctx = HistoryContext::question("g1");
        let stores: HashMap<StorageRef, LayerObjectStore> = HashMap::new();
        let evaluation = pipeline
            .evaluate(&FilterContext::new(&ctx, &stores), &action("cages"), |_| false)
            .unwrap();

        assert!(!evaluation.keep);
        assert_eq!(evaluation.extra_actions.len(), 2);
        assert_eq!(evaluation.consulted, vec![veto.id(), derive.id()]);

        let skipped = pipeline
            .evaluate(&FilterContext::new(&ctx, &stores), &action("cages"), |id| {
                id == veto.id()
            })
            .unwrap();
        assert_eq!(skipped.extra_actions.len(), 1);
        assert_eq!(skipped.extra_actions[0].id, "a");
    }

    #[test]
    fn test_evaluate_propagates_filter_errors() {
        let mut pipeline = FilterPipeline::new();
        pipeline.register(
            vec![FilterDescriptor::new(StorageFilter::new(|_, _| {
                Err(StorageError::filter("cage too large"))
            }))],
            "cages",
        );
        let ctx = HistoryContext::question("g1");
        let stores = HashMap::new();
        let result = pipeline.evaluate(&FilterContext::new(&ctx, &stores), &action("cages"), |_| false);
        assert!(matches!(result, Err(StorageError::FilterFailed { .. })));
    }

    #[test]
    fn test_processed_pairs_are_scoped_per_log() {
        let mut pipeline = FilterPipeline::new();
        let filter = keep_all();
        let question = HistoryContext::question("g1");
        let answer = HistoryContext::answer("g1");

        pipeline.mark_processed(&question, 3, &[filter.id()]);
        assert!(pipeline.is_processed(&question, 3, filter.id()));
        assert!(!pipeline.is_processed(&answer, 3, filter.id()));

        pipeline.forget_log(&question);
        assert!(!pipeline.is_processed(&question, 3, filter.id()));
    }

    #[test]
    fn test_retain_entries_prunes_only_that_log() {
        let mut pipeline = FilterPipeline::new();
        let filter = keep_all();
        let question = HistoryContext::question("g1");
        let answer = HistoryContext::answer("g1");
        for entry in 0..3 {
            pipeline.mark_processed(&question, entry, &[filter.id()]);
        }
        pipeline.mark_processed(&answer, 1, &[filter.id()]);

        pipeline.retain_entries(&question, |entry| entry != 1);

        assert!(pipeline.is_processed(&question, 0, filter.id()));
        assert!(!pipeline.is_processed(&question, 1, filter.id()));
        assert!(pipeline.is_processed(&question, 2, filter.id()));
        assert!(pipeline.is_processed(&answer, 1, filter.id()));
    }
}

use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use super::ordered::{Keys, OrderedKeyedCollection};

/// Eligibility predicate deciding which values may become the selection
pub type SelectablePredicate<V> = Rc<dyn Fn(&V) -> bool>;

/// An ordered collection with a "current" entry
///
/// Setting a selectable value makes it current. Deleting the current
/// entry moves the selection to the nearest selectable survivor, looking
/// forward first and then backward.
#[derive(Clone)]
pub struct SelectableOrderedCollection<K, V> {
    inner: OrderedKeyedCollection<K, V>,
    selectable: SelectablePredicate<V>,
    current_key: Option<K>,
}

impl<K, V> SelectableOrderedCollection<K, V>
where
    K: Clone + Eq + Hash,
{
    pub fn new(selectable: SelectablePredicate<V>) -> Self {
        Self {
            inner: OrderedKeyedCollection::new(),
            selectable,
            current_key: None,
        }
    }

    /// Collection in which every value is selectable
    pub fn all_selectable() -> Self {
        Self::new(Rc::new(|_| true))
    }

    pub fn set_selectable(&mut self, selectable: SelectablePredicate<V>) {
        self.selectable = selectable;
    }

    pub fn is_selectable(&self, value: &V) -> bool {
        (self.selectable)(value)
    }

    /// Insert or move `key` (see [`OrderedKeyedCollection::set`])
    pub fn set(&mut self, key: K, value: V, before: Option<&K>) -> bool {
        let becomes_current = self.is_selectable(&value);
        let anchor_found = self.inner.set(key.clone(), value, before);
        if becomes_current {
            self.current_key = Some(key);
        }
        anchor_found
    }

    pub fn delete(&mut self, key: &K) -> Option<V> {
        if self.current_key.as_ref() != Some(key) {
            return self.inner.delete(key);
        }

        let replacement = self
            .scan(key, |c, k| c.next(k))
            .or_else(|| self.scan(key, |c, k| c.prev(k)));
        self.current_key = replacement;
        self.inner.delete(key)
    }

    fn scan<'a, F>(&'a self, from: &'a K, step: F) -> Option<K>
    where
        F: Fn(&'a OrderedKeyedCollection<K, V>, &'a K) -> Option<&'a K>,
    {
        let mut cursor = step(&self.inner, from);
        while let Some(key) = cursor {
            if self.inner.get(key).is_some_and(|v| self.is_selectable(v)) {
                return Some(key.clone());
            }
            cursor = step(&self.inner, key);
        }
        None
    }

    pub fn current_key(&self) -> Option<&K> {
        self.current_key.as_ref()
    }

    /// Make `key` current if it is present and selectable
    pub fn select(&mut self, key: &K) -> bool {
        let eligible = self
            .inner
            .get(key)
            .is_some_and(|v| self.is_selectable(v));
        if eligible {
            self.current_key = Some(key.clone());
        }
        eligible
    }

    pub fn clear_selection(&mut self) {
        self.current_key = None;
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn has(&self, key: &K) -> bool {
        self.inner.has(key)
    }

    pub fn prev(&self, key: &K) -> Option<&K> {
        self.inner.prev(key)
    }

    pub fn next(&self, key: &K) -> Option<&K> {
        self.inner.next(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        self.inner.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.inner.iter()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
        self.current_key = None;
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for SelectableOrderedCollection<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectableOrderedCollection")
            .field("inner", &self.inner)
            .field("current_key", &self.current_key)
            .finish_non_exhaustive()
    }
}

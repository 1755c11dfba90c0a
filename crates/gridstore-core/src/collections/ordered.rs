use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone)]
struct Node<K, V> {
    value: V,
    prev: Option<K>,
    next: Option<K>,
}

/// Key→value map with a remembered total order
///
/// The order is a doubly-linked list threaded through the map, so
/// positional inserts ("before key X" or at the tail), deletes, and
/// neighbour lookups are all O(1).
///
/// Not thread-safe - designed for single-threaded use by one owner.
#[derive(Debug, Clone)]
pub struct OrderedKeyedCollection<K, V> {
    nodes: HashMap<K, Node<K, V>>,
    head: Option<K>,
    tail: Option<K>,
}

impl<K, V> Default for OrderedKeyedCollection<K, V> {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            head: None,
            tail: None,
        }
    }
}

impl<K, V> OrderedKeyedCollection<K, V>
where
    K: Clone + Eq + Hash,
{
    /// Create a new empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`, placing it immediately before `before`
    ///
    /// An existing key is unlinked first, so `set` also moves it. When
    /// `before` is `None`, names an absent key, or names `key` itself, the
    /// key goes to the tail.
    ///
    /// # Returns
    /// `false` if `before` named a key that is not present (the caller
    /// decides whether that deserves a warning), otherwise `true`.
    pub fn set(&mut self, key: K, value: V, before: Option<&K>) -> bool {
        self.unlink(&key);

        let anchor = before.filter(|b| **b != key && self.nodes.contains_key(*b));
        let anchor_found = before.is_none() || anchor.is_some();

        let (prev, next) = match anchor {
            Some(anchor) => {
                let prev = self.nodes.get(anchor).and_then(|n| n.prev.clone());
                (prev, Some(anchor.clone()))
            }
            None => (self.tail.clone(), None),
        };

        match &prev {
            Some(p) => {
                if let Some(node) = self.nodes.get_mut(p) {
                    node.next = Some(key.clone());
                }
            }
            None => self.head = Some(key.clone()),
        }
        match &next {
            Some(n) => {
                if let Some(node) = self.nodes.get_mut(n) {
                    node.prev = Some(key.clone());
                }
            }
            None => self.tail = Some(key.clone()),
        }

        self.nodes.insert(key, Node { value, prev, next });
        anchor_found
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.nodes.get(key).map(|n| &n.value)
    }

    pub fn has(&self, key: &K) -> bool {
        self.nodes.contains_key(key)
    }

    /// Remove `key` from both the map and the order, returning its value
    pub fn delete(&mut self, key: &K) -> Option<V> {
        self.unlink(key).map(|node| node.value)
    }

    /// The key ordered immediately before `key`
    pub fn prev(&self, key: &K) -> Option<&K> {
        self.nodes.get(key).and_then(|n| n.prev.as_ref())
    }

    /// The key ordered immediately after `key`
    pub fn next(&self, key: &K) -> Option<&K> {
        self.nodes.get(key).and_then(|n| n.next.as_ref())
    }

    pub fn first(&self) -> Option<&K> {
        self.head.as_ref()
    }

    pub fn last(&self) -> Option<&K> {
        self.tail.as_ref()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }

    /// Keys in total order
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys {
            nodes: &self.nodes,
            cursor: self.head.as_ref(),
        }
    }

    /// Entries in total order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.keys()
            .filter_map(move |k| self.nodes.get(k).map(|n| (k, &n.value)))
    }

    fn unlink(&mut self, key: &K) -> Option<Node<K, V>> {
        let node = self.nodes.remove(key)?;
        match &node.prev {
            Some(p) => {
                if let Some(prev) = self.nodes.get_mut(p) {
                    prev.next = node.next.clone();
                }
            }
            None => self.head = node.next.clone(),
        }
        match &node.next {
            Some(n) => {
                if let Some(next) = self.nodes.get_mut(n) {
                    next.prev = node.prev.clone();
                }
            }
            None => self.tail = node.prev.clone(),
        }
        Some(node)
    }
}

/// Iterator over keys in total order
pub struct Keys<'a, K, V> {
    nodes: &'a HashMap<K, Node<K, V>>,
    cursor: Option<&'a K>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V>
where
    K: Eq + Hash,
{
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.cursor?;
        self.cursor = self.nodes.get(key).and_then(|n| n.next.as_ref());
        Some(key)
    }
}

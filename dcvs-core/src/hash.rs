//! Named-node list
//!
//! Ordered collection of records keyed by name. Every administrative
//! structure (entries, subdirectories, held locks) is stored in one of these:
//! lookups go through a hash index, walks follow list order.

use crate::error::{AdminError, Result};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
struct Node<T> {
    key: String,
    value: T,
}

/// Ordered, uniquely keyed list of records.
///
/// Iteration follows insertion order (nodes added with
/// [`List::add_at_front`] come first) until the list is re-sorted.
#[derive(Debug, Clone)]
pub struct List<T> {
    /// Position -> node. Positions only need to be ordered, not dense.
    nodes: BTreeMap<i64, Node<T>>,
    /// Key -> position
    index: HashMap<String, i64>,
    front: i64,
    back: i64,
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> List<T> {
    /// Create an empty list
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            index: HashMap::new(),
            front: 0,
            back: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Append a node. Fails if a node with the same key already exists.
    pub fn add(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        let key = key.into();
        if self.index.contains_key(&key) {
            return Err(AdminError::DuplicateKey(key));
        }
        let pos = self.back;
        self.back += 1;
        self.insert_at(pos, key, value);
        Ok(())
    }

    /// Prepend a node. Fails if a node with the same key already exists.
    pub fn add_at_front(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        let key = key.into();
        if self.index.contains_key(&key) {
            return Err(AdminError::DuplicateKey(key));
        }
        self.front -= 1;
        let pos = self.front;
        self.insert_at(pos, key, value);
        Ok(())
    }

    /// Remove any node with this key, then append the new one.
    /// Returns the value that was replaced.
    pub fn replace(&mut self, key: impl Into<String>, value: T) -> Option<T> {
        let key = key.into();
        let old = self.remove(&key);
        let pos = self.back;
        self.back += 1;
        self.insert_at(pos, key, value);
        old
    }

    fn insert_at(&mut self, pos: i64, key: String, value: T) {
        self.index.insert(key.clone(), pos);
        self.nodes.insert(pos, Node { key, value });
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn find(&self, key: &str) -> Option<&T> {
        let pos = self.index.get(key)?;
        self.nodes.get(pos).map(|n| &n.value)
    }

    pub fn find_mut(&mut self, key: &str) -> Option<&mut T> {
        let pos = self.index.get(key)?;
        self.nodes.get_mut(pos).map(|n| &mut n.value)
    }

    /// Case-insensitive lookup, for working copies on case-folding
    /// filesystems. Exact matches win over folded ones.
    pub fn find_ignore_case(&self, key: &str) -> Option<(&str, &T)> {
        if let Some(v) = self.find(key) {
            let pos = self.index[key];
            return Some((self.nodes[&pos].key.as_str(), v));
        }
        self.nodes
            .values()
            .find(|n| n.key.eq_ignore_ascii_case(key))
            .map(|n| (n.key.as_str(), &n.value))
    }

    /// Remove a node, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<T> {
        let pos = self.index.remove(key)?;
        self.nodes.remove(&pos).map(|n| n.value)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.front = 0;
        self.back = 0;
    }

    /// Visit every node in list order. The callback returns an error count;
    /// the sum over all nodes is returned.
    pub fn walk<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&str, &T) -> usize,
    {
        self.nodes.values().map(|n| f(&n.key, &n.value)).sum()
    }

    /// Re-order the list with a comparator over (key, value) pairs.
    pub fn sort_by<F>(&mut self, mut cmp: F)
    where
        F: FnMut((&str, &T), (&str, &T)) -> Ordering,
    {
        let mut nodes: Vec<Node<T>> = std::mem::take(&mut self.nodes).into_values().collect();
        nodes.sort_by(|a, b| cmp((a.key.as_str(), &a.value), (b.key.as_str(), &b.value)));
        self.index.clear();
        self.front = 0;
        self.back = 0;
        for node in nodes {
            let pos = self.back;
            self.back += 1;
            self.insert_at(pos, node.key, node.value);
        }
    }

    /// Sort nodes by key.
    pub fn sort_by_key_name(&mut self) {
        self.sort_by(|(a, _), (b, _)| a.cmp(b));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.nodes.values().map(|n| (n.key.as_str(), &n.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.nodes.values().map(|n| n.key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.nodes.values().map(|n| &n.value)
    }

    /// Consume the list, yielding (key, value) pairs in list order.
    pub fn into_pairs(self) -> impl Iterator<Item = (String, T)> {
        self.nodes.into_values().map(|n| (n.key, n.value))
    }
}

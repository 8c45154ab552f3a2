//! Identity-keyed memo tables
//!
//! Entries are keyed by the allocation address of a [`NodeRef`] and hold a
//! [`Weak`] back to the node. The weak handle keeps the allocation itself
//! reserved, so an address cannot be handed to a different node while its
//! entry exists, and it never keeps the node's contents alive.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::schema::{NodeRef, SchemaNode};

/// Address of a node's allocation
pub(crate) fn node_key(node: &NodeRef) -> usize {
    Arc::as_ptr(node) as usize
}

struct Entry<V> {
    node: Weak<SchemaNode>,
    value: V,
}

/// Memo table keyed by node identity
pub(crate) struct NodeCache<V> {
    entries: HashMap<usize, Entry<V>>,
}

impl<V> Default for NodeCache<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V> NodeCache<V> {
    pub fn get(&self, node: &NodeRef) -> Option<&V> {
        self.entries
            .get(&node_key(node))
            .filter(|entry| entry.node.strong_count() > 0)
            .map(|entry| &entry.value)
    }

    pub fn insert(&mut self, node: &NodeRef, value: V) {
        self.entries.insert(
            node_key(node),
            Entry {
                node: Arc::downgrade(node),
                value,
            },
        );
    }

    /// Drop entries whose node has been released. Returns how many were removed.
    pub fn purge(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.node.strong_count() > 0);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_nodes_with_equal_content() {
        let a: NodeRef = Arc::new(SchemaNode::String);
        let b: NodeRef = Arc::new(SchemaNode::String);
        let mut cache = NodeCache::default();
        cache.insert(&a, 1);

        assert_eq!(cache.get(&a), Some(&1));
        assert_eq!(cache.get(&Arc::clone(&a)), Some(&1));
        assert_eq!(cache.get(&b), None);
    }

    #[test]
    fn test_purge_released_nodes() {
        let kept: NodeRef = Arc::new(SchemaNode::Any);
        let mut cache = NodeCache::default();
        cache.insert(&kept, "kept");
        {
            let dropped: NodeRef = Arc::new(SchemaNode::Boolean);
            cache.insert(&dropped, "dropped");
        }

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.purge(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&kept), Some(&"kept"));
    }
}

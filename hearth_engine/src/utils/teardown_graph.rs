/// Dependency graph ordering the destruction of context-owned GPU objects.
///
/// Every node records the nodes it depends on (a framebuffer depends on the
/// render pass and the depth buffer, a render pass on the device...). A node
/// can only be removed once nothing live depends on it, and `teardown`
/// yields the whole graph dependents-first. Dependencies must exist when a
/// node is inserted, so the graph is acyclic by construction.

use rustc_hash::FxHashSet;
use slotmap::{new_key_type, SlotMap};
use crate::error::{Error, Result};
use crate::engine_contract;

// ===== SLOT MAP KEY =====

new_key_type! {
    /// Stable key of a node in a [`TeardownGraph`]
    pub struct TeardownKey;
}

struct Node<T> {
    payload: T,
    /// Insertion sequence number, breaks ties in teardown order
    sequence: u64,
    depends_on: FxHashSet<TeardownKey>,
    dependents: FxHashSet<TeardownKey>,
}

/// Destruction-order graph over payloads of type `T`
///
/// # Example
///
/// ```
/// use hearth_engine::hearth::utils::TeardownGraph;
///
/// let mut graph = TeardownGraph::new();
/// let device = graph.insert("device", &[]).unwrap();
/// let pass = graph.insert("render pass", &[device]).unwrap();
/// let _fb = graph.insert("framebuffer", &[pass]).unwrap();
///
/// assert!(graph.remove(device).is_err());
/// assert_eq!(graph.teardown(), vec!["framebuffer", "render pass", "device"]);
/// ```
pub struct TeardownGraph<T> {
    nodes: SlotMap<TeardownKey, Node<T>>,
    next_sequence: u64,
}

impl<T> TeardownGraph<T> {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            next_sequence: 0,
        }
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no node
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `key` refers to a live node
    pub fn contains(&self, key: TeardownKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Payload of a live node
    pub fn get(&self, key: TeardownKey) -> Option<&T> {
        self.nodes.get(key).map(|node| &node.payload)
    }

    /// Register a payload that must be destroyed before everything in `depends_on`
    ///
    /// # Errors
    ///
    /// `InvalidResource` if a dependency is not a live node.
    pub fn insert(&mut self, payload: T, depends_on: &[TeardownKey]) -> Result<TeardownKey> {
        if let Some(missing) = depends_on.iter().find(|key| !self.nodes.contains_key(**key)) {
            return Err(Error::InvalidResource(format!(
                "teardown dependency {:?} is not registered",
                missing
            )));
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let key = self.nodes.insert(Node {
            payload,
            sequence,
            depends_on: depends_on.iter().copied().collect(),
            dependents: FxHashSet::default(),
        });

        for dependency in depends_on {
            if let Some(node) = self.nodes.get_mut(*dependency) {
                node.dependents.insert(key);
            }
        }

        Ok(key)
    }

    /// Live nodes that depend directly on `key`, most recent first
    pub fn dependents_of(&self, key: TeardownKey) -> Vec<TeardownKey> {
        let Some(node) = self.nodes.get(key) else {
            return Vec::new();
        };
        let mut dependents: Vec<TeardownKey> = node.dependents.iter().copied().collect();
        dependents.sort_by_key(|dependent| std::cmp::Reverse(self.sequence_of(*dependent)));
        dependents
    }

    /// Remove a single node and hand back its payload
    ///
    /// # Errors
    ///
    /// - `InvalidResource` if `key` is not live
    /// - `ContractViolation` if live nodes still depend on it
    pub fn remove(&mut self, key: TeardownKey) -> Result<T> {
        let dependent_count = match self.nodes.get(key) {
            Some(node) => node.dependents.len(),
            None => {
                return Err(Error::InvalidResource(format!(
                    "teardown node {:?} is not registered",
                    key
                )))
            }
        };

        if dependent_count > 0 {
            engine_contract!(
                "hearth::TeardownGraph",
                "node {:?} destroyed while {} dependent object(s) are alive",
                key,
                dependent_count
            );
        }

        self.detach(key)
    }

    /// Remove every node, returning payloads dependents-first
    ///
    /// At every step the most recently inserted node with no live
    /// dependent is released.
    pub fn teardown(&mut self) -> Vec<T> {
        let mut order = Vec::with_capacity(self.nodes.len());

        // One node per step: releasing it may make an older node ready
        while let Some(key) = self
            .nodes
            .iter()
            .filter(|(_, node)| node.dependents.is_empty())
            .max_by_key(|(_, node)| node.sequence)
            .map(|(key, _)| key)
        {
            match self.detach(key) {
                Ok(payload) => order.push(payload),
                Err(_) => break,
            }
        }

        order
    }

    fn sequence_of(&self, key: TeardownKey) -> u64 {
        self.nodes.get(key).map(|node| node.sequence).unwrap_or(0)
    }

    fn detach(&mut self, key: TeardownKey) -> Result<T> {
        let node = self.nodes.remove(key).ok_or_else(|| {
            Error::InvalidResource(format!("teardown node {:?} is not registered", key))
        })?;

        for dependency in &node.depends_on {
            if let Some(parent) = self.nodes.get_mut(*dependency) {
                parent.dependents.remove(&key);
            }
        }

        Ok(node.payload)
    }
}

impl<T> Default for TeardownGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "teardown_graph_tests.rs"]
mod tests;

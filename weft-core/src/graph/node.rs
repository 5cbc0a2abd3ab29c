//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.
//! Every reactive primitive (cell, memo, or effect) owns exactly one
//! node, identified by a `NodeId` drawn from a single shared namespace, so
//! a memo appears in the graph once whether it is acting as a reader of
//! cells or as a source for effects.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A source node (cell). Roots of the graph: no dependencies, only
    /// dependents.
    Source,

    /// A derived node (memo). Has dependencies and may have dependents.
    Derived,

    /// An effect node. A leaf: has dependencies but no value of its own,
    /// only side effects.
    Effect,
}

/// A node in the dependency graph.
///
/// The node records edges only. Whether a memo is stale or an effect is
/// disposed lives in the primitive itself; the graph's job is to answer
/// "who is downstream of this source, in what order".
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,

    /// Nodes this node reads from (parents in the DAG).
    dependencies: HashSet<NodeId>,

    /// Nodes that read from this node (children in the DAG).
    dependents: HashSet<NodeId>,
}

impl Node {
    /// Create a node for the primitive that owns `id`.
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            dependencies: HashSet::new(),
            dependents: HashSet::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn add_dependency(&mut self, node_id: NodeId) {
        self.dependencies.insert(node_id);
    }

    pub fn remove_dependency(&mut self, node_id: NodeId) {
        self.dependencies.remove(&node_id);
    }

    pub fn dependencies(&self) -> &HashSet<NodeId> {
        &self.dependencies
    }

    pub fn add_dependent(&mut self, node_id: NodeId) {
        self.dependents.insert(node_id);
    }

    pub fn remove_dependent(&mut self, node_id: NodeId) {
        self.dependents.remove(&node_id);
    }

    pub fn dependents(&self) -> &HashSet<NodeId> {
        &self.dependents
    }
}

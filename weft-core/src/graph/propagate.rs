//! Change Propagation
//!
//! The dependency graph answers the one question the runtime asks when a
//! source changes: which nodes are downstream, and in what order should
//! they be visited so that a node is never processed before something it
//! reads from.
//!
//! # Algorithm
//!
//! 1. Breadth-first walk from the changed source over dependent edges,
//!    collecting every reachable node.
//! 2. Topologically sort the collected set (Kahn's algorithm), counting
//!    only edges inside the set.
//!
//! The graph stores edges only; dirtiness lives in the reactive primitives.
//! Keeping the two concerns apart means the graph can be locked briefly to
//! compute the affected set and released before any user code runs.

use std::collections::{HashMap, HashSet, VecDeque};

use super::node::{Node, NodeId};

/// Edge bookkeeping for every live reactive primitive.
#[derive(Default)]
pub struct DependencyGraph {
    /// All nodes in the graph, indexed by ID.
    nodes: HashMap<NodeId, Node>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node from the graph, along with every edge touching it.
    pub fn remove_node(&mut self, node_id: NodeId) {
        if let Some(node) = self.nodes.remove(&node_id) {
            for dep_id in node.dependencies() {
                if let Some(dep) = self.nodes.get_mut(dep_id) {
                    dep.remove_dependent(node_id);
                }
            }
            for dependent_id in node.dependents() {
                if let Some(dependent) = self.nodes.get_mut(dependent_id) {
                    dependent.remove_dependency(node_id);
                }
            }
        }
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Add a dependency edge: `dependent` reads from `dependency`.
    pub fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.add_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.add_dependency(dependency);
        }
    }

    /// Remove a dependency edge.
    pub fn remove_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.remove_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.remove_dependency(dependency);
        }
    }

    /// Drop every incoming edge of `node_id`.
    ///
    /// Called before a computation re-runs, so dependencies from the
    /// previous run don't keep triggering it.
    pub fn clear_dependencies(&mut self, node_id: NodeId) {
        let deps: Vec<NodeId> = match self.nodes.get(&node_id) {
            Some(node) => node.dependencies().iter().copied().collect(),
            None => return,
        };
        for dep in deps {
            self.remove_edge(dep, node_id);
        }
    }

    /// Every node downstream of `source`, in topological order
    /// (dependencies before dependents). The source itself is excluded.
    pub fn affected(&self, source: NodeId) -> Vec<NodeId> {
        let mut reached = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        if let Some(node) = self.nodes.get(&source) {
            for dependent_id in node.dependents() {
                queue.push_back(*dependent_id);
            }
        }

        while let Some(node_id) = queue.pop_front() {
            if !visited.insert(node_id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&node_id) {
                reached.push(node_id);
                for dependent_id in node.dependents() {
                    queue.push_back(*dependent_id);
                }
            }
        }

        self.topological_sort(reached)
    }

    /// Order `nodes` such that dependencies come before dependents,
    /// counting only edges inside the set.
    fn topological_sort(&self, nodes: Vec<NodeId>) -> Vec<NodeId> {
        let node_set: HashSet<_> = nodes.iter().copied().collect();
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
        let mut result = Vec::new();
        let mut queue = VecDeque::new();

        for &node_id in &nodes {
            if let Some(node) = self.nodes.get(&node_id) {
                let degree = node
                    .dependencies()
                    .iter()
                    .filter(|d| node_set.contains(d))
                    .count();
                in_degree.insert(node_id, degree);
                if degree == 0 {
                    queue.push_back(node_id);
                }
            }
        }

        // Kahn's algorithm
        while let Some(node_id) = queue.pop_front() {
            result.push(node_id);

            if let Some(node) = self.nodes.get(&node_id) {
                for &dependent_id in node.dependents() {
                    if let Some(degree) = in_degree.get_mut(&dependent_id) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(dependent_id);
                        }
                    }
                }
            }
        }

        result
    }

    /// Total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

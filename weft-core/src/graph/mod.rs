//! Dependency Graph
//!
//! This module implements the dependency graph that tracks relationships
//! between reactive values and computations.
//!
//! # Overview
//!
//! The graph is a DAG where:
//!
//! - Nodes represent cells, memos, or effects
//! - Edges represent dependencies: if A reads B, there is an edge from B to A
//!
//! When a cell changes, the runtime asks the graph for every affected node
//! in topological order, marks lazy nodes stale, and runs eager ones.
//!
//! # Design Decisions
//!
//! 1. A centralized graph rather than distributed linked lists: it enables
//!    topological ordering of a whole update pass and keeps edge removal
//!    (when a computation re-tracks) a local operation.
//!
//! 2. Nodes are indexed by ID for O(1) lookups; forward and reverse edges
//!    are both maintained for traversal in either direction.
//!
//! 3. The graph stores *edges only*. Staleness and disposal state belong to
//!    the primitives themselves.

mod node;
mod propagate;

pub use node::{Node, NodeId, NodeKind};
pub use propagate::DependencyGraph;

//! Dependency Graph
//!
//! This module implements the dependency graph and its resolution into a
//! linear order.
//!
//! # Overview
//!
//! - Nodes carry an opaque payload and a list of the nodes they depend on.
//! - Edges point from a node to its dependency: if A depends on B, B must
//!   appear before A in the resolved order.
//!
//! A graph may hold several disconnected subgraphs. Each one is entered
//! through its roots, the nodes nothing else depends on, and resolved with a
//! depth-first walk that emits dependencies before dependents.
//!
//! # Cycle Detection
//!
//! Cycles are caught in two places:
//!
//! 1. During the walk, an edge back to a node on the current path is a cycle.
//!    The error names both ends of that edge.
//!
//! 2. A cycle that no root leads into is never walked at all. After every
//!    root is processed, any registered node still unresolved means such a
//!    cycle exists.
//!
//! Both are needed: the first cannot see unreachable cycles, the second cannot
//! say where a cycle is.

mod dependency_graph;
mod node;
mod traversal;

pub use dependency_graph::DependencyGraph;
pub use node::{DependencyNode, NodeId};

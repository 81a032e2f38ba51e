//! Tangle Core
//!
//! This crate resolves dependency graphs: given nodes that depend on each
//! other, it produces an order in which every node comes after everything it
//! depends on, and reports circular dependencies instead of looping forever.
//!
//! Payloads are opaque. A node carries any value `T`, and resolution hands
//! those values back in dependency order.
//!
//! # Architecture
//!
//! - `graph`: nodes, the graph registry and the depth-first resolver
//! - `error`: the circular dependency error
//!
//! # Example
//!
//! ```rust
//! use tangle_core::{DependencyGraph, DependencyNode};
//!
//! let a = DependencyNode::new('A');
//! let b = DependencyNode::new('B');
//! let c = DependencyNode::new('C');
//!
//! // Dependencies can be declared on the nodes...
//! a.depends_on(&b);
//!
//! // ...or through the graph.
//! let mut graph = DependencyGraph::new();
//! graph.add_node(&a);
//! graph.add_dependency(&b, &c);
//!
//! assert_eq!(graph.resolve().unwrap(), vec!['C', 'B', 'A']);
//! ```
//!
//! Resolution logs through `tracing`; install a subscriber in the host
//! application to see it.

pub mod error;
pub mod graph;

pub use error::{CircularDependencyError, GraphResult};
pub use graph::{DependencyGraph, DependencyNode, NodeId};

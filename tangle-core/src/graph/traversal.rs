//! Depth-First Resolution
//!
//! The traversal walks from a starting node down through its dependencies and
//! emits each node once all of its dependencies have been emitted. The result
//! is a post-order: leaves first, the starting node last.
//!
//! # Algorithm
//!
//! 1. Mark the node as seen for the current traversal.
//! 2. For each direct dependency, in declaration order:
//!    - already resolved: skip it
//!    - seen but not resolved: it is an ancestor on the current path, so the
//!      edge closes a cycle and resolution fails
//!    - otherwise: descend into it
//! 3. Once every dependency is handled, append the node to the resolved set.
//!
//! The recursion is replaced by an explicit stack of frames so arbitrarily
//! deep chains cannot overflow the call stack. The resolved set is shared
//! between traversals started from different roots; the seen set is not.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{debug, trace};

use super::node::{DependencyList, DependencyNode, NodeId};
use crate::error::{CircularDependencyError, GraphResult};

/// A node whose dependencies are still being walked.
struct Frame<T> {
    node: DependencyNode<T>,
    /// Snapshot of the node's dependencies taken when the frame was pushed.
    dependencies: DependencyList<T>,
    /// Index of the next dependency to look at.
    cursor: usize,
}

/// Order-preserving set of resolved nodes, filled by one or more traversals.
pub(crate) struct Traversal<T> {
    resolved: IndexMap<NodeId, DependencyNode<T>>,
}

impl<T> Traversal<T> {
    pub(crate) fn new() -> Self {
        Self {
            resolved: IndexMap::new(),
        }
    }

    /// Number of nodes resolved so far.
    pub(crate) fn len(&self) -> usize {
        self.resolved.len()
    }

    /// Resolve everything reachable from `root`.
    ///
    /// `dependencies_of` supplies the direct dependencies of a node; the graph
    /// passes its edge map, the standalone entry point reads the nodes
    /// themselves.
    pub(crate) fn visit<F>(
        &mut self,
        root: &DependencyNode<T>,
        mut dependencies_of: F,
    ) -> GraphResult<()>
    where
        F: FnMut(&DependencyNode<T>) -> DependencyList<T>,
    {
        if self.resolved.contains_key(&root.id()) {
            return Ok(());
        }

        let mut seen = HashSet::new();
        seen.insert(root.id());
        let mut stack = vec![Frame {
            node: root.clone(),
            dependencies: dependencies_of(root),
            cursor: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            match frame.dependencies.get(frame.cursor).cloned() {
                Some(edge) => {
                    frame.cursor += 1;

                    if self.resolved.contains_key(&edge.id()) {
                        continue;
                    }

                    if !seen.insert(edge.id()) {
                        debug!(
                            node = %frame.node,
                            dependency = %edge,
                            "circular dependency detected"
                        );
                        return Err(CircularDependencyError::back_edge(
                            frame.node.name(),
                            edge.name(),
                        ));
                    }

                    trace!(node = %frame.node, dependency = %edge, "descending");
                    let dependencies = dependencies_of(&edge);
                    stack.push(Frame {
                        node: edge,
                        dependencies,
                        cursor: 0,
                    });
                }
                None => {
                    if let Some(done) = stack.pop() {
                        self.resolved.insert(done.node.id(), done.node);
                    }
                }
            }
        }

        Ok(())
    }

    /// Consume the traversal, yielding nodes in resolution order.
    pub(crate) fn into_nodes(self) -> Vec<DependencyNode<T>> {
        self.resolved.into_values().collect()
    }
}

//! Graph Nodes
//!
//! This module defines the node handle that carries a caller payload together
//! with the nodes it directly depends on.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use smallvec::SmallVec;

use crate::error::UNNAMED;

/// Direct dependencies of a node, in declaration order.
///
/// Most nodes depend on a handful of others, so the first few live inline.
pub(crate) type DependencyList<T> = SmallVec<[DependencyNode<T>; 4]>;

/// Unique identifier for a node.
///
/// Identity is what the graph keys on: two nodes carrying equal payloads
/// still get different IDs, while clones of one handle share the same ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate the next process-unique node ID.
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Mutable part of a node, shared between all clones of the handle.
struct NodeState<T> {
    /// Opaque caller payload.
    element: T,

    /// Name used in cycle diagnostics.
    name: Option<String>,

    /// Nodes this node depends on. Never holds the same node twice.
    dependencies: DependencyList<T>,
}

/// A node in a dependency graph.
///
/// `DependencyNode` is a cheap handle: cloning it yields another reference to
/// the same node, so dependencies declared through one clone are visible
/// through all of them. Equality and hashing use the node's [`NodeId`], never
/// the payload.
///
/// Nodes hold their dependencies by strong reference. A cycle of nodes that
/// was never added to a [`DependencyGraph`](crate::DependencyGraph) keeps
/// itself alive after every outside handle is dropped; dropping the graph
/// breaks cycles among nodes nobody else holds.
pub struct DependencyNode<T> {
    id: NodeId,
    state: Arc<RwLock<NodeState<T>>>,
}

impl<T> DependencyNode<T> {
    /// Create a new unnamed node carrying `element`.
    pub fn new(element: T) -> Self {
        Self::from_parts(element, None)
    }

    /// Create a new node with a diagnostic name.
    ///
    /// The name shows up in [`CircularDependencyError`](crate::CircularDependencyError)
    /// messages, which is the only place it is used.
    pub fn with_name(element: T, name: impl Into<String>) -> Self {
        Self::from_parts(element, Some(name.into()))
    }

    fn from_parts(element: T, name: Option<String>) -> Self {
        Self {
            id: NodeId::next(),
            state: Arc::new(RwLock::new(NodeState {
                element,
                name,
                dependencies: SmallVec::new(),
            })),
        }
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Declare that this node depends on `other`.
    ///
    /// Adding the same node twice has no effect. Only this node is modified.
    pub fn depends_on(&self, other: &DependencyNode<T>) {
        let mut state = self.state.write();
        if !state.dependencies.iter().any(|dep| dep.id == other.id) {
            state.dependencies.push(other.clone());
        }
    }

    /// Get the direct dependencies, in the order they were declared.
    pub fn dependencies(&self) -> Vec<DependencyNode<T>> {
        self.state.read().dependencies.to_vec()
    }

    pub(crate) fn dependency_list(&self) -> DependencyList<T> {
        self.state.read().dependencies.clone()
    }

    /// IDs of the direct dependencies, read without cloning any handle.
    pub(crate) fn dependency_ids(&self) -> SmallVec<[NodeId; 4]> {
        self.state.read().dependencies.iter().map(|dep| dep.id).collect()
    }

    /// Detach the dependency list, leaving the node with none.
    pub(crate) fn take_dependencies(&self) -> DependencyList<T> {
        mem::take(&mut self.state.write().dependencies)
    }

    /// Number of live handles to this node.
    pub(crate) fn handle_count(&self) -> usize {
        Arc::strong_count(&self.state)
    }

    /// Check whether `other` is a direct dependency.
    pub fn has_dependency(&self, other: &DependencyNode<T>) -> bool {
        self.state
            .read()
            .dependencies
            .iter()
            .any(|dep| dep.id == other.id)
    }

    /// Number of direct dependencies.
    pub fn dependency_count(&self) -> usize {
        self.state.read().dependencies.len()
    }

    /// Borrow the payload.
    ///
    /// The returned guard keeps the node locked for reading; do not hold it
    /// across calls that modify the same node.
    pub fn element(&self) -> MappedRwLockReadGuard<'_, T> {
        RwLockReadGuard::map(self.state.read(), |state| &state.element)
    }

    /// Replace the payload, returning the previous one.
    pub fn set_element(&self, element: T) -> T {
        mem::replace(&mut self.state.write().element, element)
    }

    /// Get the diagnostic name, if one was set.
    pub fn name(&self) -> Option<String> {
        self.state.read().name.clone()
    }

    /// Set the diagnostic name.
    pub fn set_name(&self, name: impl Into<String>) {
        self.state.write().name = Some(name.into());
    }

    /// Remove the diagnostic name.
    pub fn clear_name(&self) {
        self.state.write().name = None;
    }
}

// Releasing a node may release the last handle to its dependencies, and so
// on down a chain. Unwind that with a work list instead of nested drops.
impl<T> Drop for NodeState<T> {
    fn drop(&mut self) {
        let mut pending: Vec<DependencyNode<T>> = self.dependencies.drain(..).collect();
        while let Some(node) = pending.pop() {
            if let Some(lock) = Arc::into_inner(node.state) {
                let mut state = lock.into_inner();
                pending.extend(state.dependencies.drain(..));
            }
        }
    }
}

impl<T> Clone for DependencyNode<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> PartialEq for DependencyNode<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for DependencyNode<T> {}

impl<T> Hash for DependencyNode<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// Dependencies are printed as IDs so cyclic graphs can be formatted.
impl<T> fmt::Debug for DependencyNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        let dependencies: Vec<NodeId> = state.dependencies.iter().map(|dep| dep.id).collect();
        f.debug_struct("DependencyNode")
            .field("id", &self.id)
            .field("name", &state.name)
            .field("dependencies", &dependencies)
            .finish()
    }
}

impl<T> fmt::Display for DependencyNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state.read().name {
            Some(name) => f.write_str(name),
            None => f.write_str(UNNAMED),
        }
    }
}

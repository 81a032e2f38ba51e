//! Dependency Graph
//!
//! The graph is a registry of nodes plus the edges between them. It finds the
//! roots of every independent subgraph and resolves all of them into a single
//! order in which each node comes after everything it depends on.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{debug, trace};

use super::node::{DependencyList, DependencyNode, NodeId};
use super::traversal::Traversal;
use crate::error::{CircularDependencyError, GraphResult};

/// A registry of nodes and their dependency edges.
///
/// Edges can be declared through [`add_dependency`](Self::add_dependency) or
/// directly on the nodes with [`DependencyNode::depends_on`] before the node
/// is added. Either way the graph and the nodes agree on the edge relation.
///
/// # Example
///
/// ```
/// use tangle_core::{DependencyGraph, DependencyNode};
///
/// let mut graph = DependencyGraph::new();
///
/// let app = DependencyNode::new("app");
/// let db = DependencyNode::new("db");
/// let config = DependencyNode::new("config");
///
/// graph.add_dependency(&app, &db);
/// graph.add_dependency(&db, &config);
///
/// assert_eq!(graph.resolve().unwrap(), vec!["config", "db", "app"]);
/// ```
#[derive(Debug)]
pub struct DependencyGraph<T> {
    /// All registered nodes, in registration order.
    nodes: IndexMap<NodeId, DependencyNode<T>>,

    /// Direct dependencies of each registered node.
    edges: IndexMap<NodeId, DependencyList<T>>,
}

impl<T> DependencyGraph<T> {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
        }
    }

    /// Add a node to the graph.
    ///
    /// Dependencies already declared on the node are registered too, along
    /// with everything reachable from them. Adding a registered node again is
    /// a no-op.
    pub fn add_node(&mut self, node: &DependencyNode<T>) {
        if self.contains(node) {
            return;
        }

        // Pushing dependencies in reverse keeps registration in the same
        // pre-order a recursive walk would produce.
        let mut pending = vec![node.clone()];
        while let Some(node) = pending.pop() {
            if self.nodes.contains_key(&node.id()) {
                continue;
            }

            let dependencies = node.dependency_list();
            trace!(node = %node, dependencies = dependencies.len(), "registering node");
            pending.extend(dependencies.iter().rev().cloned());
            self.edges.insert(node.id(), dependencies);
            self.nodes.insert(node.id(), node);
        }
    }

    /// Add a dependency edge: `node` depends on `depends_on`.
    ///
    /// Either node is registered first if needed. The edge is also declared
    /// on `node` itself, so [`DependencyNode::dependencies`] reflects it.
    pub fn add_dependency(&mut self, node: &DependencyNode<T>, depends_on: &DependencyNode<T>) {
        self.add_node(node);
        self.add_node(depends_on);

        node.depends_on(depends_on);
        self.sync_edges(node);
    }

    /// Copy `node`'s own dependency list into the edge map, registering any
    /// targets the graph has not seen yet.
    fn sync_edges(&mut self, node: &DependencyNode<T>) {
        let dependencies = node.dependency_list();
        for dependency in &dependencies {
            self.add_node(dependency);
        }
        self.edges.insert(node.id(), dependencies);
    }

    /// Find the roots: nodes that no registered node depends on.
    ///
    /// Roots are returned in registration order. A node caught in a cycle is
    /// always depended upon, so a cycle with no way in contributes no root.
    pub fn find_root_nodes(&self) -> Vec<DependencyNode<T>> {
        let depended_upon: HashSet<NodeId> = self
            .edges
            .values()
            .flat_map(|dependencies| dependencies.iter().map(DependencyNode::id))
            .collect();

        self.nodes
            .values()
            .filter(|node| !depended_upon.contains(&node.id()))
            .cloned()
            .collect()
    }

    /// Resolve the graph into nodes ordered so that every node comes after
    /// all of its dependencies.
    ///
    /// Independent subgraphs are resolved one after another, in the
    /// registration order of their roots.
    ///
    /// # Errors
    ///
    /// Returns [`CircularDependencyError`] if the dependencies contain a
    /// cycle, whether or not any root leads into it.
    pub fn resolve_nodes(&self) -> GraphResult<Vec<DependencyNode<T>>> {
        if self.nodes.is_empty() {
            return Ok(Vec::new());
        }

        let roots = self.find_root_nodes();
        debug!(nodes = self.nodes.len(), roots = roots.len(), "resolving dependency graph");

        let mut traversal = Traversal::new();
        for root in &roots {
            traversal.visit(root, |node| {
                self.edges.get(&node.id()).cloned().unwrap_or_default()
            })?;
        }

        if traversal.len() != self.nodes.len() {
            let unresolved = self.nodes.len() - traversal.len();
            debug!(unresolved, "circular dependency without an entry point");
            return Err(CircularDependencyError::no_entry_point(unresolved));
        }

        debug!(resolved = traversal.len(), "dependency graph resolved");
        Ok(traversal.into_nodes())
    }

    /// Resolve the graph and return the payloads in dependency order.
    ///
    /// # Errors
    ///
    /// See [`resolve_nodes`](Self::resolve_nodes).
    pub fn resolve(&self) -> GraphResult<Vec<T>>
    where
        T: Clone,
    {
        let nodes = self.resolve_nodes()?;
        Ok(nodes.iter().map(|node| node.element().clone()).collect())
    }

    /// Resolve the subgraph reachable from `node` without building a graph.
    ///
    /// Dependencies are read from the nodes themselves. The result ends with
    /// `node`.
    ///
    /// # Errors
    ///
    /// Returns [`CircularDependencyError`] if a cycle is reachable from `node`.
    pub fn resolve_from(node: &DependencyNode<T>) -> GraphResult<Vec<DependencyNode<T>>> {
        let mut traversal = Traversal::new();
        traversal.visit(node, DependencyNode::dependency_list)?;
        Ok(traversal.into_nodes())
    }

    /// Get all registered nodes, in registration order.
    pub fn nodes(&self) -> impl ExactSizeIterator<Item = &DependencyNode<T>> + '_ {
        self.nodes.values()
    }

    /// Get every registered node along with its direct dependencies.
    pub fn dependencies(
        &self,
    ) -> impl Iterator<Item = (&DependencyNode<T>, &[DependencyNode<T>])> + '_ {
        self.nodes.iter().map(move |(id, node)| {
            let dependencies = self.edges.get(id).map_or(&[][..], |deps| deps.as_slice());
            (node, dependencies)
        })
    }

    /// Get the direct dependencies of `node`, if it is registered.
    pub fn dependencies_of(&self, node: &DependencyNode<T>) -> Option<&[DependencyNode<T>]> {
        self.edges.get(&node.id()).map(|deps| deps.as_slice())
    }

    /// Check whether `node` is registered.
    pub fn contains(&self, node: &DependencyNode<T>) -> bool {
        self.nodes.contains_key(&node.id())
    }

    /// Get the number of registered nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// Nodes link to their dependencies by strong handle, so a cycle would keep
// itself alive forever. On drop, every registered node that neither the caller
// nor a caller-held node can still reach gets its dependency list cleared.
impl<T> Drop for DependencyGraph<T> {
    fn drop(&mut self) {
        // Handles owned by the graph itself: one in `nodes`, plus one per
        // appearance in the edge map or in a registered node's own list.
        let mut internal: HashMap<NodeId, usize> = self.nodes.keys().map(|id| (*id, 1)).collect();
        let own_lists = self.nodes.values().flat_map(DependencyNode::dependency_ids);
        let edge_lists = self.edges.values().flat_map(|deps| deps.iter().map(DependencyNode::id));
        for id in own_lists.chain(edge_lists) {
            if let Some(count) = internal.get_mut(&id) {
                *count += 1;
            }
        }

        let mut reachable = HashSet::new();
        let mut pending: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|node| node.handle_count() > internal[&node.id()])
            .map(DependencyNode::id)
            .collect();
        while let Some(id) = pending.pop() {
            if !reachable.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                pending.extend(
                    node.dependency_ids()
                        .into_iter()
                        .filter(|dep| self.nodes.contains_key(dep)),
                );
            }
        }

        self.edges.clear();
        let released: Vec<DependencyList<T>> = self
            .nodes
            .values()
            .filter(|node| !reachable.contains(&node.id()))
            .map(DependencyNode::take_dependencies)
            .collect();
        trace!(released = released.len(), kept = reachable.len(), "dropping dependency graph");
    }
}

impl<T> Default for DependencyGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn named(name: &'static str) -> DependencyNode<&'static str> {
        DependencyNode::with_name(name, name)
    }

    #[test]
    fn add_node_is_idempotent() {
        let mut graph = DependencyGraph::new();
        let a = named("A");

        graph.add_node(&a);
        graph.add_node(&a);

        assert_eq!(graph.len(), 1);
        assert!(graph.contains(&a));
    }

    #[test]
    fn add_node_registers_reachable_nodes_in_pre_order() {
        let a = named("A");
        let b = named("B");
        let c = named("C");
        let d = named("D");
        a.depends_on(&b);
        a.depends_on(&d);
        b.depends_on(&c);
        c.depends_on(&d);

        let mut graph = DependencyGraph::new();
        graph.add_node(&a);

        let order: Vec<_> = graph.nodes().map(|node| *node.element()).collect();
        assert_eq!(order, vec!["A", "B", "C", "D"]);
        assert_eq!(graph.dependencies_of(&a), Some(&[b.clone(), d.clone()][..]));
        assert_eq!(graph.dependencies_of(&d), Some(&[][..]));
    }

    #[test]
    fn add_dependency_registers_both_ends() {
        let mut graph = DependencyGraph::new();
        let a = named("A");
        let b = named("B");

        graph.add_dependency(&a, &b);

        assert_eq!(graph.len(), 2);
        assert!(a.has_dependency(&b));
        assert_eq!(graph.dependencies_of(&a), Some(&[b][..]));
    }

    #[test]
    fn duplicate_edges_are_ignored() {
        let mut graph = DependencyGraph::new();
        let a = named("A");
        let b = named("B");

        graph.add_dependency(&a, &b);
        graph.add_dependency(&a, &b);

        assert_eq!(graph.dependencies_of(&a).map(<[_]>::len), Some(1));
        assert_eq!(a.dependency_count(), 1);
    }

    #[test]
    fn add_dependency_picks_up_node_level_declarations() {
        let mut graph = DependencyGraph::new();
        let a = named("A");
        let b = named("B");
        let c = named("C");

        graph.add_node(&a);
        a.depends_on(&b);
        graph.add_dependency(&a, &c);

        assert!(graph.contains(&b));
        assert_eq!(graph.dependencies_of(&a), Some(&[b, c][..]));
    }

    #[test]
    fn roots_are_nodes_nothing_depends_on() {
        let mut graph = DependencyGraph::new();
        let a = named("A");
        let b = named("B");
        let c = named("C");
        let lone = named("lone");

        graph.add_dependency(&a, &b);
        graph.add_node(&lone);
        graph.add_dependency(&c, &b);

        assert_eq!(graph.find_root_nodes(), vec![a, lone, c]);
    }

    #[test]
    fn pure_cycle_has_no_roots() {
        let mut graph = DependencyGraph::new();
        let a = named("A");
        let b = named("B");

        graph.add_dependency(&a, &b);
        graph.add_dependency(&b, &a);

        assert!(graph.find_root_nodes().is_empty());
        assert_eq!(
            graph.resolve_nodes().unwrap_err(),
            CircularDependencyError::no_entry_point(2)
        );
    }

    #[test]
    fn cycle_behind_a_root_reports_back_edge() {
        let mut graph = DependencyGraph::new();
        let a = named("A");
        let b = named("B");
        let c = named("C");
        let d = named("D");

        graph.add_dependency(&a, &b);
        graph.add_dependency(&b, &c);
        graph.add_dependency(&c, &d);
        graph.add_dependency(&d, &b);

        let err = graph.resolve().unwrap_err();
        assert_eq!(err.node_name(), Some("D"));
        assert_eq!(err.dependency_name(), Some("B"));
    }

    #[test]
    fn resolve_is_repeatable() {
        let mut graph = DependencyGraph::new();
        let a = named("A");
        let b = named("B");
        let c = named("C");

        graph.add_dependency(&a, &b);
        graph.add_dependency(&c, &b);

        let first = graph.resolve().unwrap();
        let second = graph.resolve().unwrap();
        assert_eq!(first, vec!["B", "A", "C"]);
        assert_eq!(first, second);
    }

    #[test]
    fn resolve_from_follows_node_dependencies() {
        let a = named("A");
        let b = named("B");
        let c = named("C");
        a.depends_on(&b);
        b.depends_on(&c);

        let resolved = DependencyGraph::resolve_from(&a).unwrap();
        assert_eq!(resolved, vec![c, b, a]);
    }

    #[test]
    fn default_graph_is_empty() {
        let graph: DependencyGraph<u8> = DependencyGraph::default();
        assert!(graph.is_empty());
        assert_eq!(graph.dependencies().count(), 0);
        assert!(graph.resolve().unwrap().is_empty());
    }

    struct Tracked(Arc<AtomicUsize>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn dropping_graph_frees_rejected_cycle() {
        let drops = Arc::new(AtomicUsize::new(0));
        {
            let mut graph = DependencyGraph::new();
            let a = DependencyNode::new(Tracked(drops.clone()));
            let b = DependencyNode::new(Tracked(drops.clone()));

            graph.add_dependency(&a, &b);
            graph.add_dependency(&b, &a);

            assert!(graph.resolve_nodes().is_err());
        }
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_graph_frees_cycle_behind_a_root() {
        let drops = Arc::new(AtomicUsize::new(0));
        {
            let mut graph = DependencyGraph::new();
            let nodes: Vec<_> = (0..4)
                .map(|_| DependencyNode::new(Tracked(drops.clone())))
                .collect();

            graph.add_dependency(&nodes[0], &nodes[1]);
            graph.add_dependency(&nodes[1], &nodes[2]);
            graph.add_dependency(&nodes[2], &nodes[3]);
            graph.add_dependency(&nodes[3], &nodes[1]);

            assert!(graph.resolve_nodes().is_err());
        }
        assert_eq!(drops.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn dropping_graph_keeps_edges_of_held_nodes() {
        let a = named("A");
        let c;
        {
            let mut graph = DependencyGraph::new();
            let b = named("B");
            c = named("C");
            graph.add_dependency(&a, &b);
            graph.add_dependency(&b, &c);
        }

        let resolved = DependencyGraph::resolve_from(&a).unwrap();
        let order: Vec<_> = resolved.iter().map(|node| *node.element()).collect();
        assert_eq!(order, vec!["C", "B", "A"]);
        assert_eq!(c.dependency_count(), 0);
    }

    #[test]
    fn dropping_graph_keeps_cycle_the_caller_still_holds() {
        let a = named("A");
        {
            let mut graph = DependencyGraph::new();
            let b = named("B");
            graph.add_dependency(&a, &b);
            graph.add_dependency(&b, &a);
        }

        assert_eq!(a.dependency_count(), 1);
        let err = DependencyGraph::resolve_from(&a).unwrap_err();
        assert_eq!(err.node_name(), Some("B"));
        assert_eq!(err.dependency_name(), Some("A"));
    }
}

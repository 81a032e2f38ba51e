//! Error types for graph resolution
//!
//! Resolution has exactly one way to fail: the dependency relation contains
//! a cycle, so no total order exists. The two variants describe how the cycle
//! was found.

use thiserror::Error;

/// Placeholder printed for nodes without a diagnostic name.
pub(crate) const UNNAMED: &str = "<unnamed>";

/// Result type for graph resolution
pub type GraphResult<T> = Result<T, CircularDependencyError>;

/// A circular dependency prevented resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CircularDependencyError {
    /// A node depends on an ancestor in the current depth-first path.
    #[error(
        "Circular dependency detected: {} depends on {}",
        .node.as_deref().unwrap_or(UNNAMED),
        .dependency.as_deref().unwrap_or(UNNAMED)
    )]
    BackEdge {
        /// Name of the node declaring the dependency
        node: Option<String>,
        /// Name of the dependency that closes the cycle
        dependency: Option<String>,
    },

    /// Some nodes form a cycle that no root leads into, so the traversal
    /// never reached them.
    #[error("Circular dependency detected: {unresolved} node(s) are not reachable from any root")]
    NoEntryPoint {
        /// Number of registered nodes left unresolved
        unresolved: usize,
    },
}

impl CircularDependencyError {
    /// Creates a back-edge error from the two nodes' diagnostic names
    pub fn back_edge(node: Option<String>, dependency: Option<String>) -> Self {
        Self::BackEdge { node, dependency }
    }

    /// Creates an error for cycles without an entry point
    pub fn no_entry_point(unresolved: usize) -> Self {
        Self::NoEntryPoint { unresolved }
    }

    /// Name of the node that declared the offending dependency, if known.
    pub fn node_name(&self) -> Option<&str> {
        match self {
            Self::BackEdge { node, .. } => node.as_deref(),
            Self::NoEntryPoint { .. } => None,
        }
    }

    /// Name of the dependency that closed the cycle, if known.
    pub fn dependency_name(&self) -> Option<&str> {
        match self {
            Self::BackEdge { dependency, .. } => dependency.as_deref(),
            Self::NoEntryPoint { .. } => None,
        }
    }
}

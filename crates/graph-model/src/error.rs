//! Graph-model level errors: invariant violations and structural problems.

use crate::id::NodeId;
use std::sync::Arc;
use thiserror::Error;

/// The error recorded against a failed node.
///
/// Wraps the underlying [`crate::NodeFunctionError`] in an `Arc` so it can
/// be cloned into the result of every dependent a failure is propagated to,
/// and carries a human-readable summary independent of the source error's
/// own `Display` (useful once the source has been downcast and discarded).
#[derive(Debug, Clone)]
pub struct NodeError {
    pub summary: String,
    pub source: Arc<dyn std::error::Error + Send + Sync>,
}

impl NodeError {
    pub fn new(summary: impl Into<String>, source: crate::function::NodeFunctionError) -> Self {
        Self {
            summary: summary.into(),
            source: Arc::from(source),
        }
    }
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary)
    }
}

impl std::error::Error for NodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Errors raised while constructing or mutating [`crate::EngineContext`].
///
/// These should only ever fire on an internal bug — the scheduler is
/// expected to preserve the invariants this type guards.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node {0:?} referenced as a dependency does not exist in the graph")]
    MissingDependency(NodeId),

    #[error("node {0:?} appears in more than one of pending/active/succeeded/failed")]
    StateSetOverlap(NodeId),

    #[error("node {0:?} result does not conform to its declared result type")]
    ResultTypeMismatch(NodeId),

    #[error("node {0:?} transitioned out of a terminal state")]
    IllegalTransition(NodeId),
}

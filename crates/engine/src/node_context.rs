//! `NodeContext` adapter over a snapshot of completed results (spec §4.5).

use graph_model::{GraphError, NodeContext, NodeId, NodeValue, ResultKind};
use std::collections::HashMap;

/// A read-only snapshot handed to one node's function. Built fresh from
/// `EngineContext` before each evaluation rather than holding a live
/// reference, so a node function can never observe a state change made
/// while it runs (spec's copy-on-write discipline, applied at the
/// context-snapshot boundary).
pub struct EngineNodeContext {
    results: HashMap<NodeId, NodeValue>,
}

impl EngineNodeContext {
    pub fn new(results: HashMap<NodeId, NodeValue>) -> Self {
        Self { results }
    }
}

impl NodeContext for EngineNodeContext {
    fn lookup(&self, id: &NodeId) -> Result<NodeValue, GraphError> {
        let value = self
            .results
            .get(id)
            .cloned()
            .ok_or_else(|| GraphError::MissingDependency(id.clone()))?;
        if !value.conforms_to(id.result_type()) && *id.result_type() != ResultKind::Any {
            return Err(GraphError::ResultTypeMismatch(id.clone()));
        }
        Ok(value)
    }
}

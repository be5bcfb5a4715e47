//! Runtime execution state: `EngineNode` and `EngineContext`.

use crate::dependency::DependencyType;
use crate::error::{GraphError, NodeError};
use crate::function::NodeFunction;
use crate::id::NodeId;
use crate::node::Node;
use crate::value::NodeValue;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// The engine's wrapper around a single graph node: the immutable node plus
/// everything the scheduler mutates about it over the node's lifetime.
#[derive(Clone)]
pub struct EngineNode {
    pub node: Arc<Node>,
    /// Copy of the node's dependency map, taken at creation time so the
    /// scheduler never has to re-read the immutable node to check
    /// readiness.
    pub dependencies: HashMap<NodeId, DependencyType>,
    /// Bound by the function resolver before scheduling begins; `None`
    /// until then.
    pub function: Option<Arc<dyn NodeFunction>>,
    pub complete: bool,
    pub result: Option<NodeValue>,
    pub error: Option<NodeError>,
}

impl EngineNode {
    pub fn pending(node: Node) -> Self {
        let dependencies = node.dependencies.clone();
        Self {
            node: Arc::new(node),
            dependencies,
            function: None,
            complete: false,
            result: None,
            error: None,
        }
    }

    pub fn with_function(mut self, function: Arc<dyn NodeFunction>) -> Self {
        self.function = Some(function);
        self
    }

    /// Copy-on-write success update, matching the engine's "copy the node,
    /// mutate the copy, publish" pattern so every handler sees a consistent
    /// snapshot.
    pub fn succeed(&self, result: NodeValue) -> Self {
        let mut next = self.clone();
        next.complete = true;
        next.result = Some(result);
        next.error = None;
        next
    }

    pub fn fail(&self, error: NodeError) -> Self {
        let mut next = self.clone();
        next.complete = true;
        next.error = Some(error);
        next
    }
}

/// The scheduler's live state for one job: every node, partitioned into the
/// four disjoint state sets whose union is always `nodes.keys()`.
#[derive(Clone)]
pub struct EngineContext {
    pub nodes: HashMap<NodeId, EngineNode>,
    pub pending: HashSet<NodeId>,
    pub active: HashSet<NodeId>,
    pub succeeded: HashSet<NodeId>,
    pub failed: HashSet<NodeId>,
}

impl EngineContext {
    /// Build the initial context for a freshly built graph: every node
    /// starts `pending`, every referenced dependency must already be a key
    /// of `nodes` (spec invariant 1).
    pub fn new(nodes: HashMap<NodeId, EngineNode>) -> Result<Self, GraphError> {
        for node in nodes.values() {
            for dep in node.dependencies.keys() {
                if !nodes.contains_key(dep) {
                    return Err(GraphError::MissingDependency(dep.clone()));
                }
            }
        }
        let pending = nodes.keys().cloned().collect();
        let ctx = Self {
            nodes,
            pending,
            active: HashSet::new(),
            succeeded: HashSet::new(),
            failed: HashSet::new(),
        };
        ctx.check_invariants()?;
        Ok(ctx)
    }

    /// Assert the four state sets are disjoint and their union is exactly
    /// `nodes.keys()` (spec invariant 3). Called at every message boundary
    /// in debug builds; a violation is always an internal bug.
    pub fn check_invariants(&self) -> Result<(), GraphError> {
        let mut seen: HashSet<&NodeId> = HashSet::new();
        for set in [&self.pending, &self.active, &self.succeeded, &self.failed] {
            for id in set {
                if !seen.insert(id) {
                    return Err(GraphError::StateSetOverlap(id.clone()));
                }
            }
        }
        if seen.len() != self.nodes.len() {
            let missing = self.nodes.keys().find(|id| !seen.contains(id));
            if let Some(id) = missing {
                return Err(GraphError::StateSetOverlap(id.clone()));
            }
        }
        Ok(())
    }

    pub fn is_settled(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{NodeNamespace, ResultKind};
    use crate::node::NodeKind;

    fn leaf(name: &str, ns: &NodeNamespace) -> Node {
        Node::new(
            NodeId::new(name, ns.clone(), ResultKind::Scalar),
            HashMap::new(),
            NodeKind::Noop,
        )
    }

    #[test]
    fn fresh_context_is_all_pending() {
        let ns = NodeNamespace::root("job");
        let n = leaf("a", &ns);
        let id = n.id.clone();
        let mut nodes = HashMap::new();
        nodes.insert(id.clone(), EngineNode::pending(n));
        let ctx = EngineContext::new(nodes).unwrap();
        assert!(ctx.pending.contains(&id));
        assert!(ctx.active.is_empty());
        ctx.check_invariants().unwrap();
    }

    #[test]
    fn missing_dependency_is_rejected() {
        let ns = NodeNamespace::root("job");
        let missing = NodeId::new("ghost", ns.clone(), ResultKind::Scalar);
        let mut deps = HashMap::new();
        deps.insert(missing, DependencyType::HARD);
        let n = Node::new(NodeId::new("a", ns, ResultKind::Scalar), deps, NodeKind::Noop);
        let id = n.id.clone();
        let mut nodes = HashMap::new();
        nodes.insert(id, EngineNode::pending(n));
        assert!(matches!(EngineContext::new(nodes), Err(GraphError::MissingDependency(_))));
    }
}

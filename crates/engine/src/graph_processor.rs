//! The scheduling core (spec §4.4): computes viable nodes, dispatches them
//! concurrently, propagates failures transitively, and reports the job's
//! final outcome.

use crate::error::EngineError;
use crate::node_context::EngineNodeContext;
use graph_model::{
    DependencyType, EngineContext, EngineNode, GraphError, GraphUpdateSink, Node, NodeError,
    NodeId, NodeValue,
};
use parking_lot::Mutex;
use resolver::FunctionResolver;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Collects graph updates a node function requests mid-evaluation (the
/// dynamic-update callback `RunModel` is allowed to use), merged into the
/// owning context once the node's own result is committed.
#[derive(Default)]
struct UpdateCollector {
    nodes: Mutex<Vec<Node>>,
    deps: Mutex<Vec<(NodeId, NodeId, DependencyType)>>,
}

impl GraphUpdateSink for UpdateCollector {
    fn add_node(&self, node: Node) {
        self.nodes.lock().push(node);
    }

    fn add_dependency(&self, dependent: NodeId, dependency: NodeId, kind: DependencyType) {
        self.deps.lock().push((dependent, dependency, kind));
    }
}

enum Outcome {
    Succeeded { id: NodeId, result: NodeValue, updates: UpdateCollector },
    Failed { id: NodeId, error: NodeError },
}

/// One job's scheduling loop over a fixed `EngineContext`. Holds the
/// `FunctionResolver` only to bind functions to nodes a `RunModel` node
/// injects dynamically; every statically-built node already carries its
/// bound function when the context is constructed.
pub struct GraphProcessor {
    ctx: EngineContext,
    resolver: Arc<FunctionResolver>,
}

impl GraphProcessor {
    pub fn new(ctx: EngineContext, resolver: Arc<FunctionResolver>) -> Self {
        Self { ctx, resolver }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Run every round of spec §4.4 steps 1-5 until no node is viable, then
    /// report completion. `Ok(())` is success; `Err` distinguishes
    /// aggregated node failure from deadlock.
    pub async fn run(&mut self) -> Result<(), EngineError> {
        loop {
            self.propagate_upstream_failures();

            let viable = self.viable_nodes();
            if viable.is_empty() {
                break;
            }

            for id in &viable {
                self.ctx.pending.remove(id);
                self.ctx.active.insert(id.clone());
            }

            let snapshot = self.snapshot();
            let mut set = tokio::task::JoinSet::new();
            for id in viable {
                let node = self.ctx.nodes.get(&id).expect("viable node exists").clone();
                let ctx = snapshot.clone();
                set.spawn(async move { evaluate(node, ctx).await });
            }
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(outcome) => self.commit(outcome).await,
                    Err(join_err) => error!(error = %join_err, "node evaluation task panicked"),
                }
            }

            self.ctx.check_invariants().map_err(EngineError::from)?;
        }

        self.report()
    }

    /// Step 2: nodes in `pending` with an unsatisfiable non-tolerant
    /// dependency move straight to `failed`, repeated until a round makes
    /// no further progress (errors propagate transitively without ever
    /// being executed, spec §4.4 step 4).
    fn propagate_upstream_failures(&mut self) {
        loop {
            let newly_failed: Vec<NodeId> = self
                .ctx
                .pending
                .iter()
                .filter(|id| {
                    let node = &self.ctx.nodes[*id];
                    node.dependencies
                        .iter()
                        .any(|(dep, kind)| !kind.tolerant && self.ctx.failed.contains(dep))
                })
                .cloned()
                .collect();
            if newly_failed.is_empty() {
                return;
            }
            for id in newly_failed {
                let node = self.ctx.nodes.get(&id).expect("pending node exists");
                let failed = node.fail(NodeError::new(
                    format!("node {id:?} skipped: a non-tolerant dependency failed"),
                    Box::new(GraphError::MissingDependency(id.clone())),
                ));
                self.ctx.nodes.insert(id.clone(), failed);
                self.ctx.pending.remove(&id);
                self.ctx.failed.insert(id);
            }
        }
    }

    /// Step 1: `pending` nodes whose every dependency is either succeeded,
    /// or failed-and-tolerated.
    fn viable_nodes(&self) -> Vec<NodeId> {
        self.ctx
            .pending
            .iter()
            .filter(|id| {
                let node = &self.ctx.nodes[*id];
                node.dependencies.iter().all(|(dep, kind)| {
                    self.ctx.succeeded.contains(dep) || (kind.tolerant && self.ctx.failed.contains(dep))
                })
            })
            .cloned()
            .collect()
    }

    fn snapshot(&self) -> Arc<EngineNodeContext> {
        let results: HashMap<NodeId, NodeValue> = self
            .ctx
            .nodes
            .iter()
            .filter_map(|(id, node)| node.result.clone().map(|r| (id.clone(), r)))
            .collect();
        Arc::new(EngineNodeContext::new(results))
    }

    async fn commit(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Succeeded { id, result, updates } => {
                let node = self.ctx.nodes.get(&id).expect("scheduled node exists").succeed(result);
                self.ctx.nodes.insert(id.clone(), node);
                self.ctx.active.remove(&id);
                self.ctx.succeeded.insert(id);
                self.merge_updates(updates).await;
            }
            Outcome::Failed { id, error } => {
                let node = self.ctx.nodes.get(&id).expect("scheduled node exists").fail(error);
                self.ctx.nodes.insert(id.clone(), node);
                self.ctx.active.remove(&id);
                self.ctx.failed.insert(id);
            }
        }
    }

    async fn merge_updates(&mut self, updates: UpdateCollector) {
        for node in updates.nodes.into_inner() {
            let id = node.id.clone();
            match self.resolver.resolve(&node).await {
                Ok(function) => {
                    self.ctx.nodes.insert(id.clone(), EngineNode::pending(node).with_function(function));
                    self.ctx.pending.insert(id);
                }
                Err(err) => error!(node = %id, error = %err, "dynamically injected node could not be resolved"),
            }
        }
        for (dependent, dependency, kind) in updates.deps.into_inner() {
            if let Some(existing) = self.ctx.nodes.get(&dependent).cloned() {
                let mut updated = existing;
                updated.dependencies.insert(dependency, kind);
                self.ctx.nodes.insert(dependent, updated);
            }
        }
    }

    /// Completion logic (spec §4.4): success iff nothing is pending and
    /// nothing failed; otherwise aggregated failure if anything failed,
    /// else deadlock (pending nodes left with nothing left viable).
    fn report(&self) -> Result<(), EngineError> {
        if self.ctx.pending.is_empty() && self.ctx.failed.is_empty() {
            Ok(())
        } else if !self.ctx.failed.is_empty() {
            Err(EngineError::JobFailed(self.ctx.failed.len()))
        } else {
            Err(EngineError::Deadlock(self.ctx.pending.len()))
        }
    }
}

async fn evaluate(node: EngineNode, ctx: Arc<EngineNodeContext>) -> Outcome {
    let id = node.node.id.clone();
    let function = node.function.clone().expect("function bound before scheduling");
    let updates = UpdateCollector::default();
    match function.call(ctx.as_ref(), &updates).await {
        Ok(value) => {
            if value.conforms_to(id.result_type()) {
                debug!(node = %id, kind = node.node.kind.label(), "DONE");
                Outcome::Succeeded { id, result: value, updates }
            } else {
                warn!(node = %id, kind = node.node.kind.label(), "FAILED: result does not conform to declared type");
                Outcome::Failed {
                    error: NodeError::new(
                        format!("node {id:?} produced a non-conforming result"),
                        Box::new(GraphError::ResultTypeMismatch(id.clone())),
                    ),
                    id,
                }
            }
        }
        Err(err) => {
            warn!(node = %id, kind = node.node.kind.label(), error = %err, "FAILED");
            Outcome::Failed { error: NodeError::new(format!("node {id:?} failed"), err), id }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_model::{DependencyType as Dep, NodeKind, NodeNamespace, ResultKind};
    use resolver::test_support::{InMemoryStorage, StubModelLoader};
    use std::collections::HashMap as Map;

    fn ns() -> NodeNamespace {
        NodeNamespace::root("job")
    }

    async fn resolved_ctx(nodes: Vec<Node>) -> (EngineContext, Arc<FunctionResolver>) {
        let resolver =
            Arc::new(FunctionResolver::new(Arc::new(InMemoryStorage::new()), Arc::new(StubModelLoader::new())));
        let mut engine_nodes = Map::new();
        for node in nodes {
            let id = node.id.clone();
            let function = resolver.resolve(&node).await.unwrap();
            engine_nodes.insert(id, EngineNode::pending(node).with_function(function));
        }
        (EngineContext::new(engine_nodes).unwrap(), resolver)
    }

    #[tokio::test]
    async fn a_diamond_graph_runs_to_completion() {
        let ns = ns();
        let a = Node::new(
            NodeId::new("a", ns.clone(), ResultKind::Scalar),
            Map::new(),
            NodeKind::StaticValue { value: NodeValue::Scalar(serde_json::json!(1)) },
        );
        let b = Node::new(
            NodeId::new("b", ns.clone(), ResultKind::Scalar),
            [(a.id.clone(), Dep::HARD)].into_iter().collect(),
            NodeKind::Identity { source: a.id.clone() },
        );
        let (ctx, resolver) = resolved_ctx(vec![a, b]).await;
        let mut processor = GraphProcessor::new(ctx, resolver);
        processor.run().await.unwrap();
        assert_eq!(processor.context().succeeded.len(), 2);
        assert!(processor.context().failed.is_empty());
    }

    #[tokio::test]
    async fn hard_dependency_on_a_failed_node_skips_without_executing() {
        let ns = ns();
        let missing_spec = NodeId::new("missing", ns.clone(), ResultKind::Scalar);
        let a = Node::new(
            NodeId::new("a", ns.clone(), ResultKind::Any),
            [(missing_spec.clone(), Dep::HARD)].into_iter().collect(),
            NodeKind::LoadData { data_spec: missing_spec.clone() },
        );
        let b = Node::new(
            NodeId::new("b", ns.clone(), ResultKind::Any),
            [(a.id.clone(), Dep::HARD)].into_iter().collect(),
            NodeKind::Identity { source: a.id.clone() },
        );
        // `missing_spec` is never inserted as a node; `a`'s evaluation
        // itself fails (its own `ctx.lookup` call errors), and `b` is
        // skipped without executing because its HARD dependency failed.
        let spec_node = Node::new(missing_spec.clone(), Map::new(), NodeKind::Noop);
        let (ctx, resolver) = resolved_ctx(vec![spec_node, a, b]).await;
        let mut processor = GraphProcessor::new(ctx, resolver);
        let outcome = processor.run().await;
        assert!(outcome.is_err());
        assert_eq!(processor.context().failed.len(), 2);
    }

    #[tokio::test]
    async fn a_cycle_deadlocks_instead_of_hanging() {
        let ns = ns();
        let a_id = NodeId::new("a", ns.clone(), ResultKind::Any);
        let b_id = NodeId::new("b", ns.clone(), ResultKind::Any);
        let a = Node::new(
            a_id.clone(),
            [(b_id.clone(), Dep::HARD)].into_iter().collect(),
            NodeKind::Identity { source: b_id.clone() },
        );
        let b = Node::new(
            b_id.clone(),
            [(a_id.clone(), Dep::HARD)].into_iter().collect(),
            NodeKind::Identity { source: a_id.clone() },
        );
        let (ctx, resolver) = resolved_ctx(vec![a, b]).await;
        let mut processor = GraphProcessor::new(ctx, resolver);
        let outcome = processor.run().await;
        assert!(matches!(outcome, Err(EngineError::Deadlock(2))));
    }
}

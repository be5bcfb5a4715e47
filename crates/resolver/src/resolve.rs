//! Binds a [`Node`] to an executable [`NodeFunction`] (spec §4.2).

use crate::functions::*;
use crate::traits::{ModelLoader, Storage};
use crate::ResolveError;
use graph_model::{Node, NodeFunction, NodeKind};
use std::sync::Arc;

/// Table lookup on `NodeKind`, closing external-resource kinds over the
/// storage/model-loader collaborators given at construction.
pub struct FunctionResolver {
    storage: Arc<dyn Storage>,
    model_loader: Arc<dyn ModelLoader>,
}

impl FunctionResolver {
    pub fn new(storage: Arc<dyn Storage>, model_loader: Arc<dyn ModelLoader>) -> Self {
        Self { storage, model_loader }
    }

    /// Resolve one node into its executable body. `RunModel` eagerly
    /// verifies the model loads and matches `model_def`'s declared shape
    /// before the node is ever scheduled, so a broken model import fails
    /// the job before any work is wasted evaluating other nodes.
    pub async fn resolve(&self, node: &Node) -> Result<Arc<dyn NodeFunction>, ResolveError> {
        let function: Arc<dyn NodeFunction> = match &node.kind {
            NodeKind::Noop => Arc::new(NoopFunction),

            NodeKind::StaticValue { value } => {
                Arc::new(StaticValueFunction { value: value.clone() })
            }

            NodeKind::Identity { source } => Arc::new(IdentityFunction { source: source.clone() }),

            NodeKind::KeyedItem { source, key } => Arc::new(KeyedItemFunction {
                source: source.clone(),
                key: key.clone(),
            }),

            NodeKind::ContextPush { mapping, .. } => {
                Arc::new(ContextPushFunction { mapping: mapping.clone() })
            }

            NodeKind::ContextPop { mapping, .. } => {
                Arc::new(ContextPopFunction { mapping: mapping.clone() })
            }

            NodeKind::BundleItem { parent, key } => Arc::new(BundleItemFunction {
                parent: parent.clone(),
                key: key.clone(),
            }),

            NodeKind::DataView { root_item, .. } => {
                Arc::new(DataViewFunction { root_item: root_item.clone() })
            }

            NodeKind::DataItem { data_view } => {
                Arc::new(DataItemFunction { data_view: data_view.clone() })
            }

            NodeKind::LoadData { data_spec } => Arc::new(LoadDataFunction {
                data_spec: data_spec.clone(),
                storage: self.storage.clone(),
            }),

            NodeKind::SaveData { data_spec, item } => Arc::new(SaveDataFunction {
                data_spec: data_spec.clone(),
                item: item.clone(),
                storage: self.storage.clone(),
            }),

            NodeKind::DynamicDataSpec { data_view, storage_key } => Arc::new(DynamicDataSpecFunction {
                data_view: data_view.clone(),
                storage_key: storage_key.clone(),
                storage: self.storage.clone(),
            }),

            NodeKind::ImportModel { model_scope, import } => Arc::new(ImportModelFunction {
                model_scope: model_scope.clone(),
                import: import.clone(),
                loader: self.model_loader.clone(),
            }),

            NodeKind::RunModel { model_def, model_scope, parameters, inputs, job_result } => {
                self.model_loader.load_model_class(model_scope, model_def).await?;
                Arc::new(RunModelFunction {
                    self_id: node.id.clone(),
                    model_def: model_def.clone(),
                    model_scope: model_scope.clone(),
                    parameters: parameters.clone(),
                    inputs: inputs.clone(),
                    job_result: job_result.clone(),
                    loader: self.model_loader.clone(),
                })
            }

            NodeKind::BuildJobResult { job_id, results } => Arc::new(BuildJobResultFunction {
                job_id: job_id.clone(),
                results: results.clone(),
            }),

            NodeKind::SaveJobResult { job_result, sink } => Arc::new(SaveJobResultFunction {
                job_result: job_result.clone(),
                sink: sink.clone(),
                storage: self.storage.clone(),
            }),
        };
        Ok(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{InMemoryStorage, StubModelLoader};
    use graph_model::{NodeId, NodeNamespace, NodeValue, ResultKind};
    use std::collections::HashMap;

    fn resolver() -> FunctionResolver {
        FunctionResolver::new(Arc::new(InMemoryStorage::new()), Arc::new(StubModelLoader::new()))
    }

    #[tokio::test]
    async fn static_value_round_trips() {
        let ns = NodeNamespace::root("job");
        let id = NodeId::new("x", ns, ResultKind::Scalar);
        let node = Node::new(
            id,
            HashMap::new(),
            NodeKind::StaticValue { value: NodeValue::Scalar(serde_json::json!(42)) },
        );
        let function = resolver().resolve(&node).await.unwrap();
        struct EmptyCtx;
        impl graph_model::NodeContext for EmptyCtx {
            fn lookup(&self, id: &NodeId) -> Result<NodeValue, graph_model::GraphError> {
                Err(graph_model::GraphError::MissingDependency(id.clone()))
            }
        }
        struct NoopSink;
        impl graph_model::GraphUpdateSink for NoopSink {
            fn add_node(&self, _node: Node) {}
            fn add_dependency(&self, _dependent: NodeId, _dependency: NodeId, _kind: graph_model::DependencyType) {}
        }
        let value = function.call(&EmptyCtx, &NoopSink).await.unwrap();
        assert_eq!(value, NodeValue::Scalar(serde_json::json!(42)));
    }
}

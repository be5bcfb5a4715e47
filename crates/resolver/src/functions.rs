//! One `NodeFunction` implementation per row of the closed node-kind table.
//!
//! Grounded directly on the source runtime's `_exec/functions.py`: `NoopFunc`,
//! `StaticValueFunc`, `IdentityFunc`, `KeyedItemFunc`,
//! `ContextPushFunc`/`ContextPopFunc` and `BuildJobResultFunc` carry over
//! almost unchanged; `DataViewFunc`/`DataItemFunc`/`LoadDataFunc`/
//! `SaveDataFunc`/`DynamicDataSpecFunc`/`ImportModelFunc`/`RunModelFunc`/
//! `BundleItemFunc`/`SaveJobResultFunc` are new, closing over `Storage`/
//! `ModelLoader` where the node kind needs external resources.

use crate::traits::{ModelLoader, Storage};
use async_trait::async_trait;
use graph_model::{
    bundle_child_name, DependencyType, GraphError, GraphUpdateSink, ImportDetails, ModelDef, Node,
    NodeContext, NodeFunction, NodeFunctionError, NodeId, NodeKind, NodeValue, ResultFormat,
    ResultKind, ResultSink,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

fn missing(id: &NodeId) -> NodeFunctionError {
    Box::new(GraphError::MissingDependency(id.clone()))
}

pub struct NoopFunction;

#[async_trait]
impl NodeFunction for NoopFunction {
    async fn call(
        &self,
        _ctx: &dyn NodeContext,
        _updates: &dyn GraphUpdateSink,
    ) -> Result<NodeValue, NodeFunctionError> {
        Ok(NodeValue::Unit)
    }
}

pub struct StaticValueFunction {
    pub value: NodeValue,
}

#[async_trait]
impl NodeFunction for StaticValueFunction {
    async fn call(
        &self,
        _ctx: &dyn NodeContext,
        _updates: &dyn GraphUpdateSink,
    ) -> Result<NodeValue, NodeFunctionError> {
        Ok(self.value.clone())
    }
}

pub struct IdentityFunction {
    pub source: NodeId,
}

#[async_trait]
impl NodeFunction for IdentityFunction {
    async fn call(
        &self,
        ctx: &dyn NodeContext,
        _updates: &dyn GraphUpdateSink,
    ) -> Result<NodeValue, NodeFunctionError> {
        Ok(ctx.lookup(&self.source)?)
    }
}

pub struct KeyedItemFunction {
    pub source: NodeId,
    pub key: String,
}

#[async_trait]
impl NodeFunction for KeyedItemFunction {
    async fn call(
        &self,
        ctx: &dyn NodeContext,
        _updates: &dyn GraphUpdateSink,
    ) -> Result<NodeValue, NodeFunctionError> {
        let source = ctx.lookup(&self.source)?;
        source
            .get(&self.key)
            .cloned()
            .ok_or_else(|| missing(&self.source))
    }
}

/// Mapping is bundle-entry-name -> outer id.
pub struct ContextPushFunction {
    pub mapping: HashMap<String, NodeId>,
}

#[async_trait]
impl NodeFunction for ContextPushFunction {
    async fn call(
        &self,
        ctx: &dyn NodeContext,
        _updates: &dyn GraphUpdateSink,
    ) -> Result<NodeValue, NodeFunctionError> {
        let mut entries = HashMap::with_capacity(self.mapping.len());
        for (name, outer_id) in &self.mapping {
            entries.insert(bundle_child_name(name), ctx.lookup(outer_id)?);
        }
        Ok(NodeValue::Bundle(entries))
    }
}

/// Mapping is published (already-dotted) bundle-entry name -> inner id.
pub struct ContextPopFunction {
    pub mapping: HashMap<String, NodeId>,
}

#[async_trait]
impl NodeFunction for ContextPopFunction {
    async fn call(
        &self,
        ctx: &dyn NodeContext,
        _updates: &dyn GraphUpdateSink,
    ) -> Result<NodeValue, NodeFunctionError> {
        let mut entries = HashMap::with_capacity(self.mapping.len());
        for (published_name, inner_id) in &self.mapping {
            entries.insert(published_name.clone(), ctx.lookup(inner_id)?);
        }
        Ok(NodeValue::Bundle(entries))
    }
}

/// A placeholder body for a bundle's virtual children: never actually
/// scheduled (spec invariant 6 — these are moved straight to `succeeded` by
/// result propagation), provided only so the function table is total.
pub struct BundleItemFunction {
    pub parent: NodeId,
    pub key: String,
}

#[async_trait]
impl NodeFunction for BundleItemFunction {
    async fn call(
        &self,
        ctx: &dyn NodeContext,
        _updates: &dyn GraphUpdateSink,
    ) -> Result<NodeValue, NodeFunctionError> {
        let parent = ctx.lookup(&self.parent)?;
        parent
            .get(&self.key)
            .cloned()
            .ok_or_else(|| missing(&self.parent))
    }
}

pub struct DataViewFunction {
    pub root_item: NodeId,
}

#[async_trait]
impl NodeFunction for DataViewFunction {
    async fn call(
        &self,
        ctx: &dyn NodeContext,
        _updates: &dyn GraphUpdateSink,
    ) -> Result<NodeValue, NodeFunctionError> {
        let root = ctx.lookup(&self.root_item)?;
        let mut view = HashMap::new();
        view.insert("delta_0".to_string(), root);
        Ok(NodeValue::Map(view))
    }
}

pub struct DataItemFunction {
    pub data_view: NodeId,
}

#[async_trait]
impl NodeFunction for DataItemFunction {
    async fn call(
        &self,
        ctx: &dyn NodeContext,
        _updates: &dyn GraphUpdateSink,
    ) -> Result<NodeValue, NodeFunctionError> {
        let view = ctx.lookup(&self.data_view)?;
        view.get("delta_0").cloned().ok_or_else(|| missing(&self.data_view))
    }
}

pub struct LoadDataFunction {
    pub data_spec: NodeId,
    pub storage: Arc<dyn Storage>,
}

#[async_trait]
impl NodeFunction for LoadDataFunction {
    async fn call(
        &self,
        ctx: &dyn NodeContext,
        _updates: &dyn GraphUpdateSink,
    ) -> Result<NodeValue, NodeFunctionError> {
        let spec = ctx.lookup(&self.data_spec)?;
        let (storage_key, path) = decode_spec(&spec)?;
        Ok(self.storage.read_table(&storage_key, &path).await?)
    }
}

pub struct SaveDataFunction {
    pub data_spec: NodeId,
    pub item: NodeId,
    pub storage: Arc<dyn Storage>,
}

#[async_trait]
impl NodeFunction for SaveDataFunction {
    async fn call(
        &self,
        ctx: &dyn NodeContext,
        _updates: &dyn GraphUpdateSink,
    ) -> Result<NodeValue, NodeFunctionError> {
        let spec = ctx.lookup(&self.data_spec)?;
        let item = ctx.lookup(&self.item)?;
        let (storage_key, path) = decode_spec(&spec)?;
        self.storage.write_table(&storage_key, &path, &item).await?;
        let mut result = HashMap::new();
        result.insert("storage_key".to_string(), NodeValue::Scalar(serde_json::json!(storage_key)));
        result.insert("path".to_string(), NodeValue::Scalar(serde_json::json!(path)));
        Ok(NodeValue::Map(result))
    }
}

pub struct DynamicDataSpecFunction {
    pub data_view: NodeId,
    pub storage_key: String,
    pub storage: Arc<dyn Storage>,
}

#[async_trait]
impl NodeFunction for DynamicDataSpecFunction {
    async fn call(
        &self,
        ctx: &dyn NodeContext,
        _updates: &dyn GraphUpdateSink,
    ) -> Result<NodeValue, NodeFunctionError> {
        let _ = ctx.lookup(&self.data_view)?;
        let format = self.storage.default_storage_format();
        let path = format!("{}/{}.{}", self.storage_key, self.data_view.name(), format.0);
        Ok(NodeValue::Scalar(
            serde_json::json!({ "storage_key": self.storage_key, "path": path }),
        ))
    }
}

pub struct ImportModelFunction {
    pub model_scope: String,
    pub import: ImportDetails,
    pub loader: Arc<dyn ModelLoader>,
}

#[async_trait]
impl NodeFunction for ImportModelFunction {
    async fn call(
        &self,
        _ctx: &dyn NodeContext,
        _updates: &dyn GraphUpdateSink,
    ) -> Result<NodeValue, NodeFunctionError> {
        let model_def = self.loader.scan_model(&self.model_scope, &self.import).await?;
        Ok(NodeValue::Map(model_def_to_value(&model_def)))
    }
}

fn model_def_to_value(model_def: &ModelDef) -> HashMap<String, NodeValue> {
    let mut out = HashMap::new();
    out.insert("model_id".to_string(), NodeValue::Scalar(serde_json::json!(model_def.model_id)));
    out.insert(
        "parameters".to_string(),
        NodeValue::List(
            model_def.parameters.iter().map(|p| NodeValue::Scalar(serde_json::json!(p))).collect(),
        ),
    );
    out.insert(
        "inputs".to_string(),
        NodeValue::List(
            model_def.inputs.iter().map(|p| NodeValue::Scalar(serde_json::json!(p))).collect(),
        ),
    );
    out.insert(
        "outputs".to_string(),
        NodeValue::List(
            model_def
                .outputs
                .iter()
                .map(|(name, required)| NodeValue::Scalar(serde_json::json!({ "name": name, "required": required })))
                .collect(),
        ),
    );
    out
}

/// Runs the model and registers any runtime-discovered outputs beyond the
/// statically declared set via `updates` (spec §4.4's dynamic graph update;
/// `RunModel` is the one node kind the source runtime allows to do this).
///
/// Grounded on `RunModelFunc._execute`: an output name the model reports
/// that isn't in `model_def.outputs` gets a fresh `KeyedItem` node reading
/// it out of this node's own bundle, plus a new dependency from the job's
/// `BuildJobResult` node onto it, mirroring `send_graph_updates`'s
/// `new_deps[ctx_id] = [Dependency(nid, HARD) for nid in ...]`.
pub struct RunModelFunction {
    pub self_id: NodeId,
    pub model_def: ModelDef,
    pub model_scope: String,
    pub parameters: Vec<NodeId>,
    pub inputs: Vec<NodeId>,
    pub job_result: NodeId,
    pub loader: Arc<dyn ModelLoader>,
}

#[async_trait]
impl NodeFunction for RunModelFunction {
    async fn call(
        &self,
        ctx: &dyn NodeContext,
        updates: &dyn GraphUpdateSink,
    ) -> Result<NodeValue, NodeFunctionError> {
        let mut parameters = HashMap::with_capacity(self.parameters.len());
        for id in &self.parameters {
            parameters.insert(id.name().to_string(), ctx.lookup(id)?);
        }
        let mut inputs = HashMap::with_capacity(self.inputs.len());
        for id in &self.inputs {
            inputs.insert(id.name().to_string(), ctx.lookup(id)?);
        }

        let model = self.loader.load_model_class(&self.model_scope, &self.model_def).await?;
        let outputs = model.run_model(&parameters, &inputs).await?;

        let declared: HashSet<&str> =
            self.model_def.outputs.iter().map(|(name, _)| name.as_str()).collect();
        let mut bundle = HashMap::with_capacity(outputs.len());
        for (name, value) in outputs {
            if !declared.contains(name.as_str()) {
                let dynamic_id = self.self_id.sibling(name.clone(), ResultKind::Any);
                updates.add_node(Node::new(
                    dynamic_id.clone(),
                    [(self.self_id.clone(), DependencyType::HARD)].into_iter().collect(),
                    NodeKind::KeyedItem { source: self.self_id.clone(), key: name.clone() },
                ));
                updates.add_dependency(self.job_result.clone(), dynamic_id, DependencyType::HARD);
            }
            bundle.insert(name, value);
        }
        Ok(NodeValue::Bundle(bundle))
    }
}

pub struct BuildJobResultFunction {
    pub job_id: String,
    pub results: Vec<(String, NodeId, bool)>,
}

#[async_trait]
impl NodeFunction for BuildJobResultFunction {
    async fn call(
        &self,
        ctx: &dyn NodeContext,
        _updates: &dyn GraphUpdateSink,
    ) -> Result<NodeValue, NodeFunctionError> {
        let mut objects = HashMap::with_capacity(self.results.len());
        for (name, id, required) in &self.results {
            match ctx.lookup(id) {
                Ok(value) => {
                    objects.insert(name.clone(), value);
                }
                Err(_) if !required => {}
                Err(err) => return Err(Box::new(err)),
            }
        }
        let mut result = HashMap::new();
        result.insert("job_id".to_string(), NodeValue::Scalar(serde_json::json!(self.job_id)));
        result.insert("status_code".to_string(), NodeValue::Scalar(serde_json::json!("SUCCEEDED")));
        result.insert("objects".to_string(), NodeValue::Map(objects));
        Ok(NodeValue::Map(result))
    }
}

pub struct SaveJobResultFunction {
    pub job_result: NodeId,
    pub sink: ResultSink,
    pub storage: Arc<dyn Storage>,
}

#[async_trait]
impl NodeFunction for SaveJobResultFunction {
    async fn call(
        &self,
        ctx: &dyn NodeContext,
        _updates: &dyn GraphUpdateSink,
    ) -> Result<NodeValue, NodeFunctionError> {
        let result = ctx.lookup(&self.job_result)?;
        let as_json = node_value_to_json(&result);
        let encoded = match self.sink.format {
            ResultFormat::Json => serde_json::to_vec_pretty(&as_json)
                .map_err(|e| Box::new(e) as NodeFunctionError)?,
            ResultFormat::Yaml => serde_yaml::to_string(&as_json)
                .map_err(|e| Box::new(e) as NodeFunctionError)?
                .into_bytes(),
        };
        let path = format!("{}/job_result", self.sink.directory);
        self.storage.write_bytes(self.storage.default_storage_key(), &path, &encoded).await?;
        Ok(NodeValue::Unit)
    }
}

fn node_value_to_json(value: &NodeValue) -> serde_json::Value {
    match value {
        NodeValue::Scalar(v) => v.clone(),
        NodeValue::List(items) => serde_json::Value::Array(items.iter().map(node_value_to_json).collect()),
        NodeValue::Map(entries) | NodeValue::Bundle(entries) => serde_json::Value::Object(
            entries.iter().map(|(k, v)| (k.clone(), node_value_to_json(v))).collect(),
        ),
        NodeValue::Unit => serde_json::Value::Null,
    }
}

/// Data specs are produced as a `NodeValue::Scalar` holding a small JSON
/// object (`{"storage_key": ..., "path": ...}`), matching how
/// `graph-builder` builds them from `StaticValue`/`DynamicDataSpec` nodes.
fn decode_spec(spec: &NodeValue) -> Result<(String, String), NodeFunctionError> {
    let json = match spec {
        NodeValue::Scalar(v) => v,
        _ => return Err("data spec is not a scalar JSON object".into()),
    };
    let storage_key = json
        .get("storage_key")
        .and_then(|v| v.as_str())
        .ok_or_else(|| -> NodeFunctionError { "data spec missing storage_key".into() })?
        .to_string();
    let path = json
        .get("path")
        .and_then(|v| v.as_str())
        .ok_or_else(|| -> NodeFunctionError { "data spec missing path".into() })?
        .to_string();
    Ok((storage_key, path))
}

//! Node payloads: the closed set of node kinds a graph can contain.

use crate::dependency::DependencyType;
use crate::id::{NodeId, NodeNamespace};
use crate::value::NodeValue;
use std::collections::HashMap;

/// Minimal description of a dataset's columnar shape, enough for the
/// conformance checks this core performs; the encoders and full schema
/// language live outside the core (spec §1 non-goals).
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub fields: Vec<(String, String)>,
}

/// A model's declared parameters/inputs/outputs, as produced by
/// `ModelLoader::scan_model`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelDef {
    pub model_id: String,
    pub parameters: Vec<String>,
    pub inputs: Vec<String>,
    /// output name -> required
    pub outputs: Vec<(String, bool)>,
}

/// Details needed to check out and load a model for import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDetails {
    pub repository: String,
    pub version: String,
    pub entry_point: String,
}

/// Where a `SaveJobResult` node writes the final job-result document.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSink {
    pub format: ResultFormat,
    pub directory: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    Yaml,
    Json,
}

/// Marker present on a node whose result is a mapping that must also be
/// exposed as virtual sibling nodes (spec §3's bundle-result nodes).
#[derive(Debug, Clone)]
pub struct BundleMarker {
    pub namespace: NodeNamespace,
    /// Declared child names that must appear as keys of the node's result.
    pub children: Vec<String>,
}

/// The internal bundle-entry key a `ContextPush` mapping entry's name maps
/// to, shared between `graph-builder` (which declares the `BundleMarker`)
/// and `resolver` (whose `ContextPush`/`ContextPop` node functions must
/// produce a `NodeValue::Bundle` with exactly these keys).
pub fn bundle_child_name(name: &str) -> String {
    format!("__bundle__{name}")
}

/// The closed set of node kinds. One variant per row of the spec's node-kind
/// table; each variant carries exactly the payload that table names.
#[derive(Debug, Clone)]
pub enum NodeKind {
    StaticValue {
        value: NodeValue,
    },
    Identity {
        source: NodeId,
    },
    KeyedItem {
        source: NodeId,
        key: String,
    },
    /// Mapping is outer id -> inner id: for every mapped name the builder
    /// also emits an `Identity` marker inside the new context.
    ContextPush {
        namespace: NodeNamespace,
        mapping: HashMap<String, NodeId>,
    },
    /// Mapping is inner id -> outer id.
    ContextPop {
        namespace: NodeNamespace,
        mapping: HashMap<String, NodeId>,
    },
    DataView {
        schema: Schema,
        root_item: NodeId,
    },
    DataItem {
        data_view: NodeId,
    },
    LoadData {
        data_spec: NodeId,
    },
    SaveData {
        data_spec: NodeId,
        item: NodeId,
    },
    DynamicDataSpec {
        data_view: NodeId,
        storage_key: String,
    },
    ImportModel {
        model_scope: String,
        import: ImportDetails,
    },
    RunModel {
        model_def: ModelDef,
        model_scope: String,
        parameters: Vec<NodeId>,
        inputs: Vec<NodeId>,
        /// The job's `BuildJobResult` node, so dynamically discovered
        /// outputs can be wired as new dependencies of the job result
        /// (mirrors the original runtime's `send_graph_updates`).
        job_result: NodeId,
    },
    /// Placeholder for a virtual child of a bundle-result node; never
    /// resolved to an executable body, only ever moved to `succeeded` by
    /// result propagation (spec invariant 6).
    BundleItem {
        parent: NodeId,
        key: String,
    },
    BuildJobResult {
        job_id: String,
        /// `(output name, source id, required)`; an unproduced optional
        /// output is omitted from the job result rather than failing it.
        results: Vec<(String, NodeId, bool)>,
    },
    SaveJobResult {
        job_result: NodeId,
        sink: ResultSink,
    },
    Noop,
}

impl NodeKind {
    /// Human-readable kind name for logging (START/DONE/FAILED/SKIP lines).
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::StaticValue { .. } => "static_value",
            NodeKind::Identity { .. } => "identity",
            NodeKind::KeyedItem { .. } => "keyed_item",
            NodeKind::ContextPush { .. } => "context_push",
            NodeKind::ContextPop { .. } => "context_pop",
            NodeKind::DataView { .. } => "data_view",
            NodeKind::DataItem { .. } => "data_item",
            NodeKind::LoadData { .. } => "load_data",
            NodeKind::SaveData { .. } => "save_data",
            NodeKind::DynamicDataSpec { .. } => "dynamic_data_spec",
            NodeKind::ImportModel { .. } => "import_model",
            NodeKind::RunModel { .. } => "run_model",
            NodeKind::BundleItem { .. } => "bundle_item",
            NodeKind::BuildJobResult { .. } => "build_job_result",
            NodeKind::SaveJobResult { .. } => "save_job_result",
            NodeKind::Noop => "noop",
        }
    }
}

/// An immutable node in the execution graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub dependencies: HashMap<NodeId, DependencyType>,
    pub kind: NodeKind,
    pub bundle: Option<BundleMarker>,
}

impl Node {
    pub fn new(id: NodeId, dependencies: HashMap<NodeId, DependencyType>, kind: NodeKind) -> Self {
        Self {
            id,
            dependencies,
            kind,
            bundle: None,
        }
    }

    pub fn with_bundle(mut self, bundle: BundleMarker) -> Self {
        self.bundle = Some(bundle);
        self
    }

    pub fn is_bundle_result(&self) -> bool {
        self.bundle.is_some()
    }
}

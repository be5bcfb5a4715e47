//! The job specification: the builder's only input (spec §6 "Job
//! specification").

use graph_model::{ImportDetails, ModelDef, Schema};
use std::collections::HashMap;

/// What kind of execution the job requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobType {
    RunModel,
    RunFlow,
    ImportModel,
}

/// Selects the model or flow the job targets, by key into [`Registry`].
#[derive(Debug, Clone)]
pub struct TargetSelector {
    pub object_key: String,
}

/// A decoded parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Json(serde_json::Value),
}

/// How a job input is sourced.
#[derive(Debug, Clone)]
pub enum DataSelector {
    /// Metadata is already known: build a static data spec from this schema.
    Static { storage_key: String, path: String, schema: Schema },
    /// Reuse an existing, already-materialised view by registry key.
    ExistingView { view_key: String },
}

/// How a job output is written.
#[derive(Debug, Clone)]
pub enum OutputSelector {
    /// The caller already allocated storage for this output.
    ExistingSpec { storage_key: String, path: String },
    /// The core must allocate fresh storage (`DynamicDataSpec`).
    Allocate { storage_key: Option<String> },
}

/// One step of a `RUN_FLOW` job.
#[derive(Debug, Clone)]
pub struct FlowStep {
    pub name: String,
    pub target: String,
    pub inputs: HashMap<String, FlowStepInput>,
    pub outputs: Vec<String>,
    pub parameters: Vec<String>,
}

/// Where a flow step's input comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlowStepInput {
    JobInput(String),
    JobParameter(String),
    StepOutput { step: String, output: String },
}

/// A flow definition: an unordered set of steps, ordered by the builder from
/// their own input dependency edges.
#[derive(Debug, Clone, Default)]
pub struct FlowDef {
    pub steps: Vec<FlowStep>,
    /// Step outputs that should also be exposed as job outputs.
    pub exposed_outputs: HashMap<String, (String, String)>,
}

/// The registry of objects a job spec may reference by key.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub models: HashMap<String, ModelDef>,
    pub flows: HashMap<String, FlowDef>,
    pub import_details: HashMap<String, ImportDetails>,
}

/// The full input to [`crate::GraphBuilder::build`].
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub job_id: String,
    pub job_type: JobType,
    pub target: TargetSelector,
    pub parameters: HashMap<String, ParamValue>,
    pub inputs: HashMap<String, DataSelector>,
    pub outputs: HashMap<String, OutputSelector>,
    pub registry: Registry,
    pub model_scope: String,
    pub save_result: Option<graph_model::ResultSink>,
}

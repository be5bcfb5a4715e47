//! Lowers a [`JobSpec`] into a [`Graph`] (spec §4.1).
//!
//! The seven steps below follow the source runtime's `GraphBuilder` almost
//! line for line, generalised to the closed node-kind set in
//! `graph-model`: a job namespace; a context-push/pop bracket around the
//! job's own inputs and parameters; per-input load/view nodes; per-parameter
//! static values; the execution target itself (a single model, a flow of
//! models, or a model import); per-output save nodes; and the final job
//! result.

use crate::error::BuildError;
use crate::flow::topological_order;
use crate::spec::{DataSelector, FlowStepInput, JobSpec, JobType, OutputSelector};
use crate::Graph;
use graph_model::{
    bundle_child_name, BundleMarker, DependencyType, ModelDef, Node, NodeId, NodeKind,
    NodeNamespace, NodeValue, ResultKind, Schema,
};
use std::collections::HashMap;

/// Stateless lowering pass: one [`GraphBuilder`] can build any number of
/// job specs, each into its own fresh [`Graph`].
#[derive(Debug, Default, Clone, Copy)]
pub struct GraphBuilder;

/// Accumulates nodes for one job build. Kept separate from `GraphBuilder`
/// itself so `build` stays re-entrant and side-effect free.
struct Accumulator {
    nodes: HashMap<NodeId, Node>,
}

impl Accumulator {
    fn new() -> Self {
        Self { nodes: HashMap::new() }
    }

    fn insert(&mut self, node: Node) -> NodeId {
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        id
    }

    fn hard_deps(ids: impl IntoIterator<Item = NodeId>) -> HashMap<NodeId, DependencyType> {
        ids.into_iter().map(|id| (id, DependencyType::HARD)).collect()
    }
}

fn id(name: impl Into<std::sync::Arc<str>>, ns: &NodeNamespace, kind: ResultKind) -> NodeId {
    NodeId::new(name, ns.clone(), kind)
}

/// Insert a real `BundleItem` placeholder node for every declared child of
/// a bundle-result node (spec invariant 6): without a backing node these
/// ids would fail `EngineContext`'s dependency-existence check the moment
/// anything (an `Identity` marker, a later step) referenced them.
fn insert_bundle_items(acc: &mut Accumulator, parent: &NodeId, ns: &NodeNamespace, children: &[String]) {
    for child_name in children {
        let child_id = id(child_name.clone(), ns, ResultKind::Any);
        acc.insert(Node::new(
            child_id,
            Accumulator::hard_deps([parent.clone()]),
            NodeKind::BundleItem { parent: parent.clone(), key: child_name.clone() },
        ));
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the execution graph for `spec`. Deterministic: the same spec
    /// always produces a structurally identical graph (same node ids, same
    /// dependency sets), since no node name is ever derived from wall-clock
    /// time or randomness.
    pub fn build(&self, spec: &JobSpec) -> Result<Graph, BuildError> {
        let mut acc = Accumulator::new();
        let outer_ns = NodeNamespace::root("__external__");
        let job_ns = outer_ns.child(spec.job_id.clone());
        let job_result_id = id("__job_result__", &job_ns, ResultKind::Any);

        // Step 1 + 3: raw parameter and input nodes, built in the outer
        // namespace as if supplied by the caller.
        let mut push_mapping: HashMap<String, NodeId> = HashMap::new();

        for (name, value) in &spec.parameters {
            let scalar = match value {
                crate::spec::ParamValue::Bool(b) => serde_json::json!(b),
                crate::spec::ParamValue::Int(i) => serde_json::json!(i),
                crate::spec::ParamValue::Float(f) => serde_json::json!(f),
                crate::spec::ParamValue::String(s) => serde_json::json!(s),
                crate::spec::ParamValue::Json(v) => v.clone(),
            };
            let param_id = id(name.clone(), &outer_ns, ResultKind::Scalar);
            acc.insert(Node::new(
                param_id.clone(),
                HashMap::new(),
                NodeKind::StaticValue { value: NodeValue::Scalar(scalar) },
            ));
            push_mapping.insert(name.clone(), param_id);
        }

        for (name, selector) in &spec.inputs {
            let view_id = build_input_view(&mut acc, &outer_ns, name, selector);
            push_mapping.insert(name.clone(), view_id);
        }

        // Step 2: context push. Every mapped name gets an `Identity` marker
        // inside the job namespace so downstream nodes reference a
        // job-scoped id rather than the raw outer one.
        let push_id = id("__ctx_push__", &job_ns, ResultKind::Bundle);
        acc.insert(
            Node::new(
                push_id.clone(),
                Accumulator::hard_deps(push_mapping.values().cloned()),
                NodeKind::ContextPush {
                    namespace: job_ns.clone(),
                    mapping: push_mapping.clone(),
                },
            )
            .with_bundle(BundleMarker {
                namespace: job_ns.clone(),
                children: push_mapping.keys().map(|n| bundle_child_name(n)).collect(),
            }),
        );
        let push_children: Vec<String> = push_mapping.keys().map(|n| bundle_child_name(n)).collect();
        insert_bundle_items(&mut acc, &push_id, &job_ns, &push_children);
        for name in push_mapping.keys() {
            let bundle_child = id(bundle_child_name(name), &job_ns, ResultKind::Any);
            let identity_id = id(name.clone(), &job_ns, ResultKind::Any);
            acc.insert(Node::new(
                identity_id,
                Accumulator::hard_deps([bundle_child.clone()]),
                NodeKind::Identity { source: bundle_child },
            ));
        }

        // Step 4/5: the execution target.
        let mut result_entries: Vec<(String, NodeId, bool)> = Vec::new();
        match spec.job_type {
            JobType::RunModel => {
                let model_def = spec
                    .registry
                    .models
                    .get(&spec.target.object_key)
                    .cloned()
                    .ok_or_else(|| BuildError::UnknownTarget(spec.target.object_key.clone()))?;
                let required: HashMap<String, bool> = model_def.outputs.iter().cloned().collect();
                let outputs = build_run_model(
                    &mut acc,
                    &job_ns,
                    &model_def,
                    &spec.model_scope,
                    spec,
                    &job_result_id,
                )?;
                result_entries.extend(build_outputs(&mut acc, &outer_ns, &job_ns, spec, &outputs, &required)?);
            }
            JobType::RunFlow => {
                let flow = spec
                    .registry
                    .flows
                    .get(&spec.target.object_key)
                    .cloned()
                    .ok_or_else(|| BuildError::UnknownTarget(spec.target.object_key.clone()))?;
                let order = topological_order(&flow)?;
                let mut step_outputs: HashMap<(String, String), NodeId> = HashMap::new();

                for step_idx in order {
                    let step = &flow.steps[step_idx];
                    let model_def = spec
                        .registry
                        .models
                        .get(&step.target)
                        .cloned()
                        .ok_or_else(|| BuildError::UnknownTarget(step.target.clone()))?;

                    let step_ns = job_ns.child(step.name.clone());
                    let mut step_push: HashMap<String, NodeId> = HashMap::new();
                    for (input_name, source) in &step.inputs {
                        let outer_id = match source {
                            FlowStepInput::JobInput(name) | FlowStepInput::JobParameter(name) => {
                                id(name.clone(), &job_ns, ResultKind::Any)
                            }
                            FlowStepInput::StepOutput { step, output } => step_outputs
                                .get(&(step.clone(), output.clone()))
                                .cloned()
                                .ok_or_else(|| {
                                    BuildError::UnknownFlowSource(step.clone(), output.clone())
                                })?,
                        };
                        step_push.insert(input_name.clone(), outer_id);
                    }

                    let step_push_id = id("__ctx_push__", &step_ns, ResultKind::Bundle);
                    acc.insert(
                        Node::new(
                            step_push_id.clone(),
                            Accumulator::hard_deps(step_push.values().cloned()),
                            NodeKind::ContextPush {
                                namespace: step_ns.clone(),
                                mapping: step_push.clone(),
                            },
                        )
                        .with_bundle(BundleMarker {
                            namespace: step_ns.clone(),
                            children: step_push.keys().map(|n| bundle_child_name(n)).collect(),
                        }),
                    );
                    let step_push_children: Vec<String> =
                        step_push.keys().map(|n| bundle_child_name(n)).collect();
                    insert_bundle_items(&mut acc, &step_push_id, &step_ns, &step_push_children);
                    for name in step_push.keys() {
                        let bundle_child = id(bundle_child_name(name), &step_ns, ResultKind::Any);
                        acc.insert(Node::new(
                            id(name.clone(), &step_ns, ResultKind::Any),
                            Accumulator::hard_deps([bundle_child.clone()]),
                            NodeKind::Identity { source: bundle_child },
                        ));
                    }

                    let step_spec_outputs = build_run_model_in(
                        &mut acc,
                        &step_ns,
                        &model_def,
                        &spec.model_scope,
                        &step_ns,
                        &job_result_id,
                    )?;

                    // Pop mapping keys are already the published (dotted)
                    // name, so the bundle's virtual children line up
                    // exactly with the ids downstream steps reference.
                    let mut pop_mapping: HashMap<String, NodeId> = HashMap::new();
                    for out_name in &step.outputs {
                        if let Some(out_id) = step_spec_outputs.get(out_name) {
                            pop_mapping.insert(format!("{}.{}", step.name, out_name), out_id.clone());
                        }
                    }
                    let pop_id = id(format!("__ctx_pop_{}__", step.name), &job_ns, ResultKind::Bundle);
                    acc.insert(
                        Node::new(
                            pop_id.clone(),
                            Accumulator::hard_deps(pop_mapping.values().cloned()),
                            NodeKind::ContextPop {
                                namespace: step_ns.clone(),
                                mapping: pop_mapping.clone(),
                            },
                        )
                        .with_bundle(BundleMarker {
                            namespace: job_ns.clone(),
                            children: pop_mapping.keys().cloned().collect(),
                        }),
                    );
                    let pop_children: Vec<String> = pop_mapping.keys().cloned().collect();
                    insert_bundle_items(&mut acc, &pop_id, &job_ns, &pop_children);
                    for (out_name, published_name) in step
                        .outputs
                        .iter()
                        .map(|n| (n.clone(), format!("{}.{}", step.name, n)))
                    {
                        if !pop_mapping.contains_key(&published_name) {
                            continue;
                        }
                        let published_id = id(published_name, &job_ns, ResultKind::Any);
                        step_outputs.insert((step.name.clone(), out_name), published_id);
                    }
                }

                for (output_name, (step_name, step_output)) in &flow.exposed_outputs {
                    let source_id = step_outputs
                        .get(&(step_name.clone(), step_output.clone()))
                        .cloned()
                        .ok_or_else(|| {
                            BuildError::UnknownFlowSource(step_name.clone(), step_output.clone())
                        })?;
                    let mut single = HashMap::new();
                    single.insert(output_name.clone(), source_id);
                    result_entries.extend(build_outputs(
                        &mut acc,
                        &outer_ns,
                        &job_ns,
                        spec,
                        &single,
                        &HashMap::new(),
                    )?);
                }
            }
            JobType::ImportModel => {
                let details = spec
                    .registry
                    .import_details
                    .get(&spec.target.object_key)
                    .cloned()
                    .ok_or_else(|| BuildError::UnknownTarget(spec.target.object_key.clone()))?;
                let import_id = id("__import__", &job_ns, ResultKind::Any);
                acc.insert(Node::new(
                    import_id.clone(),
                    HashMap::new(),
                    NodeKind::ImportModel {
                        model_scope: spec.model_scope.clone(),
                        import: details,
                    },
                ));
                result_entries.push(("model".to_string(), import_id, true));
            }
        }

        // Step 7: the job result, and optionally persisting it. An
        // unproduced optional output's chain fails on its own; a TOLERANT
        // dependency keeps that failure from taking the job result with it.
        let result_id = job_result_id.clone();
        let dependencies = result_entries
            .iter()
            .map(|(_, id, required)| {
                let kind = if *required { DependencyType::HARD } else { DependencyType::TOLERANT };
                (id.clone(), kind)
            })
            .collect();
        acc.insert(Node::new(
            result_id.clone(),
            dependencies,
            NodeKind::BuildJobResult {
                job_id: spec.job_id.clone(),
                results: result_entries,
            },
        ));

        let root_id = if let Some(sink) = &spec.save_result {
            let save_id = id("__save_job_result__", &job_ns, ResultKind::Unit);
            acc.insert(Node::new(
                save_id.clone(),
                Accumulator::hard_deps([result_id.clone()]),
                NodeKind::SaveJobResult { job_result: result_id, sink: sink.clone() },
            ));
            save_id
        } else {
            result_id
        };

        let graph = Graph { nodes: acc.nodes, root_id };
        graph.validate()?;
        Ok(graph)
    }
}


fn build_input_view(
    acc: &mut Accumulator,
    ns: &NodeNamespace,
    name: &str,
    selector: &DataSelector,
) -> NodeId {
    match selector {
        DataSelector::Static { storage_key, path, schema } => {
            let spec_value = serde_json::json!({ "storage_key": storage_key, "path": path });
            let spec_id = id(format!("{name}_spec"), ns, ResultKind::Scalar);
            acc.insert(Node::new(
                spec_id.clone(),
                HashMap::new(),
                NodeKind::StaticValue { value: NodeValue::Scalar(spec_value) },
            ));
            let load_id = id(format!("{name}_load"), ns, ResultKind::Any);
            acc.insert(Node::new(
                load_id.clone(),
                Accumulator::hard_deps([spec_id.clone()]),
                NodeKind::LoadData { data_spec: spec_id },
            ));
            let view_id = id(name.to_string(), ns, ResultKind::Any);
            acc.insert(Node::new(
                view_id.clone(),
                Accumulator::hard_deps([load_id.clone()]),
                NodeKind::DataView { schema: schema.clone(), root_item: load_id },
            ));
            view_id
        }
        DataSelector::ExistingView { view_key } => {
            let spec_id = id(format!("{name}_spec"), ns, ResultKind::Scalar);
            acc.insert(Node::new(
                spec_id.clone(),
                HashMap::new(),
                NodeKind::StaticValue {
                    value: NodeValue::Scalar(serde_json::json!(view_key)),
                },
            ));
            let view_id = id(name.to_string(), ns, ResultKind::Any);
            acc.insert(Node::new(
                view_id.clone(),
                Accumulator::hard_deps([spec_id.clone()]),
                NodeKind::DataView { schema: Schema { fields: Vec::new() }, root_item: spec_id },
            ));
            view_id
        }
    }
}

/// Lower a single `RUN_MODEL` target (job-level): `RunModel` + one
/// `KeyedItem` per declared output, returning the output name -> id map.
fn build_run_model(
    acc: &mut Accumulator,
    job_ns: &NodeNamespace,
    model_def: &ModelDef,
    model_scope: &str,
    spec: &JobSpec,
    job_result: &NodeId,
) -> Result<HashMap<String, NodeId>, BuildError> {
    let _ = spec; // parameters/inputs resolved by name inside build_run_model_in
    build_run_model_in(acc, job_ns, model_def, model_scope, job_ns, job_result)
}

/// Lower one `RunModel` node plus its declared outputs, with parameter and
/// input ids resolved by name inside `context_ns` (the job namespace for a
/// top-level `RUN_MODEL`, or a step namespace inside a `RUN_FLOW`).
/// `job_result` is the job's `BuildJobResult` node id, passed through so
/// the model can wire runtime-discovered outputs as its dependencies.
fn build_run_model_in(
    acc: &mut Accumulator,
    run_ns: &NodeNamespace,
    model_def: &ModelDef,
    model_scope: &str,
    context_ns: &NodeNamespace,
    job_result: &NodeId,
) -> Result<HashMap<String, NodeId>, BuildError> {
    let parameters: Vec<NodeId> = model_def
        .parameters
        .iter()
        .map(|name| id(name.clone(), context_ns, ResultKind::Any))
        .collect();
    let inputs: Vec<NodeId> = model_def
        .inputs
        .iter()
        .map(|name| id(name.clone(), context_ns, ResultKind::Any))
        .collect();

    let run_id = id("__run_model__", run_ns, ResultKind::Bundle);
    acc.insert(Node::new(
        run_id.clone(),
        Accumulator::hard_deps(parameters.iter().cloned().chain(inputs.iter().cloned())),
        NodeKind::RunModel {
            model_def: model_def.clone(),
            model_scope: model_scope.to_string(),
            parameters,
            inputs,
            job_result: job_result.clone(),
        },
    ));

    let mut outputs = HashMap::new();
    for (out_name, _required) in &model_def.outputs {
        let out_id = id(out_name.clone(), run_ns, ResultKind::Any);
        acc.insert(Node::new(
            out_id.clone(),
            Accumulator::hard_deps([run_id.clone()]),
            NodeKind::KeyedItem { source: run_id.clone(), key: out_name.clone() },
        ));
        outputs.insert(out_name.clone(), out_id);
    }
    Ok(outputs)
}

/// Step 6: for each job output, a `DataItem` extractor, a spec (static or
/// dynamically allocated), a `SaveData` node, and the `(name, SaveData id)`
/// pair `BuildJobResult` collects. `SaveData`'s own result value (a small
/// persisted-location map) stands in for a dedicated "DataResult" node,
/// which has no row in the closed node-kind set.
fn build_outputs(
    acc: &mut Accumulator,
    outer_ns: &NodeNamespace,
    job_ns: &NodeNamespace,
    spec: &JobSpec,
    sources: &HashMap<String, NodeId>,
    required: &HashMap<String, bool>,
) -> Result<Vec<(String, NodeId, bool)>, BuildError> {
    let mut entries = Vec::new();
    for (name, source_view) in sources {
        let selector = spec
            .outputs
            .get(name)
            .ok_or_else(|| BuildError::MissingInput(name.clone()))?;

        let item_id = id(format!("{name}_item"), job_ns, ResultKind::Any);
        acc.insert(Node::new(
            item_id.clone(),
            Accumulator::hard_deps([source_view.clone()]),
            NodeKind::DataItem { data_view: source_view.clone() },
        ));

        let data_spec_id = match selector {
            OutputSelector::ExistingSpec { storage_key, path } => {
                let spec_id = id(format!("{name}_save_spec"), outer_ns, ResultKind::Scalar);
                acc.insert(Node::new(
                    spec_id.clone(),
                    HashMap::new(),
                    NodeKind::StaticValue {
                        value: NodeValue::Scalar(
                            serde_json::json!({ "storage_key": storage_key, "path": path }),
                        ),
                    },
                ));
                spec_id
            }
            OutputSelector::Allocate { storage_key } => {
                let dyn_id = id(format!("{name}_dynamic_spec"), job_ns, ResultKind::Any);
                acc.insert(Node::new(
                    dyn_id.clone(),
                    Accumulator::hard_deps([source_view.clone()]),
                    NodeKind::DynamicDataSpec {
                        data_view: source_view.clone(),
                        storage_key: storage_key.clone().unwrap_or_else(|| name.clone()),
                    },
                ));
                dyn_id
            }
        };

        let save_id = id(format!("{name}_save"), job_ns, ResultKind::Any);
        acc.insert(Node::new(
            save_id.clone(),
            Accumulator::hard_deps([data_spec_id.clone(), item_id.clone()]),
            NodeKind::SaveData { data_spec: data_spec_id, item: item_id },
        ));
        entries.push((name.clone(), save_id, *required.get(name).unwrap_or(&true)));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ParamValue, Registry, TargetSelector};

    fn model(outputs: &[&str]) -> ModelDef {
        ModelDef {
            model_id: "m1".into(),
            parameters: vec!["p1".into()],
            inputs: vec!["in1".into()],
            outputs: outputs.iter().map(|n| (n.to_string(), true)).collect(),
        }
    }

    fn base_spec() -> JobSpec {
        let mut registry = Registry::default();
        registry.models.insert("model_a".into(), model(&["out1"]));

        let mut parameters = HashMap::new();
        parameters.insert("p1".to_string(), ParamValue::Int(42));

        let mut inputs = HashMap::new();
        inputs.insert(
            "in1".to_string(),
            DataSelector::Static {
                storage_key: "sk1".into(),
                path: "/a/b".into(),
                schema: Schema { fields: vec![("x".into(), "INTEGER".into())] },
            },
        );

        let mut outputs = HashMap::new();
        outputs.insert("out1".to_string(), OutputSelector::Allocate { storage_key: None });

        JobSpec {
            job_id: "job-1".into(),
            job_type: JobType::RunModel,
            target: TargetSelector { object_key: "model_a".into() },
            parameters,
            inputs,
            outputs,
            registry,
            model_scope: "scope1".into(),
            save_result: None,
        }
    }

    #[test]
    fn run_model_job_builds_a_valid_graph() {
        let spec = base_spec();
        let graph = GraphBuilder::new().build(&spec).unwrap();
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn build_is_idempotent() {
        let spec = base_spec();
        let g1 = GraphBuilder::new().build(&spec).unwrap();
        let g2 = GraphBuilder::new().build(&spec).unwrap();
        assert_eq!(g1.nodes.len(), g2.nodes.len());
        assert_eq!(g1.root_id, g2.root_id);
        for id in g1.nodes.keys() {
            assert!(g2.nodes.contains_key(id));
        }
    }

    #[test]
    fn builder_never_emits_soft_dependencies() {
        let spec = base_spec();
        let graph = GraphBuilder::new().build(&spec).unwrap();
        for node in graph.nodes.values() {
            for dep_kind in node.dependencies.values() {
                assert_ne!(*dep_kind, DependencyType::SOFT);
            }
        }
    }

    #[test]
    fn unknown_target_is_rejected() {
        let mut spec = base_spec();
        spec.target.object_key = "does_not_exist".into();
        assert!(GraphBuilder::new().build(&spec).is_err());
    }
}

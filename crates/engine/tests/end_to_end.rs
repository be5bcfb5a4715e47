//! End-to-end job scenarios driven through the public [`Engine`] facade,
//! using the in-memory storage/model-loader test doubles `resolver`
//! provides behind its `test-support` feature.

use engine::{Engine, EngineError, StatusCode};
use graph_builder::{
    DataSelector, FlowDef, FlowStep, FlowStepInput, JobSpec, JobType, OutputSelector, Registry,
    TargetSelector,
};
use graph_model::{ModelDef, NodeValue, Schema};
use resolver::test_support::{InMemoryStorage, ScriptedModelLoader, StubModelLoader};
use std::collections::HashMap;
use std::sync::Arc;

fn model(id: &str, inputs: &[&str], outputs: &[&str]) -> ModelDef {
    ModelDef {
        model_id: id.to_string(),
        parameters: Vec::new(),
        inputs: inputs.iter().map(|s| s.to_string()).collect(),
        outputs: outputs.iter().map(|s| (s.to_string(), true)).collect(),
    }
}

fn model_with_required(id: &str, inputs: &[&str], outputs: &[(&str, bool)]) -> ModelDef {
    ModelDef {
        model_id: id.to_string(),
        parameters: Vec::new(),
        inputs: inputs.iter().map(|s| s.to_string()).collect(),
        outputs: outputs.iter().map(|(n, r)| (n.to_string(), *r)).collect(),
    }
}

fn static_input(storage_key: &str, path: &str) -> DataSelector {
    DataSelector::Static {
        storage_key: storage_key.to_string(),
        path: path.to_string(),
        schema: Schema { fields: vec![("x".into(), "INTEGER".into())] },
    }
}

#[tokio::test]
async fn run_model_job_with_an_identity_model_succeeds() {
    let storage = Arc::new(InMemoryStorage::new());
    storage.seed_table("sk1", "/a/b", NodeValue::List(vec![NodeValue::Scalar(serde_json::json!(7))]));
    let model_loader = Arc::new(StubModelLoader::new());

    let mut registry = Registry::default();
    registry.models.insert("model_a".to_string(), model("m1", &["in1"], &["out1"]));

    let mut inputs = HashMap::new();
    inputs.insert("in1".to_string(), static_input("sk1", "/a/b"));
    let mut outputs = HashMap::new();
    outputs.insert("out1".to_string(), OutputSelector::Allocate { storage_key: None });

    let spec = JobSpec {
        job_id: "job-identity".to_string(),
        job_type: JobType::RunModel,
        target: TargetSelector { object_key: "model_a".to_string() },
        parameters: HashMap::new(),
        inputs,
        outputs,
        registry,
        model_scope: "scope-1".to_string(),
        save_result: None,
    };

    let result = Engine::run_until_done(spec, storage, model_loader).await.expect("job should succeed");
    assert_eq!(result.status_code, StatusCode::Succeeded);
    assert!(result.objects.contains_key("out1"));
}

#[tokio::test]
async fn a_missing_storage_key_fails_the_job_with_a_reported_error() {
    // Nothing seeded at "sk1:/a/b": `LoadData` will fail, which should
    // propagate all the way up to a FAILED job result.
    let storage = Arc::new(InMemoryStorage::new());
    let model_loader = Arc::new(StubModelLoader::new());

    let mut registry = Registry::default();
    registry.models.insert("model_a".to_string(), model("m1", &["in1"], &["out1"]));

    let mut inputs = HashMap::new();
    inputs.insert("in1".to_string(), static_input("sk1", "/a/b"));
    let mut outputs = HashMap::new();
    outputs.insert("out1".to_string(), OutputSelector::Allocate { storage_key: None });

    let spec = JobSpec {
        job_id: "job-missing-input".to_string(),
        job_type: JobType::RunModel,
        target: TargetSelector { object_key: "model_a".to_string() },
        parameters: HashMap::new(),
        inputs,
        outputs,
        registry,
        model_scope: "scope-1".to_string(),
        save_result: None,
    };

    let (result, err) =
        Engine::run_until_done(spec, storage, model_loader).await.expect_err("job should fail");
    assert_eq!(result.status_code, StatusCode::Failed);
    assert!(!result.errors.is_empty());
    assert!(matches!(err, EngineError::JobFailed(_)));
}

fn linear_flow_spec(seed_input: bool) -> (JobSpec, Arc<InMemoryStorage>) {
    let storage = Arc::new(InMemoryStorage::new());
    if seed_input {
        storage.seed_table("sk1", "/a/b", NodeValue::List(vec![NodeValue::Scalar(serde_json::json!(3))]));
    }

    let mut registry = Registry::default();
    registry.models.insert("model_a".to_string(), model("a", &["in1"], &["outA"]));
    registry.models.insert("model_b".to_string(), model("b", &["outA"], &["outB"]));

    let mut step_a_inputs = HashMap::new();
    step_a_inputs.insert("in1".to_string(), FlowStepInput::JobInput("in1".to_string()));
    let step_a = FlowStep {
        name: "A".to_string(),
        target: "model_a".to_string(),
        inputs: step_a_inputs,
        outputs: vec!["outA".to_string()],
        parameters: Vec::new(),
    };

    let mut step_b_inputs = HashMap::new();
    step_b_inputs.insert(
        "outA".to_string(),
        FlowStepInput::StepOutput { step: "A".to_string(), output: "outA".to_string() },
    );
    let step_b = FlowStep {
        name: "B".to_string(),
        target: "model_b".to_string(),
        inputs: step_b_inputs,
        outputs: vec!["outB".to_string()],
        parameters: Vec::new(),
    };

    let mut exposed_outputs = HashMap::new();
    exposed_outputs.insert("final".to_string(), ("B".to_string(), "outB".to_string()));
    registry.flows.insert(
        "flow1".to_string(),
        FlowDef { steps: vec![step_a, step_b], exposed_outputs },
    );

    let mut job_inputs = HashMap::new();
    job_inputs.insert("in1".to_string(), static_input("sk1", "/a/b"));
    let mut job_outputs = HashMap::new();
    job_outputs.insert("final".to_string(), OutputSelector::Allocate { storage_key: None });

    let spec = JobSpec {
        job_id: "job-flow".to_string(),
        job_type: JobType::RunFlow,
        target: TargetSelector { object_key: "flow1".to_string() },
        parameters: HashMap::new(),
        inputs: job_inputs,
        outputs: job_outputs,
        registry,
        model_scope: "scope-1".to_string(),
        save_result: None,
    };
    (spec, storage)
}

#[tokio::test]
async fn a_two_step_flow_runs_both_steps_to_completion() {
    let (spec, storage) = linear_flow_spec(true);
    let model_loader = Arc::new(StubModelLoader::new());
    let result = Engine::run_until_done(spec, storage, model_loader).await.expect("flow should succeed");
    assert_eq!(result.status_code, StatusCode::Succeeded);
    assert!(result.objects.contains_key("final"));
}

#[tokio::test]
async fn when_step_a_fails_step_b_is_skipped_without_running() {
    // Input left unseeded: step A's data load fails, so step A never
    // produces `outA` and step B's hard dependency on it is never viable.
    let (spec, storage) = linear_flow_spec(false);
    let model_loader = Arc::new(StubModelLoader::new());
    let (result, err) =
        Engine::run_until_done(spec, storage, model_loader).await.expect_err("flow should fail");
    assert_eq!(result.status_code, StatusCode::Failed);
    assert!(matches!(err, EngineError::JobFailed(_)));
}

#[tokio::test]
async fn saving_the_job_result_writes_it_to_storage() {
    let storage = Arc::new(InMemoryStorage::new());
    storage.seed_table("sk1", "/a/b", NodeValue::List(vec![NodeValue::Scalar(serde_json::json!(1))]));
    let model_loader = Arc::new(StubModelLoader::new());

    let mut registry = Registry::default();
    registry.models.insert("model_a".to_string(), model("m1", &["in1"], &["out1"]));
    let mut inputs = HashMap::new();
    inputs.insert("in1".to_string(), static_input("sk1", "/a/b"));
    let mut outputs = HashMap::new();
    outputs.insert("out1".to_string(), OutputSelector::Allocate { storage_key: None });

    let spec = JobSpec {
        job_id: "job-saved".to_string(),
        job_type: JobType::RunModel,
        target: TargetSelector { object_key: "model_a".to_string() },
        parameters: HashMap::new(),
        inputs,
        outputs,
        registry,
        model_scope: "scope-1".to_string(),
        save_result: Some(graph_model::ResultSink {
            format: graph_model::ResultFormat::Json,
            directory: "results".to_string(),
        }),
    };

    let result = Engine::run_until_done(spec, storage.clone(), model_loader).await.expect("job should succeed");
    assert_eq!(result.status_code, StatusCode::Succeeded);
    assert!(storage.exists("memory", "results/job_result").await.unwrap());
}

#[tokio::test]
async fn an_unproduced_optional_output_does_not_fail_the_job() {
    let storage = Arc::new(InMemoryStorage::new());
    storage.seed_table("sk1", "/a/b", NodeValue::List(vec![NodeValue::Scalar(serde_json::json!(1))]));

    let mut scripted_outputs = HashMap::new();
    scripted_outputs.insert("out_required".to_string(), NodeValue::Scalar(serde_json::json!(42)));
    let model_loader = Arc::new(ScriptedModelLoader::new(scripted_outputs));

    let mut registry = Registry::default();
    registry.models.insert(
        "model_a".to_string(),
        model_with_required("m1", &["in1"], &[("out_required", true), ("out_optional", false)]),
    );

    let mut inputs = HashMap::new();
    inputs.insert("in1".to_string(), static_input("sk1", "/a/b"));
    let mut outputs = HashMap::new();
    outputs.insert("out_required".to_string(), OutputSelector::Allocate { storage_key: None });
    outputs.insert("out_optional".to_string(), OutputSelector::Allocate { storage_key: None });

    let spec = JobSpec {
        job_id: "job-optional-output".to_string(),
        job_type: JobType::RunModel,
        target: TargetSelector { object_key: "model_a".to_string() },
        parameters: HashMap::new(),
        inputs,
        outputs,
        registry,
        model_scope: "scope-1".to_string(),
        save_result: None,
    };

    let result = Engine::run_until_done(spec, storage, model_loader)
        .await
        .expect("job should succeed even though the optional output was never produced");
    assert_eq!(result.status_code, StatusCode::Succeeded);
    assert!(result.objects.contains_key("out_required"));
    assert!(!result.objects.contains_key("out_optional"));
}

#[tokio::test]
async fn a_dynamic_output_colliding_with_the_job_result_node_deadlocks() {
    // The model reports an output beyond its declared set, named so that
    // `RunModelFunction`'s dynamic registration collides with the job's
    // own `BuildJobResult` node id, overwriting it with a node that
    // depends on itself: a dynamically-injected dependency forming a
    // cycle no scheduling round can ever resolve.
    let storage = Arc::new(InMemoryStorage::new());
    storage.seed_table("sk1", "/a/b", NodeValue::List(vec![NodeValue::Scalar(serde_json::json!(1))]));

    let mut scripted_outputs = HashMap::new();
    scripted_outputs.insert("out1".to_string(), NodeValue::Scalar(serde_json::json!(9)));
    scripted_outputs.insert("__job_result__".to_string(), NodeValue::Scalar(serde_json::json!("bogus")));
    let model_loader = Arc::new(ScriptedModelLoader::new(scripted_outputs));

    let mut registry = Registry::default();
    registry.models.insert("model_a".to_string(), model("m1", &["in1"], &["out1"]));

    let mut inputs = HashMap::new();
    inputs.insert("in1".to_string(), static_input("sk1", "/a/b"));
    let mut outputs = HashMap::new();
    outputs.insert("out1".to_string(), OutputSelector::Allocate { storage_key: None });

    let spec = JobSpec {
        job_id: "job-dynamic-cycle".to_string(),
        job_type: JobType::RunModel,
        target: TargetSelector { object_key: "model_a".to_string() },
        parameters: HashMap::new(),
        inputs,
        outputs,
        registry,
        model_scope: "scope-1".to_string(),
        save_result: None,
    };

    let (result, err) =
        Engine::run_until_done(spec, storage, model_loader).await.expect_err("job should deadlock");
    assert_eq!(result.status_code, StatusCode::Failed);
    assert!(matches!(err, EngineError::Deadlock(_)));
}

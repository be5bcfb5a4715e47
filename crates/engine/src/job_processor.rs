//! Owns the lifecycle of a single job (spec §4.4's `JobProcessor`): builds
//! the graph, binds node functions, runs the scheduler to completion, then
//! tears down the job's model scope and scratch directory.

use crate::error::EngineError;
use crate::graph_processor::GraphProcessor;
use crate::result::JobResult;
use graph_builder::{GraphBuilder, JobSpec};
use graph_model::EngineContext;
use graph_model::EngineNode;
use resolver::{FunctionResolver, ModelLoader, Storage};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Build and run `spec` to completion. Always returns a [`JobResult`]; the
/// `Err` side additionally carries the [`EngineError`] that should be
/// re-raised to a `wait_for_job` caller (spec §7: "the runtime re-raises
/// the primary error... on success, the result object carries the produced
/// metadata").
pub async fn run_job(
    spec: &JobSpec,
    storage: Arc<dyn Storage>,
    model_loader: Arc<dyn ModelLoader>,
) -> Result<JobResult, (JobResult, EngineError)> {
    let scratch = tempfile::tempdir().map_err(|err| {
        let result = JobResult::failed(spec.job_id.clone(), vec![err.to_string()]);
        (result, EngineError::ScratchDirUnavailable(err.to_string()))
    })?;
    info!(job_id = %spec.job_id, scratch = %scratch.path().display(), "scratch directory allocated");

    if let Err(err) = model_loader.create_scope(&spec.model_scope).await {
        let result = JobResult::failed(spec.job_id.clone(), vec![err.to_string()]);
        return Err((result, EngineError::from(err)));
    }

    let outcome = run_graph(spec, storage, model_loader.clone()).await;

    if let Err(err) = model_loader.destroy_scope(&spec.model_scope).await {
        warn!(job_id = %spec.job_id, error = %err, "failed to destroy model scope");
    }
    // Scratch directory removal is deferred to here, at job termination,
    // regardless of how the job ended (spec §5).
    drop(scratch);

    outcome
}

async fn run_graph(
    spec: &JobSpec,
    storage: Arc<dyn Storage>,
    model_loader: Arc<dyn ModelLoader>,
) -> Result<JobResult, (JobResult, EngineError)> {
    let graph = GraphBuilder::new().build(spec).map_err(|err| {
        let result = JobResult::failed(spec.job_id.clone(), vec![err.to_string()]);
        (result, EngineError::from(err))
    })?;

    let resolver = FunctionResolver::new(storage, model_loader);
    let mut nodes = HashMap::with_capacity(graph.nodes.len());
    for (id, node) in graph.nodes {
        let function = resolver.resolve(&node).await.map_err(|err| {
            let result = JobResult::failed(spec.job_id.clone(), vec![err.to_string()]);
            (result, EngineError::from(err))
        })?;
        nodes.insert(id, EngineNode::pending(node).with_function(function));
    }

    let ctx = EngineContext::new(nodes).map_err(|err| {
        let result = JobResult::failed(spec.job_id.clone(), vec![err.to_string()]);
        (result, EngineError::from(err))
    })?;

    let mut processor = GraphProcessor::new(ctx, Arc::new(resolver));
    let run_outcome = processor.run().await;
    let result = JobResult::from_context(spec.job_id.clone(), processor.context());

    match run_outcome {
        Ok(()) => Ok(result),
        Err(err) => Err((result, err)),
    }
}

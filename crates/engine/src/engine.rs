//! The actor-driven top-level facade (spec §6's process-control surface):
//! `pre_start`/`start`/`stop`/`submit_job`/`wait_for_job`/`run_until_done`.
//!
//! `EngineActor` is the system's root actor; every submitted job runs under
//! its own short-lived `JobActor` child, so one job panicking or the
//! resolver producing an uncontained error never takes down the others
//! (spec §5's per-job isolation via the actor hierarchy's supervision).

use crate::error::EngineError;
use crate::job_processor::run_job;
use crate::result::JobResult;
use actors::{Actor, ActorContext, ActorId, ActorError, ActorSystem, Message};
use async_trait::async_trait;
use graph_builder::JobSpec;
use parking_lot::Mutex;
use resolver::{ModelLoader, Storage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// What a `JobActor` reports back once its background evaluation finishes.
type JobOutcome = Result<JobResult, (JobResult, EngineError)>;

struct JobFinished {
    job_id: String,
    outcome: JobOutcome,
}

struct JobCompleted {
    job_id: String,
    outcome: JobOutcome,
}

enum JobSlot {
    Pending,
    Done(JobOutcome),
}

/// One job's lifetime as an actor: spawned per `submit_job` call, stopped
/// once its result has been reported to the parent.
struct JobActor {
    spec: JobSpec,
    storage: Arc<dyn Storage>,
    model_loader: Arc<dyn ModelLoader>,
}

#[async_trait]
impl Actor for JobActor {
    fn accepts(&self, msg: &Message) -> bool {
        msg.downcast_ref::<JobFinished>().is_some()
    }

    async fn on_start(&mut self, ctx: &mut ActorContext) -> Result<(), ActorError> {
        let handle = ctx.system_handle();
        let self_id = ctx.self_id().clone();
        let spec = self.spec.clone();
        let storage = self.storage.clone();
        let model_loader = self.model_loader.clone();
        let job_id = spec.job_id.clone();
        tokio::spawn(async move {
            let outcome = run_job(&spec, storage, model_loader).await;
            handle.send(self_id.clone(), self_id, JobFinished { job_id, outcome });
        });
        Ok(())
    }

    async fn on_message(
        &mut self,
        ctx: &mut ActorContext,
        _sender: ActorId,
        msg: Message,
    ) -> Result<(), ActorError> {
        if let Ok(finished) = msg.downcast::<JobFinished>() {
            if let Some(parent) = ctx.parent_id() {
                ctx.send(parent.clone(), JobCompleted { job_id: finished.job_id.clone(), outcome: finished.outcome });
            }
            ctx.stop_self(false);
        }
        Ok(())
    }
}

/// The root actor: owns the shared `jobs` table and spawns one `JobActor`
/// per submitted job.
struct EngineActor {
    jobs: Arc<Mutex<HashMap<String, JobSlot>>>,
}

struct SubmitJob {
    spec: JobSpec,
    storage: Arc<dyn Storage>,
    model_loader: Arc<dyn ModelLoader>,
}

#[async_trait]
impl Actor for EngineActor {
    fn accepts(&self, msg: &Message) -> bool {
        msg.downcast_ref::<SubmitJob>().is_some() || msg.downcast_ref::<JobCompleted>().is_some()
    }

    async fn on_message(
        &mut self,
        ctx: &mut ActorContext,
        _sender: ActorId,
        msg: Message,
    ) -> Result<(), ActorError> {
        let msg = match msg.downcast::<SubmitJob>() {
            Ok(submit) => {
                let job_actor =
                    JobActor { spec: submit.spec, storage: submit.storage, model_loader: submit.model_loader };
                ctx.spawn_child("job", Box::new(job_actor));
                return Ok(());
            }
            Err(msg) => msg,
        };
        if let Ok(completed) = msg.downcast::<JobCompleted>() {
            self.jobs.lock().insert(completed.job_id.clone(), JobSlot::Done(completed.outcome));
        }
        Ok(())
    }
}

/// Public facade over one `ActorSystem`: submit jobs, poll for their result,
/// and drive the system's own start/stop lifecycle.
pub struct Engine {
    system: ActorSystem,
    jobs: Arc<Mutex<HashMap<String, JobSlot>>>,
}

impl Engine {
    /// Construct the engine without starting its dispatch task yet
    /// (spec §6's `pre_start`).
    pub fn pre_start() -> Self {
        let jobs = Arc::new(Mutex::new(HashMap::new()));
        let root = EngineActor { jobs: jobs.clone() };
        let system = ActorSystem::pre_start("engine", Box::new(root));
        Self { system, jobs }
    }

    /// Start the dispatch task. `wait` blocks until the root actor itself
    /// terminates (only useful once `stop` has been called elsewhere).
    pub async fn start(&self, wait: bool) {
        self.system.start(wait).await;
    }

    pub fn stop(&self, due_to_error: bool) {
        self.system.stop(due_to_error);
    }

    /// Submit a job for execution; returns immediately with the job id the
    /// caller passed in the spec (spec §6's `submitJob`).
    pub fn submit_job(&self, spec: JobSpec, storage: Arc<dyn Storage>, model_loader: Arc<dyn ModelLoader>) -> String {
        let job_id = spec.job_id.clone();
        self.jobs.lock().insert(job_id.clone(), JobSlot::Pending);
        self.system.send(self.system.root_id().clone(), SubmitJob { spec, storage, model_loader });
        job_id
    }

    /// Poll until `job_id`'s result is available, re-raising its primary
    /// error on failure (spec §6's `waitForJob`/§7's error-propagation
    /// policy). Always returns the assembled [`JobResult`] alongside an
    /// error, since a failed job still carries a FAILED-status result.
    pub async fn wait_for_job(&self, job_id: &str) -> Result<JobResult, (JobResult, EngineError)> {
        enum Poll {
            Done(JobOutcome),
            Pending,
            Unknown,
        }
        loop {
            // Single lock acquisition per poll: only remove the entry once
            // it is actually `Done`, so a completion landing between two
            // separate lock acquisitions can never be clobbered back to
            // `Pending`.
            let poll = {
                let mut jobs = self.jobs.lock();
                match jobs.get(job_id) {
                    Some(JobSlot::Done(_)) => match jobs.remove(job_id) {
                        Some(JobSlot::Done(outcome)) => Poll::Done(outcome),
                        _ => unreachable!("checked Done under the same lock"),
                    },
                    Some(JobSlot::Pending) => Poll::Pending,
                    None => Poll::Unknown,
                }
            };
            match poll {
                Poll::Done(outcome) => return outcome,
                Poll::Pending => tokio::time::sleep(Duration::from_millis(5)).await,
                Poll::Unknown => {
                    warn!(job_id, "wait_for_job: unknown job id");
                    return Err((
                        JobResult::failed(job_id.to_string(), vec!["unknown job id".to_string()]),
                        EngineError::UnknownJob(job_id.to_string()),
                    ));
                }
            }
        }
    }

    /// Submit and await a single job in one call, then stop the system
    /// (spec §6's one-shot `runUntilDone` convenience entry point).
    pub async fn run_until_done(
        spec: JobSpec,
        storage: Arc<dyn Storage>,
        model_loader: Arc<dyn ModelLoader>,
    ) -> Result<JobResult, (JobResult, EngineError)> {
        let engine = Self::pre_start();
        engine.start(false).await;
        let job_id = engine.submit_job(spec, storage, model_loader);
        let outcome = engine.wait_for_job(&job_id).await;
        engine.stop(false);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_builder::{JobType, Registry, TargetSelector};
    use resolver::test_support::{InMemoryStorage, StubModelLoader};
    use std::collections::HashMap as Map;

    fn noop_spec(job_id: &str) -> JobSpec {
        JobSpec {
            job_id: job_id.to_string(),
            job_type: JobType::RunModel,
            target: TargetSelector { object_key: "missing".to_string() },
            parameters: Map::new(),
            inputs: Map::new(),
            outputs: Map::new(),
            registry: Registry::default(),
            model_scope: "scope-1".to_string(),
            save_result: None,
        }
    }

    #[tokio::test]
    async fn unknown_target_surfaces_as_a_build_error() {
        let storage = Arc::new(InMemoryStorage::new());
        let model_loader = Arc::new(StubModelLoader::new());
        let outcome = Engine::run_until_done(noop_spec("job-1"), storage, model_loader).await;
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn waiting_on_an_unknown_job_id_reports_unknown_job() {
        let engine = Engine::pre_start();
        engine.start(false).await;
        let result = engine.wait_for_job("does-not-exist").await;
        assert!(matches!(result, Err((_, EngineError::UnknownJob(_)))));
        engine.stop(false);
    }
}

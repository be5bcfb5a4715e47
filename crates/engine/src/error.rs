//! Engine-level errors.

use graph_model::{GraphError, NodeId};
use graph_builder::BuildError;
use resolver::ResolveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("job failed: {0} node(s) did not complete successfully")]
    JobFailed(usize),

    #[error("job deadlocked: {0} node(s) remain pending with no viable successor")]
    Deadlock(usize),

    #[error("node {0:?} was requested but never scheduled")]
    NodeNotScheduled(NodeId),

    #[error("unknown job id '{0}'")]
    UnknownJob(String),

    #[error("job scratch directory could not be created: {0}")]
    ScratchDirUnavailable(String),
}

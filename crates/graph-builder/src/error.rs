//! Builder-time errors: all structural, all detected before any I/O.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unknown target '{0}' referenced by job spec")]
    UnknownTarget(String),

    #[error("job input '{0}' has no data selector")]
    MissingInput(String),

    #[error("flow step '{0}' references unknown source '{1}'")]
    UnknownFlowSource(String, String),

    #[error("flow has a cyclic step dependency involving '{0}'")]
    CyclicFlow(String),

    #[error("node {node} depends on {dependency}, which does not exist in the built graph")]
    DanglingDependency { node: String, dependency: String },

    #[error("built graph contains a cycle reachable from {0}")]
    Cycle(String),
}

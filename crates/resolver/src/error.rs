//! Resolver-level errors.

use graph_model::NodeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no node function registered for node kind '{0}'")]
    UnknownKind(&'static str),

    #[error("node {0:?} is missing a required dependency result")]
    MissingResult(NodeId),

    #[error("node {0:?} produced a result that does not conform to its declared result type")]
    Nonconforming(NodeId),

    #[error("storage key '{0}' not found")]
    StorageKeyNotFound(String),

    #[error("model '{0}' could not be loaded: {1}")]
    ModelLoadFailed(String, String),
}

//! Actor-system errors.

use crate::id::ActorId;
use thiserror::Error;

/// Mirrors the source runtime's `EBadActor`: a signature/lifecycle
/// violation distinct from an ordinary handler failure.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error("actor {0:?} is not registered")]
    UnknownActor(ActorId),

    #[error("actor {0:?} received a message it has no handler arity/type for")]
    BadSignature(ActorId),

    #[error("actor {0:?} is not in a state that allows this transition")]
    IllegalState(ActorId),

    #[error("actor {0:?} failed: {1}")]
    HandlerFailed(ActorId, String),

    #[error("only self, parent, or the system actor may request a stop of {0:?}")]
    UnauthorizedStop(ActorId),
}

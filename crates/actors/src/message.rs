//! Ordinary messages and signals (spec §4.3's "ordinary vs. signal
//! messages").

use crate::error::ActorError;
use crate::id::ActorId;
use std::any::Any;
use std::sync::Arc;

/// An ordinary, application-defined message. Boxed as `Any` so the actor
/// system stays generic over every actor's own message types; `Actor::
/// on_message` is responsible for downcasting (mirrors the source
/// runtime's reflective dispatch, made explicit instead of implicit).
pub type Message = Box<dyn Any + Send>;

/// System-level signals, always delivered ahead of ordinary messages
/// addressed to the same actor and never subject to signature checking.
#[derive(Debug, Clone)]
pub enum Signal {
    Start,
    Stop { due_to_error: bool },
    Stopped { actor: ActorId },
    Failed { actor: ActorId, error: Arc<ActorError> },
}

pub(crate) enum Envelope {
    Message { target: ActorId, sender: ActorId, payload: Message },
    Signal { target: ActorId, sender: ActorId, signal: Signal },
    Spawn { id: ActorId, parent: Option<ActorId>, actor: Box<dyn crate::actor::Actor + Send> },
}

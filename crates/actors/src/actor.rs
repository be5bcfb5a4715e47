//! The `Actor` trait and the context handed to it during dispatch.

use crate::error::ActorError;
use crate::id::ActorId;
use crate::message::{Envelope, Message, Signal};
use async_trait::async_trait;
use std::any::Any;
use tokio::sync::mpsc::UnboundedSender;

/// One actor's behaviour. All methods run on the system's single dispatch
/// task: none may block, and none ever runs concurrently with another
/// actor's handler (spec §5's cooperative single-dispatch-thread model).
#[async_trait]
pub trait Actor: Send {
    /// Whether this actor can accept `msg` at all, checked before
    /// `on_message` is called (the Rust realisation of the source
    /// runtime's signature/arity check, since messages here are `Any`
    /// rather than reflectively-typed method calls).
    fn accepts(&self, _msg: &Message) -> bool {
        true
    }

    async fn on_start(&mut self, _ctx: &mut ActorContext) -> Result<(), ActorError> {
        Ok(())
    }

    async fn on_message(
        &mut self,
        ctx: &mut ActorContext,
        sender: ActorId,
        msg: Message,
    ) -> Result<(), ActorError>;

    /// Handle a signal. Returning `true` "contains" it: the system does not
    /// propagate the failure further up past this actor (spec §4.3's
    /// "parent may contain via `on_signal` returning true").
    async fn on_signal(&mut self, _ctx: &mut ActorContext, _signal: &Signal) -> Result<bool, ActorError> {
        Ok(false)
    }

    async fn on_stop(&mut self, _ctx: &mut ActorContext) {}
}

/// Handle an actor uses, during any of its callbacks, to talk back to the
/// system: send messages/signals, spawn children, or request a stop.
pub struct ActorContext {
    pub(crate) self_id: ActorId,
    pub(crate) parent_id: Option<ActorId>,
    pub(crate) sender: UnboundedSender<Envelope>,
}

impl ActorContext {
    pub fn self_id(&self) -> &ActorId {
        &self.self_id
    }

    pub fn parent_id(&self) -> Option<&ActorId> {
        self.parent_id.as_ref()
    }

    pub fn send(&self, target: ActorId, payload: impl Any + Send) {
        let _ = self.sender.send(Envelope::Message {
            target,
            sender: self.self_id.clone(),
            payload: Box::new(payload),
        });
    }

    pub fn send_signal(&self, target: ActorId, signal: Signal) {
        let _ = self.sender.send(Envelope::Signal { target, sender: self.self_id.clone(), signal });
    }

    /// Request this actor (or `target`) stop. Only self, parent, or the
    /// system actor may request another actor's stop (spec §5); the
    /// dispatch loop enforces that at delivery time.
    pub fn stop(&self, target: ActorId, due_to_error: bool) {
        self.send_signal(target, Signal::Stop { due_to_error });
    }

    pub fn stop_self(&self, due_to_error: bool) {
        self.stop(self.self_id.clone(), due_to_error);
    }

    /// Register a new child actor under this one. The dispatch loop moves
    /// it into its local table and calls `on_start` before anything else
    /// is delivered to it.
    pub fn spawn_child(&self, class_name: &str, actor: Box<dyn Actor + Send>) -> ActorId {
        let child_id = self.self_id.child(class_name);
        let _ = self.sender.send(Envelope::Spawn {
            id: child_id.clone(),
            parent: Some(self.self_id.clone()),
            actor,
        });
        child_id
    }

    /// A cheaply-cloneable handle an actor can move into work offloaded to
    /// an auxiliary pool (spec §4.3's scheduling knobs), so that work can
    /// deliver its result back as an ordinary message once it completes,
    /// without holding on to this short-lived context.
    pub fn system_handle(&self) -> SystemHandle {
        SystemHandle { sender: self.sender.clone() }
    }
}

/// See [`ActorContext::system_handle`].
#[derive(Clone)]
pub struct SystemHandle {
    sender: UnboundedSender<Envelope>,
}

impl SystemHandle {
    pub fn send(&self, target: ActorId, sender: ActorId, payload: impl Any + Send) {
        let _ = self.sender.send(Envelope::Message {
            target,
            sender,
            payload: Box::new(payload),
        });
    }
}

//! The actor system: a single dispatch task draining one shared envelope
//! queue, plus a small registry of lifecycle metadata other tasks may read
//! without going through the dispatch task itself.

use crate::actor::{Actor, ActorContext};
use crate::error::ActorError;
use crate::id::ActorId;
use crate::message::{Envelope, Message, Signal};
use crate::state::ActorState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

struct RegistryEntry {
    state: ActorState,
    parent: Option<ActorId>,
}

/// Metadata other tasks may read (`parking_lot::Mutex`-guarded, only ever
/// held for the duration of a single map operation — spec §5's "short
/// critical section... guards spawn/remove only").
#[derive(Default)]
struct Registry {
    entries: Mutex<HashMap<ActorId, RegistryEntry>>,
}

/// A cooperative actor system: every actor handler runs on the same
/// single dispatch task, so no two handlers ever run concurrently with
/// each other, matching spec §5's single-dispatch-thread model realised as
/// a single-worker `tokio` task.
pub struct ActorSystem {
    registry: Arc<Registry>,
    sender: UnboundedSender<Envelope>,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
    pending_receiver: Mutex<Option<UnboundedReceiver<Envelope>>>,
    root_id: ActorId,
}

impl ActorSystem {
    /// Construct the system and register its root actor, without starting
    /// the dispatch task yet (spec's `pre_start`/`start` split).
    pub fn pre_start(root_name: &str, root_actor: Box<dyn Actor + Send>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let root_id = ActorId::root(root_name);
        let registry = Arc::new(Registry::default());
        registry.entries.lock().insert(
            root_id.clone(),
            RegistryEntry { state: ActorState::NotStarted, parent: None },
        );

        let system = Self {
            registry: registry.clone(),
            sender: sender.clone(),
            dispatch_task: Mutex::new(None),
            pending_receiver: Mutex::new(Some(receiver)),
            root_id: root_id.clone(),
        };

        // The root actor is queued for the dispatch loop exactly like any
        // spawned child, so start-up goes through one code path.
        let _ = sender.send(Envelope::Spawn { id: root_id, parent: None, actor: root_actor });
        system
    }

    /// Start the dispatch task. If `wait` is `true`, blocks until the root
    /// actor reaches a terminal state (`Stopped`/`Failed`).
    pub async fn start(&self, wait: bool) {
        let receiver = self.pending_receiver.lock().take();
        let Some(receiver) = receiver else { return };

        let registry = self.registry.clone();
        let sender = self.sender.clone();
        let root_id = self.root_id.clone();
        let handle = tokio::spawn(run_dispatch_loop(receiver, registry, sender, root_id.clone()));
        *self.dispatch_task.lock() = Some(handle);

        if wait {
            self.wait_for(&root_id).await;
        }
    }

    /// Poll the registry until `id` reaches a terminal state. Exists for
    /// tests and `start(wait=true)`; production callers should prefer
    /// reacting to `Signal::Stopped`/`Signal::Failed` instead of polling.
    pub async fn wait_for(&self, id: &ActorId) {
        loop {
            let terminal = self
                .registry
                .entries
                .lock()
                .get(id)
                .map(|e| e.state.is_terminal())
                .unwrap_or(true);
            if terminal {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }

    pub fn state_of(&self, id: &ActorId) -> Option<ActorState> {
        self.registry.entries.lock().get(id).map(|e| e.state)
    }

    /// Stop the system: signals the root actor to stop, which cascades
    /// parent-first-into-children (spec §5: "Stop is recursive parent-
    /// first-into-children").
    pub fn stop(&self, due_to_error: bool) {
        let _ = self.sender.send(Envelope::Signal {
            target: self.root_id.clone(),
            sender: self.root_id.clone(),
            signal: Signal::Stop { due_to_error },
        });
    }

    pub fn send(&self, target: ActorId, payload: impl std::any::Any + Send) {
        let _ = self.sender.send(Envelope::Message {
            target,
            sender: self.root_id.clone(),
            payload: Box::new(payload),
        });
    }

    pub fn root_id(&self) -> &ActorId {
        &self.root_id
    }
}

async fn run_dispatch_loop(
    mut receiver: UnboundedReceiver<Envelope>,
    registry: Arc<Registry>,
    self_sender: UnboundedSender<Envelope>,
    root_id: ActorId,
) {
    let mut actors: HashMap<ActorId, Box<dyn Actor + Send>> = HashMap::new();

    while let Some(envelope) = receiver.recv().await {
        match envelope {
            Envelope::Spawn { id, parent, mut actor } => {
                registry
                    .entries
                    .lock()
                    .insert(id.clone(), RegistryEntry { state: ActorState::Starting, parent: parent.clone() });
                let mut ctx = ActorContext { self_id: id.clone(), parent_id: parent.clone(), sender: self_sender.clone() };
                match actor.on_start(&mut ctx).await {
                    Ok(()) => {
                        let _ = set_state(&registry, &id, ActorState::Running);
                        debug!(actor = %id, "START");
                        actors.insert(id, actor);
                    }
                    Err(err) => {
                        error!(actor = %id, error = %err, "FAILED during on_start");
                        let _ = set_state(&registry, &id, ActorState::Failed);
                        propagate_failure(&registry, &self_sender, &id, &parent, err);
                    }
                }
            }

            Envelope::Message { target, sender, payload } => {
                dispatch_message(&mut actors, &registry, &self_sender, target, sender, payload).await;
            }

            Envelope::Signal { target, sender, signal } => {
                dispatch_signal(&mut actors, &registry, &self_sender, target, sender, signal, &root_id).await;
            }
        }
    }
}

/// Mutate `id`'s lifecycle state, rejecting a transition `state.rs`
/// doesn't recognise instead of silently overwriting it.
fn set_state(registry: &Registry, id: &ActorId, state: ActorState) -> Result<(), ActorError> {
    let mut entries = registry.entries.lock();
    let Some(entry) = entries.get_mut(id) else {
        return Ok(());
    };
    if !entry.state.can_transition_to(state) {
        warn!(actor = %id, from = ?entry.state, to = ?state, "REJECTED illegal state transition");
        return Err(ActorError::IllegalState(id.clone()));
    }
    entry.state = state;
    Ok(())
}

fn parent_of(registry: &Registry, id: &ActorId) -> Option<ActorId> {
    registry.entries.lock().get(id).and_then(|e| e.parent.clone())
}

fn propagate_failure(
    registry: &Registry,
    sender: &UnboundedSender<Envelope>,
    id: &ActorId,
    parent: &Option<ActorId>,
    err: ActorError,
) {
    let _ = registry;
    if let Some(parent_id) = parent {
        let _ = sender.send(Envelope::Signal {
            target: parent_id.clone(),
            sender: id.clone(),
            signal: Signal::Failed { actor: id.clone(), error: Arc::new(err) },
        });
    } else {
        error!(actor = %id, error = %err, "unhandled failure at the root actor");
    }
}

async fn dispatch_message(
    actors: &mut HashMap<ActorId, Box<dyn Actor + Send>>,
    registry: &Arc<Registry>,
    self_sender: &UnboundedSender<Envelope>,
    target: ActorId,
    sender: ActorId,
    payload: Message,
) {
    let Some(actor) = actors.get_mut(&target) else {
        warn!(actor = %target, "message dropped: actor not registered");
        return;
    };
    if !actor.accepts(&payload) {
        let err = ActorError::BadSignature(target.clone());
        warn!(actor = %target, "SKIP: {err}");
        fail_actor(actors, registry, self_sender, &target, err).await;
        return;
    }
    let parent_id = parent_of(registry, &target);
    let mut ctx = ActorContext { self_id: target.clone(), parent_id, sender: self_sender.clone() };
    if let Err(err) = actor.on_message(&mut ctx, sender, payload).await {
        warn!(actor = %target, error = %err, "FAILED handling message");
        fail_actor(actors, registry, self_sender, &target, err).await;
    }
}

async fn dispatch_signal(
    actors: &mut HashMap<ActorId, Box<dyn Actor + Send>>,
    registry: &Arc<Registry>,
    self_sender: &UnboundedSender<Envelope>,
    target: ActorId,
    sender: ActorId,
    signal: Signal,
    root_id: &ActorId,
) {
    match &signal {
        Signal::Stop { due_to_error } => {
            let authorized = sender == target
                || parent_of(registry, &target).as_ref() == Some(&sender)
                || sender == *root_id;
            if !authorized {
                let err = ActorError::UnauthorizedStop(target.clone());
                warn!(actor = %target, requester = %sender, "SKIP: {err}");
                return;
            }
            stop_actor(actors, registry, self_sender, &target, *due_to_error).await;
            return;
        }
        Signal::Failed { .. } => {
            let Some(actor) = actors.get_mut(&target) else { return };
            let parent_id = parent_of(registry, &target);
            let mut ctx = ActorContext { self_id: target.clone(), parent_id, sender: self_sender.clone() };
            let contained = actor.on_signal(&mut ctx, &signal).await.unwrap_or(false);
            if !contained {
                // Uncontained failure: this actor stops too, and its own
                // parent is notified in turn.
                stop_actor(actors, registry, self_sender, &target, true).await;
            }
            return;
        }
        Signal::Stopped { .. } | Signal::Start => {
            if let Some(actor) = actors.get_mut(&target) {
                let parent_id = parent_of(registry, &target);
                let mut ctx = ActorContext { self_id: target.clone(), parent_id, sender: self_sender.clone() };
                let _ = actor.on_signal(&mut ctx, &signal).await;
            }
        }
    }
}

async fn fail_actor(
    actors: &mut HashMap<ActorId, Box<dyn Actor + Send>>,
    registry: &Arc<Registry>,
    self_sender: &UnboundedSender<Envelope>,
    id: &ActorId,
    err: ActorError,
) {
    let _ = set_state(registry, id, ActorState::Failed);
    let parent = parent_of(registry, id);
    if let Some(mut actor) = actors.remove(id) {
        let parent_id = parent.clone();
        let mut ctx = ActorContext { self_id: id.clone(), parent_id, sender: self_sender.clone() };
        actor.on_stop(&mut ctx).await;
    }
    propagate_failure(registry, self_sender, id, &parent, err);
}

/// Recursive parent-first-into-children stop: all direct children of
/// `id` are stopped before `id` itself finishes stopping.
async fn stop_actor(
    actors: &mut HashMap<ActorId, Box<dyn Actor + Send>>,
    registry: &Arc<Registry>,
    self_sender: &UnboundedSender<Envelope>,
    id: &ActorId,
    due_to_error: bool,
) {
    // Already stopping/terminal: idempotent, and nothing left to tear down.
    if set_state(registry, id, ActorState::Stopping).is_err() {
        return;
    }

    let children: Vec<ActorId> = registry
        .entries
        .lock()
        .iter()
        .filter(|(_, e)| e.parent.as_ref() == Some(id))
        .map(|(child_id, _)| child_id.clone())
        .collect();
    for child in children {
        Box::pin(stop_actor(actors, registry, self_sender, &child, due_to_error)).await;
    }

    if let Some(mut actor) = actors.remove(id) {
        let parent_id = parent_of(registry, id);
        let mut ctx = ActorContext { self_id: id.clone(), parent_id: parent_id.clone(), sender: self_sender.clone() };
        actor.on_stop(&mut ctx).await;
        let final_state = if due_to_error { ActorState::Failed } else { ActorState::Stopped };
        let _ = set_state(registry, id, final_state);
        debug!(actor = %id, stopped_due_to_error = due_to_error, "DONE");
        if let Some(parent_id) = parent_id {
            let _ = self_sender.send(Envelope::Signal {
                target: parent_id,
                sender: id.clone(),
                signal: Signal::Stopped { actor: id.clone() },
            });
        }
    }
}

//! A cooperative, single-dispatch-thread actor system (spec §4.3).
//!
//! Every actor handler runs on the same dispatch task, so handlers never
//! run concurrently with each other; ordering between any one sender and
//! target is FIFO. Actor identity is hierarchical (`ActorId`), lifecycle
//! follows a five-state-plus-`Failed` model, and an uncontained failure
//! propagates to the parent, which may contain it or itself stop.

mod actor;
mod error;
mod id;
mod message;
mod state;
mod system;

pub use actor::{Actor, ActorContext, SystemHandle};
pub use error::ActorError;
pub use id::ActorId;
pub use message::{Message, Signal};
pub use state::ActorState;
pub use system::ActorSystem;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingActor {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Actor for CountingActor {
        async fn on_message(
            &mut self,
            _ctx: &mut ActorContext,
            _sender: ActorId,
            msg: Message,
        ) -> Result<(), ActorError> {
            if msg.downcast_ref::<u32>().is_some() {
                self.count.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn messages_are_delivered_in_order() {
        let count = Arc::new(AtomicUsize::new(0));
        let system = ActorSystem::pre_start("root", Box::new(CountingActor { count: count.clone() }));
        system.start(false).await;
        let root = system.root_id().clone();
        for _ in 0..5u32 {
            system.send(root.clone(), 1u32);
        }
        // Give the dispatch task a moment to drain; production code should
        // observe completion via signals instead of sleeping.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 5);
        system.stop(false);
        system.wait_for(&root).await;
        assert_eq!(system.state_of(&root), Some(ActorState::Stopped));
    }
}

//! Hierarchical actor identity (`"/a/b-3"` style).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct ActorIdInner {
    segment: String,
    parent: Option<ActorId>,
}

/// A hierarchical actor address. Two actors started under the same parent
/// with the same class name get distinct ids via a per-class sequence
/// number suffix (`"-N"`), mirroring the source runtime's actor-id scheme.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ActorId(Arc<ActorIdInner>);

static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

impl ActorId {
    /// The id of the system's one top-level actor.
    pub fn root(name: impl Into<String>) -> Self {
        Self(Arc::new(ActorIdInner { segment: name.into(), parent: None }))
    }

    /// A fresh child id under `self`, tagged with a process-wide unique
    /// sequence number so repeated spawns of the same class never collide.
    pub fn child(&self, class_name: &str) -> Self {
        let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(Arc::new(ActorIdInner {
            segment: format!("{class_name}-{seq}"),
            parent: Some(self.clone()),
        }))
    }

    pub fn parent(&self) -> Option<&ActorId> {
        self.0.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.0.parent.is_none()
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut segments = Vec::new();
        let mut cur = Some(self);
        while let Some(id) = cur {
            segments.push(id.0.segment.as_str());
            cur = id.0.parent.as_ref();
        }
        segments.reverse();
        write!(f, "/{}", segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_ids_are_distinct_and_nest_under_parent() {
        let root = ActorId::root("system");
        let a = root.child("worker");
        let b = root.child("worker");
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(&root));
        assert!(format!("{a}").starts_with("/system/worker-"));
    }
}

//! Node identity: names, namespaces, and the declared result kind.

use std::fmt;
use std::sync::Arc;

/// A hierarchical scope used to disambiguate node names inside nested
/// sub-contexts (job, sub-flow, model).
///
/// Namespaces are built by appending to a parent, never by mutating one in
/// place, so a `NodeNamespace` can be cheaply cloned and shared across the
/// many `NodeId`s that live inside it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NodeNamespace(Arc<NamespaceInner>);

#[derive(PartialEq, Eq, Hash)]
struct NamespaceInner {
    name: String,
    parent: Option<NodeNamespace>,
}

impl NodeNamespace {
    /// The root namespace, typically the job's own namespace.
    pub fn root(name: impl Into<String>) -> Self {
        Self(Arc::new(NamespaceInner {
            name: name.into(),
            parent: None,
        }))
    }

    /// Push a new scope onto this namespace (entering a sub-flow or model).
    pub fn child(&self, name: impl Into<String>) -> Self {
        Self(Arc::new(NamespaceInner {
            name: name.into(),
            parent: Some(self.clone()),
        }))
    }

    /// The namespace one level up, if any.
    pub fn parent(&self) -> Option<&NodeNamespace> {
        self.0.parent.as_ref()
    }

    /// Scope names from innermost to outermost.
    pub fn components(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut cur = Some(self);
        while let Some(ns) = cur {
            out.push(ns.0.name.as_str());
            cur = ns.0.parent.as_ref();
        }
        out
    }
}

impl fmt::Debug for NodeNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for NodeNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self.components();
        write!(f, "{}", parts.join("/"))
    }
}

/// The runtime kind of value a node is declared to produce.
///
/// This is the concrete realisation of the spec's generic `List[T]` /
/// `Dict[K,V]` / `Optional[T]` / `Any` result-type checks: rather than a
/// reflective type system we tag each [`NodeId`] with one of these and check
/// [`crate::NodeValue`] conformance recursively for the container kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResultKind {
    /// A single scalar JSON value.
    Scalar,
    /// A homogeneous list of the given element kind.
    List(Box<ResultKind>),
    /// A map keyed by string with the given value kind.
    Map(Box<ResultKind>),
    /// A bundle of named results, e.g. a context-push/pop payload.
    Bundle,
    /// May be absent.
    Optional(Box<ResultKind>),
    /// No constraint checked at runtime.
    Any,
    /// Produces no value (side-effecting nodes such as `SaveData`).
    Unit,
}

/// Identity of a node: `(name, namespace, result_type)`.
///
/// Two node IDs are equal iff `(name, namespace)` match; `result_type` is
/// descriptive only — it drives runtime type checks but never participates
/// in equality or hashing, matching the spec's identity rule exactly.
#[derive(Clone)]
pub struct NodeId {
    name: Arc<str>,
    namespace: NodeNamespace,
    result_type: ResultKind,
}

impl NodeId {
    /// Construct a node id in the given namespace with a declared result kind.
    pub fn new(name: impl Into<Arc<str>>, namespace: NodeNamespace, result_type: ResultKind) -> Self {
        Self {
            name: name.into(),
            namespace,
            result_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &NodeNamespace {
        &self.namespace
    }

    pub fn result_type(&self) -> &ResultKind {
        &self.result_type
    }

    /// A virtual sibling node inside the same namespace, used for bundle
    /// children exposed by a `bundle_result` node.
    pub fn sibling(&self, name: impl Into<Arc<str>>, result_type: ResultKind) -> Self {
        Self::new(name, self.namespace.clone(), result_type)
    }
}

impl PartialEq for NodeId {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.namespace == other.namespace
    }
}

impl Eq for NodeId {}

impl std::hash::Hash for NodeId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.namespace.hash(state);
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.namespace)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.name, self.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_result_type() {
        let ns = NodeNamespace::root("job1");
        let a = NodeId::new("x", ns.clone(), ResultKind::Scalar);
        let b = NodeId::new("x", ns, ResultKind::Any);
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_namespaces_are_distinct_ids() {
        let root = NodeNamespace::root("job1");
        let inner = root.child("flow_step_a");
        let a = NodeId::new("x", root, ResultKind::Scalar);
        let b = NodeId::new("x", inner, ResultKind::Scalar);
        assert_ne!(a, b);
    }

    #[test]
    fn namespace_components_innermost_first() {
        let root = NodeNamespace::root("job1");
        let inner = root.child("sub_flow").child("model_a");
        assert_eq!(inner.components(), vec!["model_a", "sub_flow", "job1"]);
    }
}

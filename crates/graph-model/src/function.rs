//! The seam between the data model and the resolver/engine layers.
//!
//! [`NodeFunction`] is the executable body bound to a node by the function
//! resolver; [`NodeContext`] is the read-only view of completed results a
//! node function is given; [`GraphUpdateSink`] is the callback a node
//! function uses to request dynamic graph updates (spec §4.4, used by
//! `RunModel` to register dynamic outputs).
//!
//! Both traits live in this crate rather than in `resolver`/`engine` so that
//! `resolver` can depend on `graph-model` alone while `engine` supplies the
//! concrete [`NodeContext`] implementation — avoiding a dependency cycle
//! between the two.

use crate::dependency::DependencyType;
use crate::id::NodeId;
use crate::node::Node;
use crate::value::NodeValue;
use async_trait::async_trait;
use std::error::Error as StdError;

/// Boxed error type node functions return, mirroring the teacher's
/// `NodeExecutor` signature: node functions are free to wrap any underlying
/// error (storage, model execution, conformance) behind this.
pub type NodeFunctionError = Box<dyn StdError + Send + Sync>;

/// A read-only view of completed node results available while evaluating
/// one node.
pub trait NodeContext: Send + Sync {
    /// Look up a dependency's result. Implementations must assert the id
    /// exists, the node is complete and not errored, and the result
    /// conforms to the id's declared result type — any violation is an
    /// internal bug the engine's invariants are meant to prevent.
    fn lookup(&self, id: &NodeId) -> Result<NodeValue, crate::GraphError>;
}

/// Callback through which a node function may enqueue new nodes and
/// dependency edges into the owning job's graph before its success message
/// is processed.
pub trait GraphUpdateSink: Send + Sync {
    fn add_node(&self, node: Node);
    fn add_dependency(&self, dependent: NodeId, dependency: NodeId, kind: DependencyType);
}

/// The executable body bound to a single node.
///
/// Node functions are stateless with respect to the context: they must not
/// mutate it, and must return a value whose runtime kind matches the
/// declaring node id's result type (checked by the caller via
/// [`NodeValue::conforms_to`](crate::NodeValue::conforms_to)).
#[async_trait]
pub trait NodeFunction: Send + Sync {
    async fn call(
        &self,
        ctx: &dyn NodeContext,
        updates: &dyn GraphUpdateSink,
    ) -> Result<NodeValue, NodeFunctionError>;
}

//! Core data model for the execution graph.
//!
//! This crate defines the types shared by every other component of the
//! execution core: node identity, dependency edges, the closed set of node
//! kinds a job specification can lower into, and the runtime records the
//! scheduler mutates while a job is in flight.
//!
//! Nothing in this crate performs I/O or scheduling. It is pure data plus the
//! small amount of logic needed to keep that data internally consistent
//! (equality, hashing, runtime type conformance).
//!
//! # Layering
//!
//! ```text
//! graph-model  (this crate)
//!     ^
//!     | node / dependency / value types
//!     |
//! graph-builder --- resolver --- actors --- engine
//! ```
//!
//! # See also
//!
//! - [`NodeId`] / [`NodeNamespace`] — node identity
//! - [`DependencyType`] — edge semantics
//! - [`NodeKind`] — the closed set of node payloads
//! - [`EngineContext`] — the scheduler's live state for one job

mod context;
mod dependency;
mod error;
mod function;
mod id;
mod node;
mod value;

pub use context::{EngineContext, EngineNode};
pub use dependency::DependencyType;
pub use error::{GraphError, NodeError};
pub use function::{GraphUpdateSink, NodeContext, NodeFunction, NodeFunctionError};
pub use id::{NodeId, NodeNamespace, ResultKind};
pub use node::{
    bundle_child_name, BundleMarker, ImportDetails, ModelDef, Node, NodeKind, ResultFormat,
    ResultSink, Schema,
};
pub use value::NodeValue;

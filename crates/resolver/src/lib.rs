//! Binds graph nodes to executable node functions (spec §4.2).
//!
//! This crate depends on `graph-model` alone: the `NodeContext`/
//! `NodeFunction`/`GraphUpdateSink` traits a resolved function is built
//! against live there, so `engine` (which implements `NodeContext`) never
//! has to depend back on this crate.

mod error;
mod functions;
mod resolve;
mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::ResolveError;
pub use functions::{
    BuildJobResultFunction, BundleItemFunction, ContextPopFunction, ContextPushFunction,
    DataItemFunction, DataViewFunction, DynamicDataSpecFunction, IdentityFunction,
    ImportModelFunction, KeyedItemFunction, LoadDataFunction, NoopFunction, RunModelFunction,
    SaveDataFunction, SaveJobResultFunction, StaticValueFunction,
};
pub use resolve::FunctionResolver;
pub use traits::{FileStat, ModelLoader, RunnableModel, Storage, StorageFormat};

//! Narrow trait surfaces the resolver's external-resource node functions
//! close over (spec §6), modelled on the teacher's `#[async_trait] pub trait
//! Store` in `store.rs`: a small, fully async, `Send + Sync` interface with
//! no assumption about the backend behind it.

use async_trait::async_trait;
use graph_model::{ImportDetails, ModelDef, NodeValue};
use std::collections::HashMap;

/// Metadata about an existing storage entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FileStat {
    pub size: u64,
    pub is_dir: bool,
}

/// Where and in what format a data item lives or will be written.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageFormat(pub String);

/// Storage surface the core consumes: file/byte access plus a minimal
/// tabular read/write path (`NodeValue::List` of `NodeValue::Map` rows)
/// sufficient for `LoadData`/`SaveData`/`DynamicDataSpec` node functions.
/// Columnar encodings, partitioning and the full TRAC schema language stay
/// outside the core (non-goal).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Resolve which backing store a file-type storage key names.
    async fn get_file_storage(&self, storage_key: &str) -> Result<(), crate::ResolveError>;

    /// Resolve which backing store a data-type storage key names.
    async fn get_data_storage(&self, storage_key: &str) -> Result<(), crate::ResolveError>;

    async fn read_table(&self, storage_key: &str, path: &str) -> Result<NodeValue, crate::ResolveError>;

    async fn write_table(
        &self,
        storage_key: &str,
        path: &str,
        data: &NodeValue,
    ) -> Result<(), crate::ResolveError>;

    async fn read_bytes(&self, storage_key: &str, path: &str) -> Result<Vec<u8>, crate::ResolveError>;

    async fn write_bytes(
        &self,
        storage_key: &str,
        path: &str,
        data: &[u8],
    ) -> Result<(), crate::ResolveError>;

    async fn stat(&self, storage_key: &str, path: &str) -> Result<FileStat, crate::ResolveError>;

    async fn exists(&self, storage_key: &str, path: &str) -> Result<bool, crate::ResolveError>;

    async fn mkdir(&self, storage_key: &str, path: &str) -> Result<(), crate::ResolveError>;

    async fn rm(&self, storage_key: &str, path: &str) -> Result<(), crate::ResolveError>;

    async fn ls(&self, storage_key: &str, path: &str) -> Result<Vec<String>, crate::ResolveError>;

    fn default_storage_key(&self) -> &str;

    fn default_storage_format(&self) -> StorageFormat;
}

/// Model-loading surface the core consumes. `load_model_class` returns a
/// [`RunnableModel`] bound to one model scope; `scan_model` discovers a
/// model's declared parameter/input/output shape without running it.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn create_scope(&self, model_scope: &str) -> Result<(), crate::ResolveError>;

    async fn destroy_scope(&self, model_scope: &str) -> Result<(), crate::ResolveError>;

    async fn load_model_class(
        &self,
        model_scope: &str,
        model_def: &ModelDef,
    ) -> Result<std::sync::Arc<dyn RunnableModel>, crate::ResolveError>;

    async fn scan_model(
        &self,
        model_scope: &str,
        import: &ImportDetails,
    ) -> Result<ModelDef, crate::ResolveError>;

    /// Scratch directory checked out for a model scope's imports, if any
    /// (spec's `(ADDED)` scratch-directory mechanism is realised one layer
    /// up, by `engine::JobProcessor`'s `tempfile::TempDir`; this reports the
    /// sub-path a given scope was checked out to, if the loader keeps one).
    async fn model_load_checkout_directory(
        &self,
        model_scope: &str,
    ) -> Result<Option<String>, crate::ResolveError>;
}

/// A model bound and ready to run inside one scope.
#[async_trait]
pub trait RunnableModel: Send + Sync {
    async fn run_model(
        &self,
        parameters: &HashMap<String, NodeValue>,
        inputs: &HashMap<String, NodeValue>,
    ) -> Result<HashMap<String, NodeValue>, crate::ResolveError>;
}

//! In-memory `Storage`/`ModelLoader` implementations used only by tests
//! (spec's `(ADDED)` note: "never a real backend"). Kept in the library so
//! both unit tests here and `engine`'s integration suite can share them.

use crate::traits::{FileStat, ModelLoader, RunnableModel, Storage, StorageFormat};
use crate::ResolveError;
use async_trait::async_trait;
use graph_model::{ImportDetails, ModelDef, NodeValue};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

fn key(storage_key: &str, path: &str) -> String {
    format!("{storage_key}:{path}")
}

/// A storage backend that keeps every table and byte blob in a `Mutex`-
/// guarded map. Deterministic, process-local, never touches disk.
#[derive(Default)]
pub struct InMemoryStorage {
    tables: Mutex<HashMap<String, NodeValue>>,
    bytes: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table before a job runs, standing in for data the caller
    /// already materialised outside the core.
    pub fn seed_table(&self, storage_key: &str, path: &str, value: NodeValue) {
        self.tables.lock().insert(key(storage_key, path), value);
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_file_storage(&self, _storage_key: &str) -> Result<(), ResolveError> {
        Ok(())
    }

    async fn get_data_storage(&self, _storage_key: &str) -> Result<(), ResolveError> {
        Ok(())
    }

    async fn read_table(&self, storage_key: &str, path: &str) -> Result<NodeValue, ResolveError> {
        self.tables
            .lock()
            .get(&key(storage_key, path))
            .cloned()
            .ok_or_else(|| ResolveError::StorageKeyNotFound(key(storage_key, path)))
    }

    async fn write_table(
        &self,
        storage_key: &str,
        path: &str,
        data: &NodeValue,
    ) -> Result<(), ResolveError> {
        self.tables.lock().insert(key(storage_key, path), data.clone());
        Ok(())
    }

    async fn read_bytes(&self, storage_key: &str, path: &str) -> Result<Vec<u8>, ResolveError> {
        self.bytes
            .lock()
            .get(&key(storage_key, path))
            .cloned()
            .ok_or_else(|| ResolveError::StorageKeyNotFound(key(storage_key, path)))
    }

    async fn write_bytes(
        &self,
        storage_key: &str,
        path: &str,
        data: &[u8],
    ) -> Result<(), ResolveError> {
        self.bytes.lock().insert(key(storage_key, path), data.to_vec());
        Ok(())
    }

    async fn stat(&self, storage_key: &str, path: &str) -> Result<FileStat, ResolveError> {
        let k = key(storage_key, path);
        if let Some(t) = self.tables.lock().get(&k) {
            return Ok(FileStat { size: estimate_size(t), is_dir: false });
        }
        if let Some(b) = self.bytes.lock().get(&k) {
            return Ok(FileStat { size: b.len() as u64, is_dir: false });
        }
        Err(ResolveError::StorageKeyNotFound(k))
    }

    async fn exists(&self, storage_key: &str, path: &str) -> Result<bool, ResolveError> {
        let k = key(storage_key, path);
        Ok(self.tables.lock().contains_key(&k) || self.bytes.lock().contains_key(&k))
    }

    async fn mkdir(&self, _storage_key: &str, _path: &str) -> Result<(), ResolveError> {
        Ok(())
    }

    async fn rm(&self, storage_key: &str, path: &str) -> Result<(), ResolveError> {
        let k = key(storage_key, path);
        self.tables.lock().remove(&k);
        self.bytes.lock().remove(&k);
        Ok(())
    }

    async fn ls(&self, storage_key: &str, path: &str) -> Result<Vec<String>, ResolveError> {
        let prefix = key(storage_key, path);
        Ok(self
            .tables
            .lock()
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect())
    }

    fn default_storage_key(&self) -> &str {
        "memory"
    }

    fn default_storage_format(&self) -> StorageFormat {
        StorageFormat("json".to_string())
    }
}

fn estimate_size(value: &NodeValue) -> u64 {
    match value {
        NodeValue::List(items) => items.len() as u64,
        _ => 1,
    }
}

/// An identity model: returns its inputs unchanged under their output
/// names, so tests can assert data flowed through a job without needing a
/// real model runtime.
pub struct IdentityModel {
    pub output_names: Vec<String>,
}

#[async_trait]
impl RunnableModel for IdentityModel {
    async fn run_model(
        &self,
        parameters: &HashMap<String, NodeValue>,
        inputs: &HashMap<String, NodeValue>,
    ) -> Result<HashMap<String, NodeValue>, ResolveError> {
        let mut outputs = HashMap::new();
        for name in &self.output_names {
            let value = inputs
                .values()
                .next()
                .cloned()
                .or_else(|| parameters.values().next().cloned())
                .unwrap_or(NodeValue::Unit);
            outputs.insert(name.clone(), value);
        }
        Ok(outputs)
    }
}

/// A model that always returns a fixed, caller-supplied output map,
/// independent of its `ModelDef`'s declared outputs — lets tests drive a
/// model that omits a declared output, or reports one beyond the
/// declared set, neither of which `IdentityModel` can express.
pub struct ScriptedModel {
    pub outputs: HashMap<String, NodeValue>,
}

#[async_trait]
impl RunnableModel for ScriptedModel {
    async fn run_model(
        &self,
        _parameters: &HashMap<String, NodeValue>,
        _inputs: &HashMap<String, NodeValue>,
    ) -> Result<HashMap<String, NodeValue>, ResolveError> {
        Ok(self.outputs.clone())
    }
}

/// A model loader that hands out [`ScriptedModel`] regardless of which
/// model is requested, for tests that need to script the exact output map
/// a model run produces.
pub struct ScriptedModelLoader {
    outputs: HashMap<String, NodeValue>,
}

impl ScriptedModelLoader {
    pub fn new(outputs: HashMap<String, NodeValue>) -> Self {
        Self { outputs }
    }
}

#[async_trait]
impl ModelLoader for ScriptedModelLoader {
    async fn create_scope(&self, _model_scope: &str) -> Result<(), ResolveError> {
        Ok(())
    }

    async fn destroy_scope(&self, _model_scope: &str) -> Result<(), ResolveError> {
        Ok(())
    }

    async fn load_model_class(
        &self,
        _model_scope: &str,
        _model_def: &ModelDef,
    ) -> Result<Arc<dyn RunnableModel>, ResolveError> {
        Ok(Arc::new(ScriptedModel { outputs: self.outputs.clone() }))
    }

    async fn scan_model(
        &self,
        _model_scope: &str,
        import: &ImportDetails,
    ) -> Result<ModelDef, ResolveError> {
        Err(ResolveError::ModelLoadFailed(import.entry_point.clone(), "scan not supported by ScriptedModelLoader".into()))
    }

    async fn model_load_checkout_directory(
        &self,
        _model_scope: &str,
    ) -> Result<Option<String>, ResolveError> {
        Ok(None)
    }
}

/// A model loader that never checks anything out: every model resolves to
/// an [`IdentityModel`] built from the `ModelDef` the caller already
/// supplied, and `scan_model` echoes back a fixed, caller-seeded shape.
pub struct StubModelLoader {
    scans: Mutex<HashMap<String, ModelDef>>,
}

impl StubModelLoader {
    pub fn new() -> Self {
        Self { scans: Mutex::new(HashMap::new()) }
    }

    pub fn seed_scan(&self, import_entry_point: &str, model_def: ModelDef) {
        self.scans.lock().insert(import_entry_point.to_string(), model_def);
    }
}

impl Default for StubModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelLoader for StubModelLoader {
    async fn create_scope(&self, _model_scope: &str) -> Result<(), ResolveError> {
        Ok(())
    }

    async fn destroy_scope(&self, _model_scope: &str) -> Result<(), ResolveError> {
        Ok(())
    }

    async fn load_model_class(
        &self,
        _model_scope: &str,
        model_def: &ModelDef,
    ) -> Result<Arc<dyn RunnableModel>, ResolveError> {
        let output_names = model_def.outputs.iter().map(|(n, _)| n.clone()).collect();
        Ok(Arc::new(IdentityModel { output_names }))
    }

    async fn scan_model(
        &self,
        _model_scope: &str,
        import: &ImportDetails,
    ) -> Result<ModelDef, ResolveError> {
        self.scans
            .lock()
            .get(&import.entry_point)
            .cloned()
            .ok_or_else(|| ResolveError::ModelLoadFailed(import.entry_point.clone(), "no scan seeded".into()))
    }

    async fn model_load_checkout_directory(
        &self,
        _model_scope: &str,
    ) -> Result<Option<String>, ResolveError> {
        Ok(None)
    }
}

//! Per-job document persistence.
//!
//! Layout on disk: `<root>/training/<job_id>/{local_training,federated_training,model}.json`.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::documents::{DocumentKind, JobId};
use crate::error::StoreError;
use crate::metrics::record_store_error;

/// Durable key-value store of job documents. Concurrent writers are last-write-wins.
pub trait ConfigStore: Send + Sync {
    fn put(&self, job_id: &JobId, kind: DocumentKind, document: &Value) -> Result<(), StoreError>;
    fn get(&self, job_id: &JobId, kind: DocumentKind) -> Result<Value, StoreError>;
    /// Delete a document if present.
    fn remove(&self, job_id: &JobId, kind: DocumentKind) -> Result<(), StoreError>;
}

pub struct FsConfigStore {
    root: PathBuf,
}

impl FsConfigStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self { root: data_dir.as_ref().join("training") }
    }

    pub fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.root.join(job_id.as_str())
    }

    pub fn document_path(&self, job_id: &JobId, kind: DocumentKind) -> PathBuf {
        self.job_dir(job_id).join(kind.file_name())
    }
}

fn persistence(path: &Path, source: io::Error) -> StoreError {
    StoreError::Persistence { path: path.to_path_buf(), source }
}

/// Serialize with 4-space indentation, matching documents written by existing clients.
fn encode(document: &Value) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    serde::Serialize::serialize(document, &mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Write to a hidden sibling unique to this call, then rename it over `path`.
/// The sibling is removed if any step fails.
fn write_atomic(path: &Path, document: &Value) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir).map_err(|e| persistence(dir, e))?;
    let bytes = encode(document).map_err(|source| StoreError::Serialization { path: path.to_path_buf(), source })?;
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("document");
    let tmp = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4()));
    let written = fs::File::create(&tmp)
        .and_then(|mut file| file.write_all(&bytes).and_then(|_| file.sync_all()))
        .map_err(|e| persistence(&tmp, e))
        .and_then(|_| fs::rename(&tmp, path).map_err(|e| persistence(path, e)));
    if written.is_err() {
        if let Err(e) = fs::remove_file(&tmp) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %tmp.display(), error = %e, "temp_file_cleanup_failed");
            }
        }
    }
    written
}

impl ConfigStore for FsConfigStore {
    fn put(&self, job_id: &JobId, kind: DocumentKind, document: &Value) -> Result<(), StoreError> {
        let path = self.document_path(job_id, kind);
        match write_atomic(&path, document) {
            Ok(()) => {
                info!(job_id = %job_id, path = %path.display(), "saved_file");
                Ok(())
            }
            Err(e) => {
                record_store_error("put");
                Err(e)
            }
        }
    }

    fn get(&self, job_id: &JobId, kind: DocumentKind) -> Result<Value, StoreError> {
        let path = self.document_path(job_id, kind);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound { job_id: job_id.to_string(), document: kind.name() });
            }
            Err(e) => {
                record_store_error("get");
                return Err(persistence(&path, e));
            }
        };
        debug!(job_id = %job_id, path = %path.display(), "loaded_file");
        serde_json::from_slice(&bytes).map_err(|source| {
            record_store_error("get");
            StoreError::Serialization { path, source }
        })
    }

    fn remove(&self, job_id: &JobId, kind: DocumentKind) -> Result<(), StoreError> {
        let path = self.document_path(job_id, kind);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(job_id = %job_id, path = %path.display(), "removed_file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                record_store_error("remove");
                Err(persistence(&path, e))
            }
        }
    }
}

/// In-process store for tests and embedders that do not need durability.
#[derive(Default)]
pub struct MemoryConfigStore {
    documents: RwLock<HashMap<(JobId, DocumentKind), Value>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn put(&self, job_id: &JobId, kind: DocumentKind, document: &Value) -> Result<(), StoreError> {
        self.documents.write().insert((job_id.clone(), kind), document.clone());
        Ok(())
    }

    fn get(&self, job_id: &JobId, kind: DocumentKind) -> Result<Value, StoreError> {
        self.documents
            .read()
            .get(&(job_id.clone(), kind))
            .cloned()
            .ok_or_else(|| StoreError::NotFound { job_id: job_id.to_string(), document: kind.name() })
    }

    fn remove(&self, job_id: &JobId, kind: DocumentKind) -> Result<(), StoreError> {
        self.documents.write().remove(&(job_id.clone(), kind));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryConfigStore::new();
        let job = JobId::new("test").unwrap();
        assert!(store.get(&job, DocumentKind::Model).unwrap_err().is_not_found());
        store.put(&job, DocumentKind::Model, &json!({"w": [1.0]})).unwrap();
        store.put(&job, DocumentKind::Model, &json!({"w": [2.0]})).unwrap();
        assert_eq!(store.get(&job, DocumentKind::Model).unwrap(), json!({"w": [2.0]}));
        assert_eq!(store.len(), 1);
        store.remove(&job, DocumentKind::Model).unwrap();
        store.remove(&job, DocumentKind::Model).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn encode_uses_four_space_indent() {
        let text = String::from_utf8(encode(&json!({"lr": 0.5})).unwrap()).unwrap();
        assert_eq!(text, "{\n    \"lr\": 0.5\n}\n");
    }
}

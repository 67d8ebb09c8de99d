//! Filesystem store behaviour against a throwaway data directory.
use std::path::PathBuf;

use serde_json::json;
use trainer_core::{ConfigStore, DocumentKind, FsConfigStore, JobId, ModelStateChecker};

struct TempDir(PathBuf);

impl TempDir {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("trainer-core-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path).expect("create temp dir");
        Self(path)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn job(id: &str) -> JobId {
    JobId::new(id).expect("valid job id")
}

#[test]
fn put_then_get_returns_document() {
    let dir = TempDir::new();
    let store = FsConfigStore::new(&dir.0);
    let local = json!({"lr": 1e-6, "batch_size": 512, "rounds": 10, "patience": 10});
    store.put(&job("test"), DocumentKind::LocalTraining, &local).unwrap();
    assert_eq!(store.get(&job("test"), DocumentKind::LocalTraining).unwrap(), local);
}

#[test]
fn documents_land_under_training_job_dir() {
    let dir = TempDir::new();
    let store = FsConfigStore::new(&dir.0);
    let federated = json!({"job_id": "test", "rounds": 100, "input": ["weights"], "return": ["weights"]});
    store.put(&job("test"), DocumentKind::FederatedTraining, &federated).unwrap();

    let path = dir.0.join("training").join("test").join("federated_training.json");
    assert_eq!(store.document_path(&job("test"), DocumentKind::FederatedTraining), path);
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("{\n    \"job_id\": \"test\",\n    \"rounds\": 100,"), "{text}");
    // key order is preserved on disk
    let keys: Vec<_> = ["job_id", "rounds", "input", "return"].iter().map(|k| text.find(k).unwrap()).collect();
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn missing_document_is_not_found() {
    let dir = TempDir::new();
    let store = FsConfigStore::new(&dir.0);
    let err = store.get(&job("nope"), DocumentKind::Model).unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("nope"));
}

#[test]
fn overwrite_replaces_previous_document() {
    let dir = TempDir::new();
    let store = FsConfigStore::new(&dir.0);
    store.put(&job("test"), DocumentKind::LocalTraining, &json!({"lr": 0.1, "momentum": 0.9})).unwrap();
    store.put(&job("test"), DocumentKind::LocalTraining, &json!({"lr": 0.2})).unwrap();
    assert_eq!(store.get(&job("test"), DocumentKind::LocalTraining).unwrap(), json!({"lr": 0.2}));
    assert!(temp_files(&store.job_dir(&job("test"))).is_empty());
}

#[test]
fn remove_is_idempotent() {
    let dir = TempDir::new();
    let store = FsConfigStore::new(&dir.0);
    store.put(&job("test"), DocumentKind::Model, &json!({"w": {"shape": [2], "dtype": "float32"}})).unwrap();
    store.remove(&job("test"), DocumentKind::Model).unwrap();
    store.remove(&job("test"), DocumentKind::Model).unwrap();
    assert!(store.get(&job("test"), DocumentKind::Model).unwrap_err().is_not_found());
}

#[test]
fn corrupt_file_reports_serialization_error() {
    let dir = TempDir::new();
    let store = FsConfigStore::new(&dir.0);
    let path = store.document_path(&job("test"), DocumentKind::LocalTraining);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{not json").unwrap();
    let err = store.get(&job("test"), DocumentKind::LocalTraining).unwrap_err();
    assert!(matches!(err, trainer_core::StoreError::Serialization { .. }), "{err}");
}

#[test]
fn checker_built_from_stored_documents_accepts_matching_payload() {
    let dir = TempDir::new();
    let store = FsConfigStore::new(&dir.0);
    let id = job("test");
    store.put(&id, DocumentKind::LocalTraining, &json!({"lr": 1e-6, "rounds": 10})).unwrap();
    store.put(&id, DocumentKind::Model, &json!({"fc.weight": {"shape": [2, 3], "dtype": "float32"}})).unwrap();

    let checker = ModelStateChecker::from_documents(
        store.get(&id, DocumentKind::LocalTraining).unwrap(),
        &store.get(&id, DocumentKind::Model).unwrap(),
    )
    .unwrap();
    let payload = json!({"local": {"lr": 1e-6}, "model": {"fc.weight": [[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]}});
    assert!(checker.verify(&payload).is_ok());
    let bad = json!({"local": {"lr": 1e-6}, "model": {"fc.weight": [[0.1, 0.2], [0.4, 0.5]]}});
    assert!(checker.verify(&bad).is_err());
}

fn temp_files(dir: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect()
}

#[test]
fn concurrent_puts_to_same_document_all_succeed() {
    let dir = TempDir::new();
    let store = std::sync::Arc::new(FsConfigStore::new(&dir.0));
    let id = job("test");
    for round in 0..10 {
        let handles: Vec<_> = (0..8)
            .map(|writer| {
                let store = store.clone();
                let id = id.clone();
                std::thread::spawn(move || {
                    let doc = json!({"w": vec![0.12_f64; 20_000], "writer": writer, "round": round});
                    store.put(&id, DocumentKind::Model, &doc)
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread").expect("concurrent put");
        }
        let stored = store.get(&id, DocumentKind::Model).expect("document parses");
        assert_eq!(stored["round"], round);
    }
    assert!(temp_files(&store.job_dir(&id)).is_empty());
}

#[test]
fn failed_write_keeps_previous_documents_and_leaves_no_temp_file() {
    let dir = TempDir::new();
    let store = FsConfigStore::new(&dir.0);
    let id = job("test");
    let local = json!({"lr": 1e-6});
    store.put(&id, DocumentKind::LocalTraining, &local).unwrap();

    // a non-empty directory where model.json belongs makes the final rename fail
    let blocked = store.document_path(&id, DocumentKind::Model);
    std::fs::create_dir_all(blocked.join("occupied")).unwrap();

    let err = store.put(&id, DocumentKind::Model, &json!({"w": [1.0]})).unwrap_err();
    assert!(matches!(err, trainer_core::StoreError::Persistence { .. }), "{err}");
    assert!(temp_files(&store.job_dir(&id)).is_empty());
    assert_eq!(store.get(&id, DocumentKind::LocalTraining).unwrap(), local);
}

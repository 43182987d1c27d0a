//! Orchestrator Integration Tests
//!
//! End-to-end flows: download then rescan, annotations, deletion.

use std::path::Path;
use std::sync::Arc;

use modelshelf::adapters::HubClient;
use modelshelf::core::{Orchestrator, OrchestratorError};
use modelshelf::library::{DocumentLookup, MetadataDocument, MetadataStore};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_for(temp_dir: &TempDir) -> MetadataStore {
    let document = MetadataDocument {
        comfy_models_dir: temp_dir.path().join("models").to_string_lossy().into_owned(),
        app_data_dir: temp_dir.path().join("data").to_string_lossy().into_owned(),
        ..Default::default()
    };
    MetadataStore::new(temp_dir.path().join("config.json"), document)
}

async fn orchestrator_for(temp_dir: &TempDir, server: &MockServer) -> Orchestrator {
    let hub = HubClient::new(server.uri()).unwrap();
    let mut orchestrator = Orchestrator::new(store_for(temp_dir), Arc::new(hub));
    orchestrator.refresh().await;
    orchestrator
}

fn write_file(path: &Path, content: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

async fn mount_repo(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/user/repo/resolve/main/model.safetensors"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"weights".to_vec()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/models/user/repo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "siblings": [{"rfilename": "model.safetensors"}, {"rfilename": "README.md"}]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/repo/resolve/main/README.md"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# Card"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_download_records_provenance_and_rescans() {
    let server = MockServer::start().await;
    mount_repo(&server).await;
    let temp_dir = TempDir::new().unwrap();
    let mut orchestrator = orchestrator_for(&temp_dir, &server).await;
    assert!(orchestrator.catalog().is_empty());

    let request = orchestrator
        .prepare_download("user/repo", "model.safetensors", "loras", "SDXL")
        .unwrap();
    let mut updates = 0;
    let outcome = orchestrator.download(request, |_| updates += 1).await.unwrap();

    assert!(outcome.success());
    assert!(updates > 0);

    let artifact = orchestrator
        .artifact("loras/SDXL/model.safetensors")
        .expect("artifact visible after rescan");
    assert_eq!(artifact.origin_repo, "user/repo");
    assert_eq!(artifact.origin_filename, "model.safetensors");
    assert_eq!(artifact.size_bytes, 7);
    assert_eq!(orchestrator.browse("loras", "SDXL").len(), 1);

    // Provenance is persisted
    let reloaded = MetadataStore::load(temp_dir.path().join("config.json")).unwrap();
    let record = reloaded.record("loras/SDXL/model.safetensors").unwrap();
    assert_eq!(record.origin_repo.as_deref(), Some("user/repo"));
    assert!(record.created_at.is_some());

    match orchestrator.document_for(artifact) {
        DocumentLookup::Found(path) => {
            assert_eq!(std::fs::read_to_string(path).unwrap(), "# Card");
        }
        other => panic!("expected document, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_download_records_nothing() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let mut orchestrator = orchestrator_for(&temp_dir, &server).await;

    let request = orchestrator
        .prepare_download("user/missing", "model.safetensors", "loras", "SDXL")
        .unwrap();
    let outcome = orchestrator.download(request, |_| {}).await.unwrap();

    assert!(!outcome.success());
    assert!(orchestrator.store().records().is_empty());
    assert!(orchestrator.catalog().is_empty());
}

#[tokio::test]
async fn test_prepare_download_validates_input() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let orchestrator = orchestrator_for(&temp_dir, &server).await;

    assert!(matches!(
        orchestrator.prepare_download("  ", "model.bin", "loras", "SDXL"),
        Err(OrchestratorError::InvalidRequest(_))
    ));
    assert!(matches!(
        orchestrator.prepare_download("user/repo", "model.bin", "unknown", "SDXL"),
        Err(OrchestratorError::InvalidRequest(_))
    ));
    assert!(matches!(
        orchestrator.prepare_download("user/repo", "model.bin", "loras", ""),
        Err(OrchestratorError::InvalidRequest(_))
    ));

    let request = orchestrator
        .prepare_download(" user/repo ", "model.bin", "loras", "SDXL")
        .unwrap();
    assert_eq!(request.origin_repo, "user/repo");
    assert_eq!(request.target_dir, temp_dir.path().join("models/loras/SDXL"));
    assert_eq!(request.document_root(), temp_dir.path().join("data/readmes"));

    // No requests reached the hub
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_prepare_download_requires_root() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let store = MetadataStore::new(
        temp_dir.path().join("config.json"),
        MetadataDocument {
            app_data_dir: temp_dir.path().join("data").to_string_lossy().into_owned(),
            ..Default::default()
        },
    );
    let hub = HubClient::new(server.uri()).unwrap();
    let orchestrator = Orchestrator::new(store, Arc::new(hub));

    assert!(matches!(
        orchestrator.prepare_download("user/repo", "model.bin", "loras", "SDXL"),
        Err(OrchestratorError::RootNotConfigured)
    ));
}

#[tokio::test]
async fn test_import_preview_deduplicates_by_content() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    write_file(&temp_dir.path().join("models/loras/SDXL/a.safetensors"), b"a");
    write_file(&temp_dir.path().join("models/loras/SDXL/b.safetensors"), b"b");
    write_file(&temp_dir.path().join("img/one.png"), b"same image");
    write_file(&temp_dir.path().join("img/two.png"), b"same image");

    let mut orchestrator = orchestrator_for(&temp_dir, &server).await;
    orchestrator
        .save_notes("loras/SDXL/a.safetensors", "  keep me  ")
        .await
        .unwrap();

    let first = orchestrator
        .import_preview("loras/SDXL/a.safetensors", &temp_dir.path().join("img/one.png"))
        .await
        .unwrap();
    let second = orchestrator
        .import_preview("loras/SDXL/b.safetensors", &temp_dir.path().join("img/two.png"))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert!(first.starts_with(temp_dir.path().join("data/previews")));
    assert_eq!(
        std::fs::read_dir(temp_dir.path().join("data/previews"))
            .unwrap()
            .count(),
        1
    );

    let a = orchestrator.artifact("loras/SDXL/a.safetensors").unwrap();
    assert_eq!(a.preview_path, first.to_string_lossy());
    assert_eq!(a.notes, "keep me");
}

#[tokio::test]
async fn test_delete_artifact_removes_file_and_record() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("models/vae/SD15/v.pt");
    write_file(&file, b"v");

    let mut orchestrator = orchestrator_for(&temp_dir, &server).await;
    orchestrator.save_notes("vae/SD15/v.pt", "old").await.unwrap();
    assert_eq!(orchestrator.catalog().len(), 1);

    orchestrator.delete_artifact("vae/SD15/v.pt").await.unwrap();

    assert!(!file.exists());
    assert!(orchestrator.store().record("vae/SD15/v.pt").is_none());
    assert!(orchestrator.catalog().is_empty());
}

#[tokio::test]
async fn test_delete_missing_file_keeps_record() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let mut orchestrator = orchestrator_for(&temp_dir, &server).await;
    orchestrator
        .store_mut()
        .set_notes("vae/SD15/gone.pt", "orphan");

    let result = orchestrator.delete_artifact("vae/SD15/gone.pt").await;

    assert!(matches!(result, Err(OrchestratorError::Io(_))));
    assert!(orchestrator.store().record("vae/SD15/gone.pt").is_some());
}

#[tokio::test]
async fn test_delete_rejects_paths_outside_root() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let outside = temp_dir.path().join("keep.bin");
    write_file(&outside, b"k");
    write_file(&temp_dir.path().join("models/vae/SD15/v.pt"), b"v");

    let mut orchestrator = orchestrator_for(&temp_dir, &server).await;

    for path in ["../keep.bin", "vae/../../keep.bin", outside.to_str().unwrap(), ""] {
        let result = orchestrator.delete_artifact(path).await;
        assert!(
            matches!(result, Err(OrchestratorError::InvalidRequest(_))),
            "{:?} was accepted",
            path
        );
    }

    assert!(outside.exists());
    assert_eq!(orchestrator.catalog().len(), 1);
}

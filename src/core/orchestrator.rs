//! Orchestrator for the local library.
//!
//! Owns the metadata store and the transfer engine, and is the only place
//! that mutates the store: transfer outcomes are recorded here, followed by
//! a rescan, so the catalog always reflects disk plus records.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{HubClient, HubError, RemoteRepository};
use crate::config::Settings;
use crate::domain::{
    relative_logical_path, Artifact, TransferOutcome, TransferProgress, TransferRequest,
};
use crate::library::{
    hash_file, resolve_document, scan, DocumentLookup, MetadataStore, ScanReport, StoreError,
};

use super::transfer::{CancelHandle, TransferEngine};

/// Errors surfaced to the presentation layer
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Hub client error: {0}")]
    Hub(#[from] HubError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Models directory is not configured")]
    RootNotConfigured,

    #[error("Invalid download request: {0}")]
    InvalidRequest(String),
}

/// Drives scans, transfers and record updates
pub struct Orchestrator {
    store: MetadataStore,
    engine: TransferEngine,
    catalog: ScanReport,
}

impl Orchestrator {
    /// Create an orchestrator from an already loaded store
    pub fn new(store: MetadataStore, repository: Arc<dyn RemoteRepository>) -> Self {
        Self {
            store,
            engine: TransferEngine::new(repository),
            catalog: ScanReport::default(),
        }
    }

    /// Load the store at `settings.config_path` and connect to the configured hub
    pub async fn open(settings: &Settings) -> Result<Self, OrchestratorError> {
        let store = MetadataStore::load(&settings.config_path)?;
        let hub = HubClient::new(&settings.hub_endpoint)?;

        let mut orchestrator = Self::new(store, Arc::new(hub));
        orchestrator.refresh().await;
        Ok(orchestrator)
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MetadataStore {
        &mut self.store
    }

    /// Catalog from the most recent scan
    pub fn catalog(&self) -> &ScanReport {
        &self.catalog
    }

    /// Cancellation flag of the engine, usable while a download is awaited
    pub fn cancel_handle(&self) -> CancelHandle {
        self.engine.cancel_handle()
    }

    /// Cancel the in-flight transfer, if any
    pub fn cancel(&self) {
        self.engine.cancel();
    }

    /// Rescan the configured root
    pub async fn refresh(&mut self) -> &ScanReport {
        let document = self.store.document();
        self.catalog = match document.models_root() {
            Some(root) => scan(&root, &document.category_ids(), &self.store).await,
            None => {
                debug!("No models directory configured");
                ScanReport::default()
            }
        };
        &self.catalog
    }

    /// Artifacts in one category and group
    pub fn browse(&self, category: &str, group: &str) -> Vec<&Artifact> {
        self.catalog.filter(category, group)
    }

    /// Find an artifact by logical path in the current catalog
    pub fn artifact(&self, logical_path: &str) -> Option<&Artifact> {
        self.catalog.get(logical_path)
    }

    /// Build a transfer request from user input
    pub fn prepare_download(
        &self,
        repo: &str,
        filename: &str,
        category: &str,
        group: &str,
    ) -> Result<TransferRequest, OrchestratorError> {
        let repo = repo.trim();
        let filename = filename.trim();
        if repo.is_empty() || filename.is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "repository id and file name must not be empty".to_string(),
            ));
        }

        let document = self.store.document();
        let root = document
            .models_root()
            .ok_or(OrchestratorError::RootNotConfigured)?;

        if !document.categories.iter().any(|c| c.id == category) {
            return Err(OrchestratorError::InvalidRequest(format!(
                "unknown category '{}'",
                category
            )));
        }
        if group.trim().is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "group must not be empty".to_string(),
            ));
        }

        Ok(TransferRequest::new(repo, filename, category, group, &root)
            .with_document_dir(document.documents_dir())
            .with_auth_token(document.auth_token.clone()))
    }

    /// Run a transfer to completion, record a successful one and rescan
    #[instrument(skip_all, fields(transfer = %request.id))]
    pub async fn download(
        &mut self,
        request: TransferRequest,
        on_progress: impl FnMut(&TransferProgress),
    ) -> Result<TransferOutcome, OrchestratorError> {
        let outcome = self.engine.submit(request.clone()).wait(on_progress).await;

        if outcome.success() {
            self.record_transfer(&request, &outcome)?;
            self.refresh().await;
        } else {
            info!(status = %outcome.status, "Transfer did not complete: {}", outcome.message);
        }

        Ok(outcome)
    }

    /// Write provenance for a completed transfer
    pub fn record_transfer(
        &mut self,
        request: &TransferRequest,
        outcome: &TransferOutcome,
    ) -> Result<(), OrchestratorError> {
        let Some(artifact_path) = outcome.artifact_path.as_deref() else {
            return Ok(());
        };
        let root = self
            .store
            .document()
            .models_root()
            .ok_or(OrchestratorError::RootNotConfigured)?;

        let logical_path = relative_logical_path(&root, artifact_path);
        let filename = artifact_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        let document_path = outcome
            .document_path
            .as_deref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.store.add_record(
            &logical_path,
            &request.origin_repo,
            &filename,
            &document_path,
        );
        self.store.save()?;

        info!("Recorded {} from {}", logical_path, request.origin_repo);
        Ok(())
    }

    /// Copy an image into the previews folder (deduplicated by content) and link it
    pub async fn import_preview(
        &mut self,
        logical_path: &str,
        image: &Path,
    ) -> Result<PathBuf, OrchestratorError> {
        let previews = self.store.document().previews_dir();
        fs::create_dir_all(&previews).await?;

        let digest = hash_file(image).await?;
        let target = previews.join(format!("{}.png", digest));
        if !target.exists() {
            fs::copy(image, &target).await?;
        } else {
            debug!("Preview {} already cached", target.display());
        }

        self.store.set_preview(logical_path, &target.to_string_lossy());
        self.store.save()?;
        self.refresh().await;

        Ok(target)
    }

    /// Save trimmed notes for an artifact
    pub async fn save_notes(
        &mut self,
        logical_path: &str,
        notes: &str,
    ) -> Result<(), OrchestratorError> {
        self.store.set_notes(logical_path, notes.trim());
        self.store.save()?;
        self.refresh().await;
        Ok(())
    }

    /// Delete an artifact file and its record.
    ///
    /// If the file cannot be removed the record is left untouched.
    pub async fn delete_artifact(&mut self, logical_path: &str) -> Result<(), OrchestratorError> {
        let root = self
            .store
            .document()
            .models_root()
            .ok_or(OrchestratorError::RootNotConfigured)?;
        if !is_contained(logical_path) {
            return Err(OrchestratorError::InvalidRequest(format!(
                "'{}' is not a path under the models directory",
                logical_path
            )));
        }
        let path = root.join(logical_path);

        if let Err(e) = fs::remove_file(&path).await {
            warn!("Failed to delete {}: {}", path.display(), e);
            return Err(e.into());
        }

        if self.store.remove(logical_path).is_some() {
            self.store.save()?;
        }
        info!("Deleted {}", logical_path);

        self.refresh().await;
        Ok(())
    }

    /// Locate the cached companion document for an artifact
    pub fn document_for(&self, artifact: &Artifact) -> DocumentLookup {
        resolve_document(&self.store.document().app_data_path(), artifact)
    }
}

/// True if `logical_path` is relative and never leaves the directory it is joined to
fn is_contained(logical_path: &str) -> bool {
    let path = Path::new(logical_path);
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}

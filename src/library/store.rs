//! Persisted settings and provenance records.
//!
//! A single JSON document holds the scan root, app data directory, hub
//! token, category/group lists and the record map keyed by logical path.
//! Saves overwrite the whole document; callers load, mutate and save from
//! one thread of control.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::default_app_data_dir;
use crate::domain::MetadataRecord;

/// Errors that can occur with the metadata store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A configured artifact class (first directory level under the scan root)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub label: String,
}

impl Category {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// The persisted document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    /// Scan root; empty when not configured yet
    #[serde(default, alias = "comfyui_models_dir")]
    pub comfy_models_dir: String,

    #[serde(default = "default_app_data_dir_string")]
    pub app_data_dir: String,

    #[serde(default, alias = "hf_token")]
    pub auth_token: String,

    #[serde(default = "default_categories", alias = "model_types")]
    pub categories: Vec<Category>,

    #[serde(default = "default_base_groups", alias = "base_models")]
    pub base_groups: Vec<String>,

    #[serde(default, alias = "models_metadata")]
    pub records: BTreeMap<String, MetadataRecord>,

    /// Unrecognised top-level keys, written back unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for MetadataDocument {
    fn default() -> Self {
        Self {
            comfy_models_dir: String::new(),
            app_data_dir: default_app_data_dir_string(),
            auth_token: String::new(),
            categories: default_categories(),
            base_groups: default_base_groups(),
            records: BTreeMap::new(),
            extra: Map::new(),
        }
    }
}

impl MetadataDocument {
    /// Scan root, or `None` when unset
    pub fn models_root(&self) -> Option<PathBuf> {
        let dir = self.comfy_models_dir.trim();
        if dir.is_empty() {
            None
        } else {
            Some(PathBuf::from(dir))
        }
    }

    pub fn app_data_path(&self) -> PathBuf {
        PathBuf::from(&self.app_data_dir)
    }

    /// Directory holding per-repository document caches
    pub fn documents_dir(&self) -> PathBuf {
        self.app_data_path().join("readmes")
    }

    /// Directory holding imported preview images
    pub fn previews_dir(&self) -> PathBuf {
        self.app_data_path().join("previews")
    }

    /// Category identifiers in configured order
    pub fn category_ids(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.id.clone()).collect()
    }
}

fn default_app_data_dir_string() -> String {
    default_app_data_dir().to_string_lossy().into_owned()
}

/// Default category list
pub fn default_categories() -> Vec<Category> {
    vec![
        Category::new("checkpoints", "Checkpoint"),
        Category::new("loras", "LoRA"),
        Category::new("vae", "VAE"),
        Category::new("controlnet", "ControlNet"),
        Category::new("clip", "CLIP"),
        Category::new("upscale_models", "Upscaler"),
        Category::new("embeddings", "Embedding"),
    ]
}

/// Default base-model groups
pub fn default_base_groups() -> Vec<String> {
    ["SD 1.5", "SDXL", "FLUX", "SD 3.x", "Kolors", "HunyuanDiT"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// File-backed metadata store
#[derive(Debug, Clone)]
pub struct MetadataStore {
    /// Location of the JSON document
    path: PathBuf,

    document: MetadataDocument,
}

impl MetadataStore {
    /// Wrap an in-memory document; nothing is written until `save`
    pub fn new(path: impl Into<PathBuf>, document: MetadataDocument) -> Self {
        Self {
            path: path.into(),
            document,
        }
    }

    /// Load the document, creating and persisting a default one if absent.
    ///
    /// App data subdirectories are created on every load.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let store = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
            let document = serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: path.clone(),
                source,
            })?;
            tracing::debug!("Loaded metadata from {}", path.display());
            Self::new(path, document)
        } else {
            tracing::info!("Creating metadata file at {}", path.display());
            let store = Self::new(path, MetadataDocument::default());
            store.save()?;
            store
        };

        store.ensure_app_dirs()?;
        Ok(store)
    }

    /// Write the whole document, replacing the previous file atomically
    pub fn save(&self) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| StoreError::io(&parent, e))?;

        let content = serde_json::to_string_pretty(&self.document)?;

        let mut temp =
            tempfile::NamedTempFile::new_in(&parent).map_err(|e| StoreError::io(&parent, e))?;
        temp.write_all(content.as_bytes())
            .map_err(|e| StoreError::io(temp.path(), e))?;
        temp.persist(&self.path)
            .map_err(|e| StoreError::io(&self.path, e.error))?;

        tracing::debug!(
            "Saved {} records to {}",
            self.document.records.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Create `readmes/` and `previews/` under the app data directory
    pub fn ensure_app_dirs(&self) -> Result<(), StoreError> {
        for dir in [self.document.documents_dir(), self.document.previews_dir()] {
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &MetadataDocument {
        &self.document
    }

    /// Record for a logical path, if any
    pub fn record(&self, logical_path: &str) -> Option<&MetadataRecord> {
        self.document.records.get(logical_path)
    }

    pub fn records(&self) -> &BTreeMap<String, MetadataRecord> {
        &self.document.records
    }

    /// Record provenance of a completed transfer.
    ///
    /// Replaces repo, filename and document; keeps notes, preview and the
    /// original creation time.
    pub fn add_record(
        &mut self,
        logical_path: &str,
        repo: &str,
        filename: &str,
        document_path: &str,
    ) {
        let record = self.entry(logical_path);
        record.origin_repo = Some(repo.to_string());
        record.origin_filename = Some(filename.to_string());
        record.document_path = non_empty(document_path);
    }

    /// Merge a preview path into the record
    pub fn set_preview(&mut self, logical_path: &str, preview_path: &str) {
        self.entry(logical_path).preview_path = Some(preview_path.to_string());
    }

    /// Merge notes into the record
    pub fn set_notes(&mut self, logical_path: &str, notes: &str) {
        self.entry(logical_path).notes = Some(notes.to_string());
    }

    /// Drop the record for a logical path; absent records are fine
    pub fn remove(&mut self, logical_path: &str) -> Option<MetadataRecord> {
        self.document.records.remove(logical_path)
    }

    /// Point the scanner at a new root (and optionally a new data directory), then save
    pub fn update_paths(
        &mut self,
        models_dir: &str,
        app_data_dir: Option<&str>,
    ) -> Result<(), StoreError> {
        self.document.comfy_models_dir = models_dir.to_string();
        if let Some(dir) = app_data_dir {
            self.document.app_data_dir = dir.to_string();
        }
        self.ensure_app_dirs()?;
        self.save()
    }

    /// Replace the hub token, then save
    pub fn set_auth_token(&mut self, token: &str) -> Result<(), StoreError> {
        self.document.auth_token = token.trim().to_string();
        self.save()
    }

    fn entry(&mut self, logical_path: &str) -> &mut MetadataRecord {
        self.document
            .records
            .entry(logical_path.to_string())
            .or_insert_with(MetadataRecord::created_now)
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

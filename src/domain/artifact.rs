//! Model files discovered under the scan root.
//!
//! An artifact is identified by its logical path (relative to the scan root,
//! forward-slash separated). Provenance fields are joined in from the
//! metadata store at scan time and are empty when no record exists.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::record::MetadataRecord;

/// A model file on disk plus its recorded provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// File base name
    pub name: String,

    /// Path relative to the scan root (join key into the metadata store)
    pub logical_path: String,

    /// Resolved filesystem path
    pub absolute_path: PathBuf,

    /// Size at scan time
    pub size_bytes: u64,

    /// First path segment under the root (artifact class)
    pub category: String,

    /// Second path segment under the root (model family)
    pub group: String,

    /// Repository the file was fetched from
    #[serde(default)]
    pub origin_repo: String,

    /// File name inside the origin repository
    #[serde(default)]
    pub origin_filename: String,

    #[serde(default)]
    pub preview_path: String,

    #[serde(default)]
    pub document_path: String,

    #[serde(default)]
    pub notes: String,
}

impl Artifact {
    /// Create an artifact with empty provenance
    pub fn new(
        name: impl Into<String>,
        logical_path: impl Into<String>,
        absolute_path: impl Into<PathBuf>,
        size_bytes: u64,
        category: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            logical_path: logical_path.into(),
            absolute_path: absolute_path.into(),
            size_bytes,
            category: category.into(),
            group: group.into(),
            origin_repo: String::new(),
            origin_filename: String::new(),
            preview_path: String::new(),
            document_path: String::new(),
            notes: String::new(),
        }
    }

    /// Copy provenance fields from a metadata record
    pub fn with_record(mut self, record: &MetadataRecord) -> Self {
        self.origin_repo = record.origin_repo.clone().unwrap_or_default();
        self.origin_filename = record.origin_filename.clone().unwrap_or_default();
        self.preview_path = record.preview_path.clone().unwrap_or_default();
        self.document_path = record.document_path.clone().unwrap_or_default();
        self.notes = record.notes.clone().unwrap_or_default();
        self
    }

    /// Human-readable size
    pub fn display_size(&self) -> String {
        format_size(self.size_bytes)
    }
}

/// Format a byte count with 1024-based units (B, KB, MB, GB)
pub fn format_size(size_bytes: u64) -> String {
    if size_bytes < 1024 {
        return format!("{} B", size_bytes);
    }
    let kb = size_bytes as f64 / 1024.0;
    if kb < 1024.0 {
        return format!("{:.1} KB", kb);
    }
    let mb = kb / 1024.0;
    if mb < 1024.0 {
        return format!("{:.1} MB", mb);
    }
    format!("{:.2} GB", mb / 1024.0)
}

/// Path of `path` relative to `root`, with forward slashes.
///
/// Falls back to the full (slash-normalised) path when `path` is not under `root`.
pub fn relative_logical_path(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().replace('\\', "/"))
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().replace('\\', "/"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_relative_logical_path() {
        let root = Path::new("/models");
        let path = Path::new("/models/checkpoints/SD 1.5/model.safetensors");
        assert_eq!(
            relative_logical_path(root, path),
            "checkpoints/SD 1.5/model.safetensors"
        );

        let outside = Path::new("/other/file.bin");
        assert_eq!(relative_logical_path(root, outside), "/other/file.bin");
    }

    #[test]
    fn test_with_record_copies_provenance() {
        let record = MetadataRecord {
            origin_repo: Some("user/repo".to_string()),
            notes: Some("portraits".to_string()),
            ..Default::default()
        };

        let artifact = Artifact::new(
            "model.safetensors",
            "checkpoints/SDXL/model.safetensors",
            "/models/checkpoints/SDXL/model.safetensors",
            4,
            "checkpoints",
            "SDXL",
        )
        .with_record(&record);

        assert_eq!(artifact.origin_repo, "user/repo");
        assert_eq!(artifact.notes, "portraits");
        assert!(artifact.preview_path.is_empty());
    }
}

//! Artifact scanner.
//!
//! Walks `root/{category}/{group}/{file}` for each configured category,
//! keeps files with a model extension and joins each with its metadata
//! record. Unreadable entries are skipped and counted, never fatal.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::domain::{relative_logical_path, Artifact};

use super::store::MetadataStore;

/// Extensions accepted as model files (compared case-insensitively)
pub const MODEL_EXTENSIONS: &[&str] = &["safetensors", "ckpt", "pt", "pth", "bin"];

/// Check if a path has a model file extension
pub fn is_model_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MODEL_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Result of a scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Discovered artifacts, sorted by category order then path
    pub artifacts: Vec<Artifact>,

    /// Entries that could not be read
    pub skipped: usize,
}

impl ScanReport {
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Artifacts in one category and group
    pub fn filter(&self, category: &str, group: &str) -> Vec<&Artifact> {
        self.artifacts
            .iter()
            .filter(|a| a.category == category && a.group == group)
            .collect()
    }

    /// Find an artifact by logical path
    pub fn get(&self, logical_path: &str) -> Option<&Artifact> {
        self.artifacts
            .iter()
            .find(|a| a.logical_path == logical_path)
    }
}

/// Scan `root` for model files under the given categories.
///
/// A missing root yields an empty report.
pub async fn scan(root: &Path, categories: &[String], store: &MetadataStore) -> ScanReport {
    let mut report = ScanReport::default();

    if !root.exists() {
        tracing::debug!("Scan root {} does not exist", root.display());
        return report;
    }

    for category in categories {
        let category_dir = root.join(category);
        if !category_dir.is_dir() {
            continue;
        }

        let groups = match sorted_entries(&category_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", category_dir.display(), e);
                report.skipped += 1;
                continue;
            }
        };

        for group_dir in groups {
            match fs::metadata(&group_dir).await {
                Ok(m) if m.is_dir() => {}
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("Failed to stat {}: {}", group_dir.display(), e);
                    report.skipped += 1;
                    continue;
                }
            }

            let group = file_name(&group_dir);
            scan_group(root, category, &group, &group_dir, store, &mut report).await;
        }
    }

    if report.skipped > 0 {
        tracing::warn!("Scan skipped {} unreadable entries", report.skipped);
    }
    tracing::debug!("Scan found {} artifacts", report.artifacts.len());

    report
}

/// Collect model files directly inside one group directory
async fn scan_group(
    root: &Path,
    category: &str,
    group: &str,
    group_dir: &Path,
    store: &MetadataStore,
    report: &mut ScanReport,
) {
    let files = match sorted_entries(group_dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", group_dir.display(), e);
            report.skipped += 1;
            return;
        }
    };

    for path in files {
        if !is_model_file(&path) {
            continue;
        }

        let metadata = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Failed to stat {}: {}", path.display(), e);
                report.skipped += 1;
                continue;
            }
        };

        if !metadata.is_file() {
            continue;
        }

        let logical_path = relative_logical_path(root, &path);
        let mut artifact = Artifact::new(
            file_name(&path),
            logical_path,
            path.clone(),
            metadata.len(),
            category,
            group,
        );

        if let Some(record) = store.record(&artifact.logical_path) {
            artifact = artifact.with_record(record);
        }

        report.artifacts.push(artifact);
    }
}

/// Directory entries sorted by path so repeated scans agree
async fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut paths = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        paths.push(entry.path());
    }

    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

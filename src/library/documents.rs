//! Locating cached companion documents.
//!
//! Documents live under `{app_data}/readmes/{hash_text(repo)}`, possibly
//! nested. The recorded `document_path` is checked as a second candidate.

use std::path::{Path, PathBuf};

use glob::{glob_with, MatchOptions, Pattern};

use crate::domain::Artifact;

use super::hasher::hash_text;

/// Conventional document name in a repository
pub const DOCUMENT_NAME: &str = "README.md";

/// Where a companion document was (or was not) found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentLookup {
    /// Document file on disk
    Found(PathBuf),

    /// A candidate location exists but holds no document
    Missing { checked: PathBuf },

    /// No candidate location exists
    NotDownloaded { checked: Option<PathBuf> },
}

/// True if `name` is the document name, ignoring case
pub fn is_document_name(name: &str) -> bool {
    name.eq_ignore_ascii_case(DOCUMENT_NAME)
}

/// Per-repository cache directory under `documents_root`
pub fn document_cache_dir(documents_root: &Path, repo: &str) -> PathBuf {
    documents_root.join(hash_text(repo))
}

/// Resolve the document for an artifact
pub fn resolve_document(app_data_dir: &Path, artifact: &Artifact) -> DocumentLookup {
    let mut roots = Vec::new();
    if !artifact.origin_repo.is_empty() {
        roots.push(document_cache_dir(
            &app_data_dir.join("readmes"),
            &artifact.origin_repo,
        ));
    }
    if !artifact.document_path.is_empty() {
        let recorded = PathBuf::from(&artifact.document_path);
        if recorded.is_relative() && app_data_dir.join(&recorded).exists() {
            roots.push(app_data_dir.join(recorded));
        } else {
            roots.push(recorded);
        }
    }

    let mut last_checked = None;
    let mut saw_existing_root = false;

    for root in roots {
        if !root.exists() {
            last_checked = Some(root);
            continue;
        }
        saw_existing_root = true;

        if root.is_file() {
            let matches = root
                .file_name()
                .and_then(|n| n.to_str())
                .map(is_document_name)
                .unwrap_or(false);
            if matches {
                return DocumentLookup::Found(root);
            }
        } else if let Some(found) = find_document(&root) {
            return DocumentLookup::Found(found);
        }
        last_checked = Some(root);
    }

    match (saw_existing_root, last_checked) {
        (true, Some(checked)) => DocumentLookup::Missing { checked },
        (_, checked) => DocumentLookup::NotDownloaded { checked },
    }
}

/// First document under `root` (recursive, sorted by path)
pub fn find_document(root: &Path) -> Option<PathBuf> {
    let pattern = format!(
        "{}/**/{}",
        Pattern::escape(&root.to_string_lossy()),
        DOCUMENT_NAME
    );
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let mut candidates: Vec<PathBuf> = glob_with(&pattern, options)
        .ok()?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();

    candidates.sort();
    candidates.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact_from(repo: &str, document: &str) -> Artifact {
        let mut artifact = Artifact::new("m.bin", "vae/SDXL/m.bin", "/m/vae/SDXL/m.bin", 1, "vae", "SDXL");
        artifact.origin_repo = repo.to_string();
        artifact.document_path = document.to_string();
        artifact
    }

    #[test]
    fn test_finds_nested_document_case_insensitively() {
        let temp = TempDir::new().unwrap();
        let cache = document_cache_dir(&temp.path().join("readmes"), "user/repo");
        let nested = cache.join("snapshots").join("abc");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("readme.md"), "# Model").unwrap();

        let lookup = resolve_document(temp.path(), &artifact_from("user/repo", ""));
        assert_eq!(lookup, DocumentLookup::Found(nested.join("readme.md")));
    }

    #[test]
    fn test_recorded_file_is_used() {
        let temp = TempDir::new().unwrap();
        let doc = temp.path().join("README.md");
        std::fs::write(&doc, "hi").unwrap();

        let lookup = resolve_document(
            temp.path(),
            &artifact_from("", doc.to_str().unwrap()),
        );
        assert_eq!(lookup, DocumentLookup::Found(doc));
    }

    #[test]
    fn test_existing_cache_without_document() {
        let temp = TempDir::new().unwrap();
        let cache = document_cache_dir(&temp.path().join("readmes"), "user/repo");
        std::fs::create_dir_all(&cache).unwrap();

        let lookup = resolve_document(temp.path(), &artifact_from("user/repo", ""));
        assert_eq!(lookup, DocumentLookup::Missing { checked: cache });
    }

    #[test]
    fn test_nothing_downloaded() {
        let temp = TempDir::new().unwrap();
        assert_eq!(
            resolve_document(temp.path(), &artifact_from("", "")),
            DocumentLookup::NotDownloaded { checked: None }
        );

        let lookup = resolve_document(temp.path(), &artifact_from("user/repo", ""));
        assert!(matches!(lookup, DocumentLookup::NotDownloaded { checked: Some(_) }));
    }
}

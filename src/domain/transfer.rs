//! Transfer requests, progress and outcomes.
//!
//! A transfer fetches one named file from a remote repository into
//! `scan_root/category/group`, then best-effort fetches the repository's
//! companion document. Each request ends in exactly one [`TransferOutcome`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message carried by a cancelled outcome
pub const CANCELLED_MESSAGE: &str = "download_cancelled";

/// Suffix for files still being written
pub const PARTIAL_SUFFIX: &str = ".part";

/// One fetch of a remote file. Immutable once submitted.
#[derive(Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Correlation id for logs
    pub id: Uuid,

    pub origin_repo: String,

    pub remote_filename: String,

    pub category: String,

    pub group: String,

    /// `scan_root/category/group`
    pub target_dir: PathBuf,

    /// Root under which companion documents are cached (per repository)
    pub document_dir: Option<PathBuf>,

    pub auth_token: Option<String>,
}

impl TransferRequest {
    /// Create a request targeting `scan_root/category/group`
    pub fn new(
        origin_repo: impl Into<String>,
        remote_filename: impl Into<String>,
        category: impl Into<String>,
        group: impl Into<String>,
        scan_root: &Path,
    ) -> Self {
        let category = category.into();
        let group = group.into();
        let target_dir = scan_root.join(&category).join(&group);

        Self {
            id: Uuid::new_v4(),
            origin_repo: origin_repo.into(),
            remote_filename: remote_filename.into(),
            category,
            group,
            target_dir,
            document_dir: None,
            auth_token: None,
        }
    }

    /// Set the document cache root
    pub fn with_document_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.document_dir = Some(dir.into());
        self
    }

    /// Set the bearer token (an empty token means none)
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.auth_token = if token.trim().is_empty() {
            None
        } else {
            Some(token)
        };
        self
    }

    /// Final location of the fetched file
    pub fn target_path(&self) -> PathBuf {
        self.target_dir.join(self.local_file_name())
    }

    /// Location written to while the transfer is in flight
    pub fn partial_path(&self) -> PathBuf {
        self.target_dir
            .join(format!("{}{}", self.local_file_name(), PARTIAL_SUFFIX))
    }

    /// Document cache root, defaulting to `target_dir/readmes`
    pub fn document_root(&self) -> PathBuf {
        self.document_dir
            .clone()
            .unwrap_or_else(|| self.target_dir.join("readmes"))
    }

    /// Base name of the remote file (remote names may contain subfolders)
    fn local_file_name(&self) -> &str {
        self.remote_filename
            .rsplit('/')
            .next()
            .unwrap_or(&self.remote_filename)
    }
}

impl fmt::Debug for TransferRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferRequest")
            .field("id", &self.id)
            .field("origin_repo", &self.origin_repo)
            .field("remote_filename", &self.remote_filename)
            .field("category", &self.category)
            .field("group", &self.group)
            .field("target_dir", &self.target_dir)
            .field("document_dir", &self.document_dir)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Progress snapshot, delivered once per written chunk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransferProgress {
    /// Bytes written so far
    pub downloaded: u64,

    /// Declared total (0 when the server did not say)
    pub total: u64,

    /// Bytes per second since the transfer started
    pub speed: f64,
}

impl TransferProgress {
    /// Completion ratio in `0.0..=1.0`, or `None` when the total is unknown
    pub fn fraction(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some((self.downloaded as f64 / self.total as f64).min(1.0))
        }
    }
}

/// Terminal state of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Completed,
    Cancelled,
    Failed,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::Completed => write!(f, "completed"),
            TransferStatus::Cancelled => write!(f, "cancelled"),
            TransferStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The single result of a transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub status: TransferStatus,

    /// Empty on success, sentinel on cancel, reason on failure
    pub message: String,

    pub document_path: Option<PathBuf>,

    pub artifact_path: Option<PathBuf>,
}

impl TransferOutcome {
    pub fn completed(artifact_path: PathBuf, document_path: Option<PathBuf>) -> Self {
        Self {
            status: TransferStatus::Completed,
            message: String::new(),
            document_path,
            artifact_path: Some(artifact_path),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: TransferStatus::Cancelled,
            message: CANCELLED_MESSAGE.to_string(),
            document_path: None,
            artifact_path: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: TransferStatus::Failed,
            message: message.into(),
            document_path: None,
            artifact_path: None,
        }
    }

    /// True only for `Completed`
    pub fn success(&self) -> bool {
        self.status == TransferStatus::Completed
    }
}

/// Message posted by the engine onto a transfer's event channel
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    Progress(TransferProgress),
    /// Always the last event for a request
    Finished(TransferOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_paths() {
        let request = TransferRequest::new(
            "user/repo",
            "model.safetensors",
            "checkpoints",
            "SD 1.5",
            Path::new("/models"),
        );

        assert_eq!(request.target_dir, PathBuf::from("/models/checkpoints/SD 1.5"));
        assert_eq!(
            request.target_path(),
            PathBuf::from("/models/checkpoints/SD 1.5/model.safetensors")
        );
        assert_eq!(
            request.partial_path(),
            PathBuf::from("/models/checkpoints/SD 1.5/model.safetensors.part")
        );
        assert_eq!(
            request.document_root(),
            PathBuf::from("/models/checkpoints/SD 1.5/readmes")
        );
    }

    #[test]
    fn test_nested_remote_name_lands_flat() {
        let request = TransferRequest::new(
            "user/repo",
            "unet/diffusion_pytorch_model.safetensors",
            "checkpoints",
            "SDXL",
            Path::new("/models"),
        );

        assert_eq!(
            request.target_path(),
            PathBuf::from("/models/checkpoints/SDXL/diffusion_pytorch_model.safetensors")
        );
    }

    #[test]
    fn test_blank_token_is_none() {
        let request = TransferRequest::new("a/b", "f.bin", "vae", "SDXL", Path::new("/m"))
            .with_auth_token("  ");
        assert!(request.auth_token.is_none());

        let request = request.with_auth_token("hf_secret");
        assert_eq!(request.auth_token.as_deref(), Some("hf_secret"));
        assert!(!format!("{:?}", request).contains("hf_secret"));
    }

    #[test]
    fn test_progress_fraction() {
        let unknown = TransferProgress {
            downloaded: 10,
            total: 0,
            speed: 1.0,
        };
        assert!(unknown.fraction().is_none());

        let half = TransferProgress {
            downloaded: 5,
            total: 10,
            speed: 1.0,
        };
        assert_eq!(half.fraction(), Some(0.5));
    }

    #[test]
    fn test_outcomes() {
        let cancelled = TransferOutcome::cancelled();
        assert!(!cancelled.success());
        assert_eq!(cancelled.message, CANCELLED_MESSAGE);

        let done = TransferOutcome::completed(PathBuf::from("/m/a.bin"), None);
        assert!(done.success());
        assert!(done.message.is_empty());
    }
}

//! Adapter interfaces for remote model repositories.
//!
//! The transfer engine talks to a [`RemoteRepository`]; the hub adapter is
//! the HTTP implementation, tests substitute in-memory ones.

pub mod hub;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

// Re-export the hub adapter
pub use hub::{HubClient, HubError, DEFAULT_ENDPOINT, DEFAULT_REVISION};

/// Streaming body of a remote file
pub struct RemoteFile {
    /// Declared size in bytes (0 when the server did not say)
    pub total: u64,

    /// Body chunks in arrival order
    pub chunks: BoxStream<'static, Result<Vec<u8>, HubError>>,
}

/// Outcome of looking a file name up in a repository listing
#[derive(Debug)]
pub enum FileLookup {
    /// Listing contains the file under this exact name
    Found(String),

    /// Listing succeeded and has no such file
    NotFound,

    /// Listing could not be fetched
    Failed(HubError),
}

/// A remote content-addressed repository service
#[async_trait]
pub trait RemoteRepository: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Open a streaming download of `filename` in `repo`
    async fn fetch(
        &self,
        repo: &str,
        filename: &str,
        token: Option<&str>,
    ) -> Result<RemoteFile, HubError>;

    /// Names of all files in `repo`
    async fn list_files(&self, repo: &str, token: Option<&str>) -> Result<Vec<String>, HubError>;

    /// Find `wanted` in the listing, ignoring case
    async fn find_file(&self, repo: &str, wanted: &str, token: Option<&str>) -> FileLookup {
        match self.list_files(repo, token).await {
            Ok(files) => files
                .into_iter()
                .find(|f| f.eq_ignore_ascii_case(wanted))
                .map(FileLookup::Found)
                .unwrap_or(FileLookup::NotFound),
            Err(e) => FileLookup::Failed(e),
        }
    }
}

//! Model hub HTTP adapter.
//!
//! Files are fetched from `{endpoint}/{repo}/resolve/{revision}/{filename}`;
//! repository listings come from `{endpoint}/api/models/{repo}`. A bearer
//! token is attached when one is configured.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use thiserror::Error;

use super::{RemoteFile, RemoteRepository};

/// Public hub
pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Branch files are resolved against
pub const DEFAULT_REVISION: &str = "main";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the hub adapter
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
}

/// Repository listing payload (only the fields we read)
#[derive(Debug, Deserialize)]
struct RepoListing {
    #[serde(default)]
    siblings: Vec<Sibling>,
}

#[derive(Debug, Deserialize)]
struct Sibling {
    rfilename: String,
}

/// Model hub client
pub struct HubClient {
    /// Base URL without trailing slash
    endpoint: String,
    revision: String,
    client: reqwest::Client,
}

impl HubClient {
    /// Create a client for `endpoint`
    pub fn new(endpoint: impl Into<String>) -> Result<Self, HubError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("modelshelf/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            revision: DEFAULT_REVISION.to_string(),
            client,
        })
    }

    /// Resolve files against another branch or commit
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Download URL for a file
    pub fn resolve_url(&self, repo: &str, filename: &str) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            self.endpoint,
            encode_path(repo),
            urlencoding::encode(&self.revision),
            encode_path(filename)
        )
    }

    /// Listing URL for a repository
    pub fn listing_url(&self, repo: &str) -> String {
        format!("{}/api/models/{}", self.endpoint, encode_path(repo))
    }

    /// GET with optional bearer token; non-2xx statuses become errors
    async fn get(&self, url: &str, token: Option<&str>) -> Result<reqwest::Response, HubError> {
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(HubError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl RemoteRepository for HubClient {
    fn name(&self) -> &str {
        "hub"
    }

    async fn fetch(
        &self,
        repo: &str,
        filename: &str,
        token: Option<&str>,
    ) -> Result<RemoteFile, HubError> {
        let url = self.resolve_url(repo, filename);
        tracing::debug!("GET {}", url);

        let response = self.get(&url, token).await?;
        let total = response.content_length().unwrap_or(0);
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(HubError::from))
            .boxed();

        Ok(RemoteFile { total, chunks })
    }

    async fn list_files(&self, repo: &str, token: Option<&str>) -> Result<Vec<String>, HubError> {
        let url = self.listing_url(repo);
        tracing::debug!("GET {}", url);

        let listing: RepoListing = self.get(&url, token).await?.json().await?;
        Ok(listing.siblings.into_iter().map(|s| s.rfilename).collect())
    }
}

/// Percent-encode each `/`-separated segment
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let client = HubClient::new("https://hub.example/").unwrap();
        assert_eq!(
            client.resolve_url("user/repo", "model.safetensors"),
            "https://hub.example/user/repo/resolve/main/model.safetensors"
        );
        assert_eq!(
            client.resolve_url("user/repo", "unet/my model.bin"),
            "https://hub.example/user/repo/resolve/main/unet/my%20model.bin"
        );
    }

    #[test]
    fn test_listing_url() {
        let client = HubClient::new(DEFAULT_ENDPOINT).unwrap();
        assert_eq!(
            client.listing_url("user/repo"),
            "https://huggingface.co/api/models/user/repo"
        );
    }

    #[test]
    fn test_revision_override() {
        let client = HubClient::new("http://h").unwrap().with_revision("v1.0");
        assert_eq!(client.resolve_url("a/b", "c.pt"), "http://h/a/b/resolve/v1.0/c.pt");
    }
}

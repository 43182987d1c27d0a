//! Transfer engine.
//!
//! Runs one fetch per submitted request on its own tokio task and posts
//! [`TransferEvent`]s onto a channel the caller drains:
//!
//! ```text
//! submit ─► primary fetch ──chunks──► progress events
//!               │  cancel observed ──► Cancelled (partial file removed)
//!               │  transport/disk error or stalled read ──► Failed(message)
//!               ▼
//!           document fetch (errors swallowed) ──► Completed
//! ```
//!
//! Exactly one `Finished` event is sent per request and it is always last.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::adapters::{FileLookup, HubError, RemoteRepository};
use crate::domain::{
    TransferEvent, TransferOutcome, TransferProgress, TransferRequest, PARTIAL_SUFFIX,
};
use crate::library::documents::{document_cache_dir, DOCUMENT_NAME};

/// Largest slice written (and reported) at once (512 KiB)
pub const CHUNK_SIZE: usize = 512 * 1024;

/// Floor for elapsed time in speed calculations
const MIN_ELAPSED_SECS: f64 = 0.1;

/// Longest wait for response headers or for the next body chunk
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a primary fetch stopped early
#[derive(Debug, Error)]
enum TransferError {
    #[error("download_cancelled")]
    Cancelled,

    #[error("{0}")]
    Remote(#[from] HubError),

    #[error("No data from the server for {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default)]
struct CancelState {
    flag: AtomicBool,
    notify: Notify,
}

/// Shared cancellation flag that also wakes a transfer blocked on the network
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<CancelState>);

impl CancelHandle {
    /// Request cancellation; a no-op once the transfer has finished
    pub fn cancel(&self) {
        self.0.flag.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.flag.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        let notified = self.0.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent cancel is not missed
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }

    fn reset(&self) {
        self.0.flag.store(false, Ordering::SeqCst);
    }
}

/// Handle to one submitted transfer
pub struct TransferHandle {
    events: mpsc::UnboundedReceiver<TransferEvent>,
    task: JoinHandle<()>,
}

impl TransferHandle {
    /// Next event, or `None` once the channel is drained
    pub async fn next_event(&mut self) -> Option<TransferEvent> {
        self.events.recv().await
    }

    /// Drain the channel, passing progress to `on_progress`, and return the outcome
    pub async fn wait(mut self, mut on_progress: impl FnMut(&TransferProgress)) -> TransferOutcome {
        while let Some(event) = self.events.recv().await {
            match event {
                TransferEvent::Progress(progress) => on_progress(&progress),
                TransferEvent::Finished(outcome) => {
                    let _ = self.task.await;
                    return outcome;
                }
            }
        }

        // Channel closed without a Finished event: the task died
        let reason = match self.task.await {
            Err(e) => format!("transfer task failed: {}", e),
            Ok(()) => "transfer ended without an outcome".to_string(),
        };
        TransferOutcome::failed(reason)
    }
}

/// Executes transfers against a remote repository
pub struct TransferEngine {
    repository: Arc<dyn RemoteRepository>,
    cancel: CancelHandle,
    read_timeout: Duration,
}

impl TransferEngine {
    pub fn new(repository: Arc<dyn RemoteRepository>) -> Self {
        Self {
            repository,
            cancel: CancelHandle::default(),
            read_timeout: READ_TIMEOUT,
        }
    }

    /// Override the per-read timeout
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Start a transfer on a background task and return immediately.
    ///
    /// Clears any earlier cancel request. Callers must not overlap
    /// submissions that share a target file.
    pub fn submit(&self, request: TransferRequest) -> TransferHandle {
        self.cancel.reset();

        let (tx, rx) = mpsc::unbounded_channel();
        let repository = Arc::clone(&self.repository);
        let cancel = self.cancel.clone();
        let read_timeout = self.read_timeout;

        let task = tokio::spawn(async move {
            let fetch = Fetch {
                repository: repository.as_ref(),
                request: &request,
                cancel: &cancel,
                read_timeout,
            };
            let outcome = run_transfer(&fetch, &tx).await;
            let _ = tx.send(TransferEvent::Finished(outcome));
        });

        TransferHandle { events: rx, task }
    }

    /// Ask the in-flight transfer to stop, waking it if it is waiting on the network
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Clone of the cancellation flag, for cancelling from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

/// Everything one running transfer needs
struct Fetch<'a> {
    repository: &'a dyn RemoteRepository,
    request: &'a TransferRequest,
    cancel: &'a CancelHandle,
    read_timeout: Duration,
}

impl Fetch<'_> {
    /// Await a network step, giving up when cancelled or when it stalls
    async fn read<T>(&self, step: impl Future<Output = T>) -> Result<T, TransferError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(TransferError::Cancelled),
            result = timeout(self.read_timeout, step) => {
                result.map_err(|_| TransferError::TimedOut(self.read_timeout))
            }
        }
    }

    /// Await a network step, giving up only when it stalls
    async fn read_to_end<T>(&self, step: impl Future<Output = T>) -> Result<T, TransferError> {
        timeout(self.read_timeout, step)
            .await
            .map_err(|_| TransferError::TimedOut(self.read_timeout))
    }
}

async fn run_transfer(
    fetch: &Fetch<'_>,
    events: &mpsc::UnboundedSender<TransferEvent>,
) -> TransferOutcome {
    let request = fetch.request;
    tracing::info!(
        transfer = %request.id,
        "Fetching {} from {}",
        request.remote_filename,
        request.origin_repo
    );

    let artifact_path = match fetch_primary(fetch, events).await {
        Ok(path) => path,
        Err(TransferError::Cancelled) => {
            tracing::info!(transfer = %request.id, "Transfer cancelled");
            return TransferOutcome::cancelled();
        }
        Err(e) => {
            tracing::warn!(transfer = %request.id, "Transfer failed: {}", e);
            return TransferOutcome::failed(e.to_string());
        }
    };

    let document_path = fetch_document(fetch).await;

    tracing::info!(transfer = %request.id, "Saved {}", artifact_path.display());
    TransferOutcome::completed(artifact_path, document_path)
}

/// Stream the primary file into `{target}.part`, then rename into place
async fn fetch_primary(
    fetch: &Fetch<'_>,
    events: &mpsc::UnboundedSender<TransferEvent>,
) -> Result<PathBuf, TransferError> {
    let request = fetch.request;
    fs::create_dir_all(&request.target_dir).await?;

    let remote = fetch
        .read(fetch.repository.fetch(
            &request.origin_repo,
            &request.remote_filename,
            request.auth_token.as_deref(),
        ))
        .await??;

    let partial = request.partial_path();
    let target = request.target_path();

    let written = write_chunks(fetch, remote.chunks, remote.total, &partial, events).await;
    let finished = match written {
        Ok(()) if fetch.cancel.is_cancelled() => Err(TransferError::Cancelled),
        Ok(()) => fs::rename(&partial, &target).await.map_err(TransferError::from),
        Err(e) => Err(e),
    };

    if let Err(e) = finished {
        remove_partial(&partial).await;
        return Err(e);
    }

    Ok(target)
}

async fn write_chunks(
    fetch: &Fetch<'_>,
    mut chunks: BoxStream<'static, Result<Vec<u8>, HubError>>,
    total: u64,
    path: &Path,
    events: &mpsc::UnboundedSender<TransferEvent>,
) -> Result<(), TransferError> {
    let cancel = fetch.cancel;
    let mut file = File::create(path).await?;
    let mut downloaded: u64 = 0;
    let started = Instant::now();

    while let Some(chunk) = fetch.read(chunks.next()).await? {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        let chunk = chunk?;

        for piece in chunk.chunks(CHUNK_SIZE) {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }
            file.write_all(piece).await?;
            downloaded += piece.len() as u64;

            let elapsed = started.elapsed().as_secs_f64().max(MIN_ELAPSED_SECS);
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }
            let _ = events.send(TransferEvent::Progress(TransferProgress {
                downloaded,
                total,
                speed: downloaded as f64 / elapsed,
            }));
        }
    }

    file.flush().await?;
    Ok(())
}

async fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove partial file {}: {}", path.display(), e);
        }
    }
}

/// Best-effort fetch of the repository's document; every failure yields `None`.
///
/// Cancellation does not interrupt it, the read timeout still applies.
async fn fetch_document(fetch: &Fetch<'_>) -> Option<PathBuf> {
    let request = fetch.request;
    let token = request.auth_token.as_deref();

    let lookup = fetch
        .read_to_end(
            fetch
                .repository
                .find_file(&request.origin_repo, DOCUMENT_NAME, token),
        )
        .await;

    let name = match lookup {
        Ok(FileLookup::Found(name)) => name,
        Ok(FileLookup::NotFound) => {
            tracing::debug!("{} lists no {}", request.origin_repo, DOCUMENT_NAME);
            return None;
        }
        Ok(FileLookup::Failed(e)) => listing_fallback(request, &e),
        Err(e) => listing_fallback(request, &e),
    };

    let cache_dir = document_cache_dir(&request.document_root(), &request.origin_repo);
    match download_document(fetch, &name, &cache_dir).await {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!(
                "Companion document for {} unavailable: {}",
                request.origin_repo,
                e
            );
            None
        }
    }
}

fn listing_fallback(request: &TransferRequest, reason: &dyn std::fmt::Display) -> String {
    tracing::debug!(
        "Listing {} failed ({}), trying {}",
        request.origin_repo,
        reason,
        DOCUMENT_NAME
    );
    DOCUMENT_NAME.to_string()
}

/// Download into `{name}.part` next to the cached copy and replace it only when complete
async fn download_document(
    fetch: &Fetch<'_>,
    name: &str,
    cache_dir: &Path,
) -> Result<PathBuf, TransferError> {
    let request = fetch.request;
    let remote = fetch
        .read_to_end(fetch.repository.fetch(
            &request.origin_repo,
            name,
            request.auth_token.as_deref(),
        ))
        .await??;

    fs::create_dir_all(cache_dir).await?;
    let file_name = name.rsplit('/').next().unwrap_or(name);
    let path = cache_dir.join(file_name);
    let partial = cache_dir.join(format!("{}{}", file_name, PARTIAL_SUFFIX));

    let mut chunks = remote.chunks;
    let written: Result<(), TransferError> = async {
        let mut file = File::create(&partial).await?;
        while let Some(chunk) = fetch.read_to_end(chunks.next()).await? {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }
    .await;

    let finished = match written {
        Ok(()) => fs::rename(&partial, &path).await.map_err(TransferError::from),
        Err(e) => Err(e),
    };
    if let Err(e) = finished {
        remove_partial(&partial).await;
        return Err(e);
    }
    Ok(path)
}

//! modelshelf - Local mirror of model artifacts
//!
//! Keeps a folder of large model files in sync with a remote model hub and
//! remembers where each file came from.
//!
//! # Architecture
//!
//! The filesystem is the source of truth for which artifacts exist:
//! - Every scan walks `root/<category>/<group>/<file>` and joins in provenance
//!   from the metadata store
//! - Transfers write to a `.part` file and rename on success, so a scan
//!   never sees an incomplete artifact
//! - Only the orchestrator mutates the metadata store
//!
//! # Modules
//!
//! - `adapters`: Remote repository integrations (model hub)
//! - `core`: Transfer engine and orchestrator
//! - `domain`: Data structures (Artifact, MetadataRecord, transfer types)
//! - `library`: Hashing, metadata store, scanner, document lookup
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Point at a models folder
//! modelshelf config set-root ~/ComfyUI/models
//!
//! # Fetch a file into checkpoints/SDXL
//! modelshelf download user/repo model.safetensors -c checkpoints -g SDXL
//!
//! # List what is on disk
//! modelshelf scan
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod library;

// Re-export main types at crate root for convenience
pub use adapters::{HubClient, HubError, RemoteRepository};
pub use config::Settings;
pub use self::core::{CancelHandle, Orchestrator, OrchestratorError, TransferEngine, TransferHandle};
pub use domain::{
    Artifact, MetadataRecord, TransferEvent, TransferOutcome, TransferProgress, TransferRequest,
    TransferStatus,
};
pub use library::{hash_file, hash_text, scan, DocumentLookup, MetadataStore, ScanReport};

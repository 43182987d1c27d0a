//! Local model library: scanning, provenance records, hashing.
//!
//! # Storage Layout
//!
//! ```text
//! {scan_root}/
//! └── <category>/                 # checkpoints, loras, vae, ...
//!     └── <group>/                # SD 1.5, SDXL, ...
//!         └── model.safetensors
//!
//! {app_data_dir}/
//! ├── config.json                 # settings + records (default location)
//! ├── readmes/
//! │   └── <sha256(repo)>/README.md
//! └── previews/
//!     └── <sha256(image)>.png
//! ```

pub mod documents;
pub mod hasher;
pub mod scanner;
pub mod store;

pub use documents::{resolve_document, DocumentLookup, DOCUMENT_NAME};
pub use hasher::{hash_file, hash_text};
pub use scanner::{is_model_file, scan, ScanReport, MODEL_EXTENSIONS};
pub use store::{Category, MetadataDocument, MetadataStore, StoreError};

//! Domain types for modelshelf.
//!
//! This module contains the core data structures:
//! - Artifact: a model file found under the scan root
//! - MetadataRecord: persisted provenance for one logical path
//! - Transfer: requests, progress events and outcomes of a fetch

pub mod artifact;
pub mod record;
pub mod transfer;

// Re-export commonly used types
pub use artifact::{format_size, relative_logical_path, Artifact};
pub use record::{timestamp_now, MetadataRecord};
pub use transfer::{
    TransferEvent, TransferOutcome, TransferProgress, TransferRequest, TransferStatus,
    CANCELLED_MESSAGE, PARTIAL_SUFFIX,
};

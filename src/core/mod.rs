//! Core engine logic.
//!
//! This module contains:
//! - TransferEngine: background fetch with progress and cancellation
//! - Orchestrator: wires scans, transfers and metadata updates

pub mod orchestrator;
pub mod transfer;

// Re-export commonly used types
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use transfer::{CancelHandle, TransferEngine, TransferHandle, CHUNK_SIZE};

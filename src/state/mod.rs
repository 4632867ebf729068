//! State management module
//!
//! Handles checkpointing, resumability and duplicate suppression.
//!
//! # Overview
//!
//! The state module provides:
//! - `Checkpoint` - Progress of one job (cursor, counters, finished seeds)
//! - `CheckpointStore` - File-based checkpoint persistence
//! - `SeenKeys` - Keys already emitted, optionally preloaded from JSONL

mod dedup;
mod manager;
mod types;

pub use dedup::SeenKeys;
pub use manager::CheckpointStore;
pub use types::Checkpoint;

#[cfg(test)]
mod tests;

//! Entity store abstraction and implementations for tally.
//!
//! This crate provides a trait-based storage interface with an in-memory
//! backend and a JSON-file backend.

#![warn(missing_docs)]

pub mod trait_;
pub mod memory_storage;
pub mod json_storage;

pub use trait_::{Result, Snapshot, Storage, StorageError, UnreadableRecord};
pub use memory_storage::MemoryStorage;
pub use json_storage::JsonStorage;

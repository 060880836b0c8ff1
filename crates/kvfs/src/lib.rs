//! kvfs - POSIX-style filesystem semantics over a flat key-value store
//!
//! Directories, files and symlinks live as metadata hashes, content
//! strings and membership sets under a per-volume key prefix. The
//! [`Engine`] turns path operations into atomic multi-key batches against
//! any [`KvStore`] backend; [`MemoryStore`] is the in-process reference
//! backend.
//!
//! Set RUST_LOG to control logging, e.g. RUST_LOG=kvfs=debug.

pub mod engine;
pub mod error;
pub mod glob;
pub mod keys;
pub mod memory;
pub mod meta;
pub mod observer;
pub mod path;
pub mod store;

pub use engine::{DirEntry, Engine, FindEntry, TreeListing, TreeNode, MAX_SYMLINK_DEPTH};
pub use error::{Error, Result};
pub use keys::{KeySpace, DEFAULT_VOLUME};
pub use memory::MemoryStore;
pub use meta::{EntryKind, Metadata, DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, SYMLINK_MODE};
pub use observer::FileObserver;
pub use store::{Batch, KvStore, Mutation, StoreError, StoreResult};

#[cfg(test)]
mod tests;

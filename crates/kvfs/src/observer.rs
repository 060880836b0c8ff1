//! Mutation notifications.

use async_trait::async_trait;

use crate::error::Result;

/// Receives notifications after file mutations commit.
///
/// Implementations can maintain search indexes, caches and similar
/// derived state. Notifications fire only after the triggering batch has
/// committed, and they are best-effort: the engine logs a returned error
/// and moves on, it never fails or rolls back the filesystem operation.
#[async_trait]
pub trait FileObserver: Send + Sync {
    /// A file's content was written or replaced. `content` is the full
    /// content after the write, not a delta.
    async fn on_write(&self, path: &str, content: &[u8]) -> Result<()>;

    /// A non-directory entry was removed.
    async fn on_remove(&self, path: &str) -> Result<()>;

    /// A non-directory entry moved from `old_path` to `new_path`.
    async fn on_move(&self, old_path: &str, new_path: &str) -> Result<()>;
}

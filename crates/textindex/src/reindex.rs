//! Full-volume index rebuilds.

use log::{debug, warn};

use kvfs::{Engine, EntryKind, Result};

use crate::indexer::Indexer;
use crate::tokenize::is_binary;

/// Options for [`Indexer::reindex`].
#[derive(Debug, Clone)]
pub struct ReindexOptions {
    /// Discard the existing index before rebuilding.
    pub drop: bool,
    /// Directory to index from, normally the root.
    pub root: String,
}

impl Default for ReindexOptions {
    fn default() -> Self {
        Self {
            drop: false,
            root: "/".to_string(),
        }
    }
}

impl Indexer {
    /// Walk every file under `opts.root` and index the text ones,
    /// creating the index if the volume has none. Returns the number
    /// of files indexed.
    ///
    /// Unlike the write path, embeddings here are generated inline so
    /// a rebuild finishes with the vector index complete. Per-file
    /// read, index and embedding failures are logged and skipped rather
    /// than aborting the walk.
    pub async fn reindex(&self, engine: &Engine, opts: &ReindexOptions) -> Result<usize> {
        let root = if opts.root.is_empty() { "/" } else { &opts.root };
        if opts.drop && self.index_exists().await? {
            self.drop_index().await?;
        }
        self.ensure_index().await?;

        let files = engine.find(root, None, Some(EntryKind::File)).await?;
        let mut indexed = 0usize;
        for entry in files {
            let content = match engine.read_file(&entry.path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("failed to read {}: {e}", entry.path);
                    continue;
                }
            };
            if is_binary(&content) {
                continue;
            }
            let text = String::from_utf8_lossy(&content).into_owned();
            if let Err(e) = self.index_document(&entry.path, &text).await {
                warn!("failed to index {}: {e}", entry.path);
                continue;
            }
            self.embed_inline(&entry.path, &text).await;
            indexed += 1;
            debug!("indexed {}", entry.path);
        }
        Ok(indexed)
    }

    async fn embed_inline(&self, doc_path: &str, content: &str) {
        let Some(embedder) = &self.embedder else {
            return;
        };
        if content.is_empty() {
            return;
        }
        match embedder.embed(content).await {
            Ok(vector) => {
                let mut batch = kvfs::Batch::new();
                batch.put_string(
                    self.keys.vector(doc_path),
                    crate::embed::vector_to_bytes(&vector),
                );
                if let Err(e) = self.store.apply(batch).await {
                    warn!("failed to store embedding for {doc_path}: {e}");
                }
            }
            Err(e) => warn!("failed to embed {doc_path}: {e}"),
        }
    }
}

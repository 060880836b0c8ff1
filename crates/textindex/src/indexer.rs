//! Index maintenance driven by filesystem notifications.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use log::warn;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use kvfs::observer::FileObserver;
use kvfs::{path, Batch, Error, KvStore, Result};

use crate::embed::{vector_to_bytes, Embedder, EMBED_TIMEOUT_SECONDS};
use crate::keys::{IndexKeys, SCHEMA_VERSION};
use crate::tokenize::{is_binary, tokenize};

/// Keeps a volume's search index in sync with file mutations.
///
/// Attached to an [`kvfs::Engine`] as its observer, the indexer
/// maintains one searchable document per text file plus an inverted
/// token index; with an embedder configured it also stores one
/// embedding vector per document, generated on a detached task so the
/// triggering write never waits on the embedding API.
///
/// Nothing is indexed until the index has been created for the volume
/// (normally by a first `reindex`), so untouched volumes carry no
/// index overhead.
pub struct Indexer {
    pub(crate) store: Arc<dyn KvStore>,
    pub(crate) keys: IndexKeys,
    pub(crate) embedder: Option<Arc<dyn Embedder>>,
    embed_timeout: Duration,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl Indexer {
    pub fn new(store: Arc<dyn KvStore>, volume: &str) -> Self {
        Self {
            store,
            keys: IndexKeys::new(volume),
            embedder: None,
            embed_timeout: Duration::from_secs(EMBED_TIMEOUT_SECONDS),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Attach an embedder, enabling vector indexing and search.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Cap on how long a detached embedding task may run before it is
    /// abandoned.
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    /// Whether the volume has an index to maintain. A marker written
    /// by an older schema reads as no index, so stale layouts are not
    /// extended.
    pub async fn index_exists(&self) -> Result<bool> {
        let marker = self
            .store
            .get_string(&self.keys.version())
            .await
            .map_err(|e| Error::store("index", "/", e))?;
        Ok(marker.as_deref() == Some(SCHEMA_VERSION.as_bytes()))
    }

    /// Create the index marker for the volume if absent. Records left
    /// behind by an older schema are dropped first.
    pub async fn ensure_index(&self) -> Result<()> {
        if self.index_exists().await? {
            return Ok(());
        }
        let stale = self
            .store
            .exists(&self.keys.version())
            .await
            .map_err(|e| Error::store("index", "/", e))?;
        if stale {
            self.drop_index().await?;
        }
        let mut batch = Batch::new();
        batch.put_string(self.keys.version(), SCHEMA_VERSION.as_bytes().to_vec());
        self.store
            .apply(batch)
            .await
            .map_err(|e| Error::store("index", "/", e))
    }

    /// Delete the index marker and every document, token and vector
    /// record of the volume.
    pub async fn drop_index(&self) -> Result<()> {
        let mut doomed = vec![self.keys.version()];
        for pattern in [
            self.keys.document_scan_pattern(),
            self.keys.token_scan_pattern(),
            self.keys.vector_scan_pattern(),
        ] {
            let mut keys = self
                .store
                .scan_keys(&pattern)
                .await
                .map_err(|e| Error::store("index", "/", e))?;
            doomed.append(&mut keys);
        }
        let mut batch = Batch::new();
        batch.delete_keys(doomed);
        self.store
            .apply(batch)
            .await
            .map_err(|e| Error::store("index", "/", e))
    }

    /// Number of documents currently indexed.
    pub async fn document_count(&self) -> Result<usize> {
        let keys = self
            .store
            .scan_keys(&self.keys.document_scan_pattern())
            .await
            .map_err(|e| Error::store("index", "/", e))?;
        Ok(keys.len())
    }

    /// Write or replace the document for `path` and adjust the token
    /// index, all in one batch.
    pub(crate) async fn index_document(&self, doc_path: &str, content: &str) -> Result<()> {
        let old_tokens = self.document_tokens(doc_path).await?;
        let new_tokens = tokens_for(doc_path, content);
        let doc_key = self.keys.document(doc_path);
        let mut batch = Batch::new();
        for token in old_tokens.difference(&new_tokens) {
            batch.remove_member(self.keys.token(token), doc_path);
        }
        batch.delete_keys([doc_key.clone()]);
        batch.put_hash(doc_key, document_fields(doc_path, content));
        for token in &new_tokens {
            batch.add_member(self.keys.token(token), doc_path);
        }
        self.store
            .apply(batch)
            .await
            .map_err(|e| Error::store("index", doc_path, e))
    }

    // Tokens currently credited to the document at `path`, reproduced
    // from its stored content. Empty when the document does not exist.
    async fn document_tokens(&self, doc_path: &str) -> Result<BTreeSet<String>> {
        let content = self
            .store
            .hash_get(&self.keys.document(doc_path), "content")
            .await
            .map_err(|e| Error::store("index", doc_path, e))?;
        Ok(match content {
            Some(content) => tokens_for(doc_path, &content),
            None => BTreeSet::new(),
        })
    }

    // Hands the content to the embedder on a detached task; the result
    // lands in the vector key whenever it arrives. The task carries its
    // own deadline so a stalled embedder cannot wedge `flush`.
    async fn dispatch_embed(&self, doc_path: &str, content: &str) {
        let Some(embedder) = &self.embedder else {
            return;
        };
        if content.is_empty() {
            return;
        }
        let embedder = Arc::clone(embedder);
        let store = Arc::clone(&self.store);
        let vector_key = self.keys.vector(doc_path);
        let doc_path = doc_path.to_string();
        let content = content.to_string();
        let deadline = self.embed_timeout;
        let handle = tokio::spawn(async move {
            let vector = match tokio::time::timeout(deadline, embedder.embed(&content)).await {
                Ok(Ok(vector)) => vector,
                Ok(Err(e)) => {
                    warn!("embedding failed for {doc_path}: {e}");
                    return;
                }
                Err(_) => {
                    warn!("embedding for {doc_path} timed out after {deadline:?}");
                    return;
                }
            };
            let mut batch = Batch::new();
            batch.put_string(vector_key, vector_to_bytes(&vector));
            if let Err(e) = store.apply(batch).await {
                warn!("failed to store embedding for {doc_path}: {e}");
            }
        });
        self.pending.lock().await.push(handle);
    }

    /// Wait for outstanding embedding tasks. Call before process exit
    /// so detached embeddings are not lost.
    pub async fn flush(&self) {
        let handles: Vec<JoinHandle<()>> = self.pending.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }
}

#[async_trait]
impl FileObserver for Indexer {
    async fn on_write(&self, doc_path: &str, content: &[u8]) -> Result<()> {
        if is_binary(content) {
            return Ok(());
        }
        if !self.index_exists().await? {
            return Ok(());
        }
        let text = String::from_utf8_lossy(content).into_owned();
        self.index_document(doc_path, &text).await?;
        self.dispatch_embed(doc_path, &text).await;
        Ok(())
    }

    async fn on_remove(&self, doc_path: &str) -> Result<()> {
        if !self.index_exists().await? {
            return Ok(());
        }
        let tokens = self.document_tokens(doc_path).await?;
        let mut batch = Batch::new();
        for token in &tokens {
            batch.remove_member(self.keys.token(token), doc_path);
        }
        batch.delete_keys([self.keys.document(doc_path), self.keys.vector(doc_path)]);
        self.store
            .apply(batch)
            .await
            .map_err(|e| Error::store("index", doc_path, e))
    }

    async fn on_move(&self, old_path: &str, new_path: &str) -> Result<()> {
        if !self.index_exists().await? {
            return Ok(());
        }
        let content = self
            .store
            .hash_get(&self.keys.document(old_path), "content")
            .await
            .map_err(|e| Error::store("index", old_path, e))?;
        let Some(content) = content else {
            return Ok(());
        };
        let old_tokens = tokens_for(old_path, &content);
        let stale_tokens = self.document_tokens(new_path).await?;
        let new_tokens = tokens_for(new_path, &content);
        let mut batch = Batch::new();
        for token in &old_tokens {
            batch.remove_member(self.keys.token(token), old_path);
        }
        for token in stale_tokens.difference(&new_tokens) {
            batch.remove_member(self.keys.token(token), new_path);
        }
        batch.delete_keys([self.keys.document(old_path), self.keys.document(new_path)]);
        batch.put_hash(self.keys.document(new_path), document_fields(new_path, &content));
        for token in &new_tokens {
            batch.add_member(self.keys.token(token), new_path);
        }
        let old_vector = self.keys.vector(old_path);
        let has_vector = self
            .store
            .exists(&old_vector)
            .await
            .map_err(|e| Error::store("index", old_path, e))?;
        if has_vector {
            batch.rename_key(old_vector, self.keys.vector(new_path));
        } else {
            batch.delete_keys([self.keys.vector(new_path)]);
        }
        self.store
            .apply(batch)
            .await
            .map_err(|e| Error::store("index", old_path, e))
    }
}

pub(crate) fn tokens_for(doc_path: &str, content: &str) -> BTreeSet<String> {
    let mut tokens = tokenize(content);
    tokens.extend(tokenize(&path::base_name(doc_path)));
    tokens
}

fn document_fields(doc_path: &str, content: &str) -> Vec<(String, String)> {
    vec![
        ("content".to_string(), content.to_string()),
        ("path".to_string(), doc_path.to_string()),
        ("dir".to_string(), path::parent(doc_path)),
        ("filename".to_string(), path::base_name(doc_path)),
        ("mtime".to_string(), unix_now().to_string()),
        ("size".to_string(), content.len().to_string()),
    ]
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

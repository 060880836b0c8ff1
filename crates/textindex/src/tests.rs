use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use kvfs::observer::FileObserver;
use kvfs::{Engine, Error, KvStore, MemoryStore};

use crate::embed::Embedder;
use crate::keys::IndexKeys;
use crate::{Indexer, ReindexOptions};

// Engine whose writes feed the indexer, with the index already
// created so they take effect.
async fn indexed_engine() -> (Engine, Arc<Indexer>) {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let indexer = Arc::new(Indexer::new(Arc::clone(&store), "test"));
    let observer: Arc<dyn FileObserver> = indexer.clone();
    let engine = Engine::new(store, "test").with_observer(observer);
    engine.init().await.unwrap();
    indexer.ensure_index().await.unwrap();
    (engine, indexer)
}

// Deterministic stand-in for the embedding API: texts mentioning
// "alpha" land on one axis, everything else on the other.
struct StubEmbedder;

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(if text.contains("alpha") {
            vec![1.0, 0.0]
        } else {
            vec![0.0, 1.0]
        })
    }

    fn dimension(&self) -> usize {
        2
    }
}

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("embedding service unavailable")
    }

    fn dimension(&self) -> usize {
        2
    }
}

// An embedding call that never returns.
struct StalledEmbedder;

#[async_trait]
impl Embedder for StalledEmbedder {
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        std::future::pending().await
    }

    fn dimension(&self) -> usize {
        2
    }
}

async fn engine_with_embedder(embedder: Arc<dyn Embedder>) -> (Engine, Arc<Indexer>) {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let indexer = Arc::new(Indexer::new(Arc::clone(&store), "test").with_embedder(embedder));
    let observer: Arc<dyn FileObserver> = indexer.clone();
    let engine = Engine::new(store, "test").with_observer(observer);
    engine.init().await.unwrap();
    indexer.ensure_index().await.unwrap();
    (engine, indexer)
}

#[tokio::test]
async fn write_indexes_document() {
    let (engine, indexer) = indexed_engine().await;
    engine
        .write_file("/note.txt", b"hello from the index")
        .await
        .unwrap();

    let hits = indexer.search("hello", None, 0).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "/note.txt");
    assert_eq!(hits[0].content, "hello from the index");
}

#[tokio::test]
async fn search_requires_every_term() {
    let (engine, indexer) = indexed_engine().await;
    engine
        .write_file("/a.txt", b"harbor storage layer")
        .await
        .unwrap();
    engine.write_file("/b.txt", b"harbor cache").await.unwrap();

    let hits = indexer.search("harbor storage", None, 0).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "/a.txt");

    let hits = indexer.search("harbor", None, 0).await.unwrap();
    let paths: Vec<&str> = hits.iter().map(|h| h.path.as_str()).collect();
    assert_eq!(paths, vec!["/a.txt", "/b.txt"]);
}

#[tokio::test]
async fn search_ranks_by_occurrences() {
    let (engine, indexer) = indexed_engine().await;
    engine.write_file("/one.txt", b"drill").await.unwrap();
    engine
        .write_file("/many.txt", b"drill drill drill")
        .await
        .unwrap();

    let hits = indexer.search("drill", None, 0).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].path, "/many.txt");
    assert_eq!(hits[0].score, 3.0);
    assert_eq!(hits[1].path, "/one.txt");
    assert_eq!(hits[1].score, 1.0);
}

#[tokio::test]
async fn filename_tokens_are_searchable() {
    let (engine, indexer) = indexed_engine().await;
    engine.mkdir("/notes", false).await.unwrap();
    engine
        .write_file("/notes/meeting.txt", b"x")
        .await
        .unwrap();

    let hits = indexer.search("meeting", None, 0).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "/notes/meeting.txt");
}

#[tokio::test]
async fn empty_query_returns_nothing() {
    let (engine, indexer) = indexed_engine().await;
    engine.write_file("/a.txt", b"something").await.unwrap();

    assert!(indexer.search("", None, 0).await.unwrap().is_empty());
    assert!(indexer.search("!!!", None, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn binary_content_is_not_indexed() {
    let (engine, indexer) = indexed_engine().await;
    engine
        .write_file("/blob.bin", b"magic\x00payload")
        .await
        .unwrap();

    assert!(indexer.search("magic", None, 0).await.unwrap().is_empty());
    let doc_key = IndexKeys::new("test").document("/blob.bin");
    assert!(!engine.store().exists(&doc_key).await.unwrap());
}

#[tokio::test]
async fn nothing_indexed_before_index_created() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let indexer = Arc::new(Indexer::new(Arc::clone(&store), "test"));
    let observer: Arc<dyn FileObserver> = indexer.clone();
    let engine = Engine::new(store, "test").with_observer(observer);
    engine.init().await.unwrap();

    engine.write_file("/early.txt", b"too soon").await.unwrap();
    indexer.ensure_index().await.unwrap();

    assert!(indexer.search("soon", None, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn search_without_index_fails() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let indexer = Indexer::new(Arc::clone(&store), "test");
    let engine = Engine::new(store, "test");
    engine.init().await.unwrap();

    let err = indexer.search("anything", None, 0).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn overwrite_replaces_tokens() {
    let (engine, indexer) = indexed_engine().await;
    engine.write_file("/f.txt", b"alpha words").await.unwrap();
    engine.write_file("/f.txt", b"beta words").await.unwrap();

    assert!(indexer.search("alpha", None, 0).await.unwrap().is_empty());
    let hits = indexer.search("beta", None, 0).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].content, "beta words");
}

#[tokio::test]
async fn append_extends_indexed_content() {
    let (engine, indexer) = indexed_engine().await;
    engine.write_file("/log.txt", b"first line").await.unwrap();
    engine
        .append_file("/log.txt", b" second part")
        .await
        .unwrap();

    let hits = indexer.search("second", None, 0).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].content, "first line second part");
}

#[tokio::test]
async fn remove_clears_index_records() {
    let (engine, indexer) = indexed_engine().await;
    engine
        .write_file("/gone.txt", b"ephemeral words")
        .await
        .unwrap();
    engine.remove("/gone.txt").await.unwrap();

    assert!(indexer
        .search("ephemeral", None, 0)
        .await
        .unwrap()
        .is_empty());
    let tokens = engine.store().scan_keys("fs:test:tok:*").await.unwrap();
    assert!(tokens.is_empty(), "stale token sets: {tokens:?}");
}

#[tokio::test]
async fn move_reindexes_under_new_path() {
    let (engine, indexer) = indexed_engine().await;
    engine
        .write_file("/old.txt", b"portable words")
        .await
        .unwrap();
    engine.rename("/old.txt", "/new.txt").await.unwrap();

    let hits = indexer.search("portable", None, 0).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "/new.txt");

    let hits = indexer.search("old", None, 0).await.unwrap();
    assert!(hits.is_empty(), "old filename token survived the move");
    let hits = indexer.search("new", None, 0).await.unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn move_over_indexed_file_clears_stale_tokens() {
    let (engine, indexer) = indexed_engine().await;
    engine.write_file("/a.txt", b"alpha only").await.unwrap();
    engine.write_file("/b.txt", b"beta only").await.unwrap();
    engine.rename("/a.txt", "/b.txt").await.unwrap();

    assert!(indexer.search("beta", None, 0).await.unwrap().is_empty());
    let hits = indexer.search("alpha", None, 0).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "/b.txt");
}

#[tokio::test]
async fn dir_filter_scopes_hits() {
    let (engine, indexer) = indexed_engine().await;
    engine.mkdir("/docs", false).await.unwrap();
    engine.mkdir("/src", false).await.unwrap();
    engine
        .write_file("/docs/a.txt", b"needle here")
        .await
        .unwrap();
    engine
        .write_file("/src/b.txt", b"needle there")
        .await
        .unwrap();

    let hits = indexer.search("needle", Some("/docs"), 0).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "/docs/a.txt");

    let hits = indexer.search("needle", Some("/"), 0).await.unwrap();
    assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn dir_filter_respects_name_boundaries() {
    let (engine, indexer) = indexed_engine().await;
    engine.mkdir("/docs", false).await.unwrap();
    engine.mkdir("/docs-old", false).await.unwrap();
    engine
        .write_file("/docs-old/a.txt", b"needle aged")
        .await
        .unwrap();

    let hits = indexer.search("needle", Some("/docs"), 0).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn search_limit_caps_results() {
    let (engine, indexer) = indexed_engine().await;
    for name in ["/a.txt", "/b.txt", "/c.txt"] {
        engine.write_file(name, b"common words").await.unwrap();
    }

    let hits = indexer.search("common", None, 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].path, "/a.txt");
    assert_eq!(hits[1].path, "/b.txt");
}

#[tokio::test]
async fn reindex_builds_from_existing_files() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let engine = Engine::new(Arc::clone(&store), "test");
    engine.init().await.unwrap();
    engine.mkdir("/docs", false).await.unwrap();
    engine
        .write_file("/docs/a.txt", b"historic words")
        .await
        .unwrap();
    engine.write_file("/b.txt", b"more words").await.unwrap();
    engine
        .write_file("/blob.bin", b"\x00binary")
        .await
        .unwrap();

    let indexer = Indexer::new(store, "test");
    let count = indexer
        .reindex(&engine, &ReindexOptions::default())
        .await
        .unwrap();
    assert_eq!(count, 2);

    let hits = indexer.search("words", None, 0).await.unwrap();
    assert_eq!(hits.len(), 2);
    let hits = indexer.search("historic", None, 0).await.unwrap();
    assert_eq!(hits[0].path, "/docs/a.txt");
}

#[tokio::test]
async fn reindex_scoped_to_subdirectory() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let engine = Engine::new(Arc::clone(&store), "test");
    engine.init().await.unwrap();
    engine.mkdir("/docs", false).await.unwrap();
    engine
        .write_file("/docs/in.txt", b"inside words")
        .await
        .unwrap();
    engine.write_file("/out.txt", b"outside words").await.unwrap();

    let indexer = Indexer::new(store, "test");
    let opts = ReindexOptions {
        drop: false,
        root: "/docs".to_string(),
    };
    let count = indexer.reindex(&engine, &opts).await.unwrap();
    assert_eq!(count, 1);
    assert!(indexer.search("outside", None, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn reindex_skips_unreadable_files() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let engine = Engine::new(Arc::clone(&store), "test");
    engine.init().await.unwrap();
    engine.write_file("/good.txt", b"fine words").await.unwrap();
    engine.write_file("/bad.txt", b"doomed").await.unwrap();

    // Clobber the content record's kind so reading /bad.txt fails.
    let data_key = kvfs::KeySpace::new("test").data("/bad.txt");
    let mut batch = kvfs::Batch::new();
    batch.delete_keys([data_key.clone()]);
    batch.add_member(data_key, "junk");
    engine.store().apply(batch).await.unwrap();

    let indexer = Indexer::new(store, "test");
    let count = indexer
        .reindex(&engine, &ReindexOptions::default())
        .await
        .unwrap();
    assert_eq!(count, 1);

    let hits = indexer.search("fine", None, 0).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "/good.txt");
}

#[tokio::test]
async fn reindex_drop_discards_stale_documents() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let engine = Engine::new(Arc::clone(&store), "test");
    engine.init().await.unwrap();
    engine
        .write_file("/stale.txt", b"doomed words")
        .await
        .unwrap();

    let indexer = Indexer::new(store, "test");
    indexer
        .reindex(&engine, &ReindexOptions::default())
        .await
        .unwrap();

    // No observer attached, so the index never hears about the delete.
    engine.remove("/stale.txt").await.unwrap();
    let hits = indexer.search("doomed", None, 0).await.unwrap();
    assert_eq!(hits.len(), 1);

    let opts = ReindexOptions {
        drop: true,
        root: "/".to_string(),
    };
    indexer.reindex(&engine, &opts).await.unwrap();
    assert!(indexer.search("doomed", None, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn vector_search_ranks_by_similarity() {
    let (engine, indexer) = engine_with_embedder(Arc::new(StubEmbedder)).await;
    engine
        .write_file("/a.txt", b"alpha subject matter")
        .await
        .unwrap();
    engine
        .write_file("/b.txt", b"unrelated subject")
        .await
        .unwrap();
    indexer.flush().await;

    let hits = indexer
        .vector_search("alpha question", None, None, 0)
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].path, "/a.txt");
    assert!(hits[0].score > 0.99);
    assert!(hits[1].score < 0.01);
    assert_eq!(hits[0].content, "alpha subject matter");
}

#[tokio::test]
async fn vector_search_text_filter_narrows_candidates() {
    let (engine, indexer) = engine_with_embedder(Arc::new(StubEmbedder)).await;
    engine.write_file("/a.txt", b"alpha report").await.unwrap();
    engine.write_file("/b.txt", b"alpha summary").await.unwrap();
    indexer.flush().await;

    // Both documents embed identically; only the filter separates them.
    let hits = indexer
        .vector_search("alpha", None, Some("report"), 0)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "/a.txt");

    let hits = indexer
        .vector_search("alpha", None, Some("missing"), 0)
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn vector_search_without_embedder_fails() {
    let (_engine, indexer) = indexed_engine().await;
    let err = indexer
        .vector_search("anything", None, None, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn move_carries_vector() {
    let (engine, indexer) = engine_with_embedder(Arc::new(StubEmbedder)).await;
    engine.write_file("/a.txt", b"alpha payload").await.unwrap();
    indexer.flush().await;
    engine.rename("/a.txt", "/b.txt").await.unwrap();

    let hits = indexer.vector_search("alpha", None, None, 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "/b.txt");
    assert!(hits[0].score > 0.99);
}

#[tokio::test]
async fn embedding_failure_does_not_fail_write() {
    let (engine, indexer) = engine_with_embedder(Arc::new(FailingEmbedder)).await;
    engine
        .write_file("/a.txt", b"still indexed")
        .await
        .unwrap();
    indexer.flush().await;

    let hits = indexer.search("indexed", None, 0).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(indexer.vector_search("query", None, None, 0).await.is_err());
}

#[tokio::test]
async fn stalled_embedding_is_abandoned_at_the_deadline() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let indexer = Arc::new(
        Indexer::new(Arc::clone(&store), "test")
            .with_embedder(Arc::new(StalledEmbedder))
            .with_embed_timeout(Duration::from_millis(20)),
    );
    let observer: Arc<dyn FileObserver> = indexer.clone();
    let engine = Engine::new(store, "test").with_observer(observer);
    engine.init().await.unwrap();
    indexer.ensure_index().await.unwrap();

    engine.write_file("/slow.txt", b"never embeds").await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), indexer.flush())
        .await
        .expect("flush must finish once the embedding deadline passes");

    let vector_key = IndexKeys::new("test").vector("/slow.txt");
    assert!(!engine.store().exists(&vector_key).await.unwrap());
    // The document itself was still indexed on the write path.
    let hits = indexer.search("embeds", None, 0).await.unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn reindex_embeds_inline() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let engine = Engine::new(Arc::clone(&store), "test");
    engine.init().await.unwrap();
    engine.write_file("/a.txt", b"alpha archive").await.unwrap();

    let indexer = Indexer::new(store, "test").with_embedder(Arc::new(StubEmbedder));
    indexer
        .reindex(&engine, &ReindexOptions::default())
        .await
        .unwrap();

    let hits = indexer.vector_search("alpha", None, None, 0).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "/a.txt");
}

#[tokio::test]
async fn stale_schema_marker_reads_as_unindexed() {
    let (engine, indexer) = indexed_engine().await;
    engine.write_file("/old.txt", b"legacy words").await.unwrap();

    // Rewrite the marker as if an older layout had left it behind.
    let mut batch = kvfs::Batch::new();
    batch.put_string(IndexKeys::new("test").version(), b"0".to_vec());
    engine.store().apply(batch).await.unwrap();

    assert!(!indexer.index_exists().await.unwrap());
    assert!(indexer.search("legacy", None, 0).await.is_err());

    // Recreating the index clears the stale records.
    indexer.ensure_index().await.unwrap();
    assert!(indexer.index_exists().await.unwrap());
    assert!(indexer.search("legacy", None, 0).await.unwrap().is_empty());
}

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

use kvfs::{Engine, EntryKind, FileObserver, KvStore, MemoryStore};
use litestore::SqliteStore;
use textindex::{EmbedConfig, HttpEmbedder, Indexer};

/// How to reach the store for one invocation, straight from the
/// global CLI flags.
#[derive(Debug, Default)]
pub struct StoreOptions {
    pub db: Option<PathBuf>,
    pub memory: bool,
    pub volume: Option<String>,
    pub json: bool,
    pub no_index: bool,
}

/// Everything a command handler needs: the engine over the selected
/// volume, the indexer when indexing is enabled, and output mode.
pub struct CliContext {
    pub engine: Engine,
    pub indexer: Option<Arc<Indexer>>,
    pub json: bool,
}

impl CliContext {
    /// The indexer, or an error telling the user indexing is off.
    pub fn indexer(&self) -> Result<&Arc<Indexer>> {
        self.indexer
            .as_ref()
            .ok_or_else(|| anyhow!("indexing is disabled (--no-index)"))
    }

    /// Wait for background embedding work before the process exits.
    pub async fn shutdown(&self) {
        if let Some(indexer) = &self.indexer {
            indexer.flush().await;
        }
    }
}

/// Database file precedence: `--db` flag, `$KVFS_DB`, then
/// `~/.kvfs.db`.
pub fn resolve_db_path(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }
    if let Ok(path) = env::var("KVFS_DB") {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let home = env::var("HOME")
        .map_err(|_| anyhow!("cannot locate home directory; pass --db or set KVFS_DB"))?;
    Ok(Path::new(&home).join(".kvfs.db"))
}

/// Volume precedence: `--volume` flag, `$KVFS_VOLUME`, then "main".
pub fn resolve_volume(flag: Option<String>) -> String {
    flag.filter(|v| !v.is_empty())
        .or_else(|| env::var("KVFS_VOLUME").ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| kvfs::DEFAULT_VOLUME.to_string())
}

/// Open the store, wire up indexing, and make sure the volume root
/// exists. Embedding support is attached when the environment carries
/// an API key.
pub async fn open_context(opts: StoreOptions) -> Result<CliContext> {
    let store: Arc<dyn KvStore> = if opts.memory {
        Arc::new(MemoryStore::new())
    } else {
        let path = resolve_db_path(opts.db)?;
        let sqlite = SqliteStore::open(&path)
            .with_context(|| format!("cannot open store at {}", path.display()))?;
        Arc::new(sqlite)
    };
    let volume = resolve_volume(opts.volume);

    let mut engine = Engine::new(Arc::clone(&store), &volume);
    let mut indexer = None;
    if !opts.no_index {
        let mut ix = Indexer::new(store, &volume);
        if let Some(config) = EmbedConfig::from_env() {
            ix = ix.with_embedder(Arc::new(HttpEmbedder::new(config)?));
        }
        let ix = Arc::new(ix);
        let observer: Arc<dyn FileObserver> = ix.clone();
        engine = engine.with_observer(observer);
        indexer = Some(ix);
    }

    // The volume root is created on demand so every command works
    // against a fresh store.
    engine.init().await?;

    Ok(CliContext {
        engine,
        indexer,
        json: opts.json,
    })
}

/// Parse a `find -type` style filter.
pub fn parse_kind(filter: &str) -> Result<EntryKind> {
    match filter {
        "f" | "file" => Ok(EntryKind::File),
        "d" | "dir" => Ok(EntryKind::Dir),
        "l" | "symlink" => Ok(EntryKind::Symlink),
        other => Err(anyhow!("invalid type filter '{other}' (use f, d, or l)")),
    }
}

#[cfg(test)]
pub async fn memory_context() -> CliContext {
    let opts = StoreOptions {
        memory: true,
        no_index: true,
        ..StoreOptions::default()
    };
    open_context(opts).await.unwrap()
}

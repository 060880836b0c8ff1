//! textindex - search over kvfs volumes
//!
//! Maintains a token index and optional embedding vectors for the text
//! files of a volume, stored in the same key-value store as the
//! filesystem itself. The [`Indexer`] implements
//! [`kvfs::observer::FileObserver`], so attaching it to an engine
//! keeps the index current as files change; [`Indexer::reindex`]
//! rebuilds it from scratch.
//!
//! Index records live under three key families per volume:
//! `fs:{volume}:idx:{path}` holds the searchable document, one
//! `fs:{volume}:tok:{token}` set per token holds the paths containing
//! it, and `fs:{volume}:vec:{path}` holds the packed embedding vector.

pub mod embed;
mod indexer;
mod keys;
pub mod query;
pub mod reindex;
pub mod tokenize;

pub use embed::{EmbedConfig, Embedder, HttpEmbedder};
pub use indexer::Indexer;
pub use keys::SCHEMA_VERSION;
pub use query::{is_simple_pattern, SearchHit, DEFAULT_SEARCH_LIMIT};
pub use reindex::ReindexOptions;

#[cfg(test)]
mod tests;

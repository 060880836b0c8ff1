//! Token and vector queries against an indexed volume.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use kvfs::{Error, Result, StoreError};

use crate::embed::{bytes_to_vector, cosine_similarity};
use crate::indexer::Indexer;
use crate::tokenize::{occurrence_count, tokenize};

/// Results returned when searching a volume without an index.
const NO_INDEX_HINT: &str = "volume has no search index; run reindex first";

/// Default number of hits returned by searches.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// One search result with its full document content.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub path: String,
    pub content: String,
    pub score: f64,
}

impl Indexer {
    /// Token search: returns documents containing every term of the
    /// query, ranked by how often the terms occur, size-capped to
    /// `limit` (0 means [`DEFAULT_SEARCH_LIMIT`]).
    ///
    /// `dir_filter` restricts hits to files under the given directory.
    pub async fn search(
        &self,
        query: &str,
        dir_filter: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        if !self.index_exists().await? {
            return Err(Error::invalid_argument(NO_INDEX_HINT));
        }
        let terms = tokenize(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let candidates = self.token_candidates(&terms).await?;

        let dir_prefix = dir_filter.map(kvfs::path::normalize);
        let mut hits = Vec::new();
        for path in candidates {
            if let Some(prefix) = &dir_prefix {
                if !path_in_dir(&path, prefix) {
                    continue;
                }
            }
            let content = self
                .store
                .hash_get(&self.keys.document(&path), "content")
                .await
                .map_err(|e| Error::store("search", &path, e))?
                .unwrap_or_default();
            let score = occurrence_count(&content, &terms) as f64;
            hits.push(SearchHit { path, content, score });
        }
        sort_hits(&mut hits);
        hits.truncate(effective_limit(limit));
        Ok(hits)
    }

    /// Vector search: embeds the query and ranks stored document
    /// vectors by cosine similarity, returning the best `top_k` (0
    /// means [`DEFAULT_SEARCH_LIMIT`]).
    ///
    /// `text_filter` narrows the ranked set to documents containing
    /// every filter term, through the token index; a filter with no
    /// searchable tokens filters nothing.
    pub async fn vector_search(
        &self,
        query: &str,
        dir_filter: Option<&str>,
        text_filter: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let Some(embedder) = &self.embedder else {
            return Err(Error::invalid_argument(
                "no embedding API configured; set KVFS_EMBED_API_KEY",
            ));
        };
        if !self.index_exists().await? {
            return Err(Error::invalid_argument(NO_INDEX_HINT));
        }
        let mut allowed: Option<HashSet<String>> = None;
        if let Some(filter) = text_filter {
            let terms = tokenize(filter);
            if !terms.is_empty() {
                let candidates = self.token_candidates(&terms).await?;
                if candidates.is_empty() {
                    return Ok(Vec::new());
                }
                allowed = Some(candidates.into_iter().collect());
            }
        }
        let query_vector = embedder
            .embed(query)
            .await
            .map_err(|e| Error::store("embed", "/", StoreError::backend(e.to_string())))?;

        let vector_keys = self
            .store
            .scan_keys(&self.keys.vector_scan_pattern())
            .await
            .map_err(|e| Error::store("search", "/", e))?;
        let dir_prefix = dir_filter.map(kvfs::path::normalize);
        let mut hits = Vec::new();
        for key in vector_keys {
            let Some(path) = self.keys.path_from_vector_key(&key) else {
                continue;
            };
            if allowed.as_ref().is_some_and(|set| !set.contains(path)) {
                continue;
            }
            if let Some(prefix) = &dir_prefix {
                if !path_in_dir(path, prefix) {
                    continue;
                }
            }
            let Some(bytes) = self
                .store
                .get_string(&key)
                .await
                .map_err(|e| Error::store("search", path, e))?
            else {
                continue;
            };
            let score = cosine_similarity(&query_vector, &bytes_to_vector(&bytes));
            let content = self
                .store
                .hash_get(&self.keys.document(path), "content")
                .await
                .map_err(|e| Error::store("search", path, e))?
                .unwrap_or_default();
            hits.push(SearchHit {
                path: path.to_string(),
                content,
                score,
            });
        }
        sort_hits(&mut hits);
        hits.truncate(effective_limit(top_k));
        Ok(hits)
    }

    // Paths present in the posting set of every term.
    async fn token_candidates(&self, terms: &BTreeSet<String>) -> Result<Vec<String>> {
        let mut candidates: Option<Vec<String>> = None;
        for term in terms {
            let members = self
                .store
                .set_members(&self.keys.token(term))
                .await
                .map_err(|e| Error::store("search", "/", e))?;
            candidates = Some(match candidates {
                None => members,
                Some(previous) => previous
                    .into_iter()
                    .filter(|path| members.contains(path))
                    .collect(),
            });
            if candidates.as_ref().is_some_and(Vec::is_empty) {
                break;
            }
        }
        Ok(candidates.unwrap_or_default())
    }
}

fn effective_limit(limit: usize) -> usize {
    if limit == 0 {
        DEFAULT_SEARCH_LIMIT
    } else {
        limit
    }
}

// Highest score first; ties resolve by path so results are stable.
fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
}

// True when `path` names a file under directory `dir`.
fn path_in_dir(path: &str, dir: &str) -> bool {
    if dir == "/" {
        return true;
    }
    path.strip_prefix(dir)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Whether a grep pattern is plain enough that its alphanumeric words
/// must appear verbatim in any matching line. Such patterns can be
/// narrowed through the token index before running the regex.
pub fn is_simple_pattern(pattern: &str) -> bool {
    const META: &[char] = &[
        '[', ']', '(', ')', '{', '}', '|', '+', '\\', '^', '$', '?',
    ];
    if pattern.contains(META) {
        return false;
    }
    !pattern.contains(".*") && !pattern.contains(".+")
}

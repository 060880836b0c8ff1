//! Index key layout.
//!
//! All index state for a volume lives beside the filesystem keys:
//!
//! ```text
//! fs:{volume}:idx-version    string  schema marker; present iff indexed
//! fs:{volume}:idx:{path}     hash    one searchable document per file
//! fs:{volume}:tok:{token}    set     paths whose document holds token
//! fs:{volume}:vec:{path}     string  packed f32 embedding vector
//! ```

/// Bumped when the document or token layout changes; a mismatch calls
/// for a reindex.
pub const SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone)]
pub(crate) struct IndexKeys {
    volume: String,
}

impl IndexKeys {
    pub(crate) fn new(volume: &str) -> Self {
        Self {
            volume: volume.to_string(),
        }
    }

    pub(crate) fn version(&self) -> String {
        format!("fs:{}:idx-version", self.volume)
    }

    pub(crate) fn document(&self, path: &str) -> String {
        format!("fs:{}:idx:{}", self.volume, path)
    }

    pub(crate) fn token(&self, token: &str) -> String {
        format!("fs:{}:tok:{}", self.volume, token)
    }

    pub(crate) fn vector(&self, path: &str) -> String {
        format!("fs:{}:vec:{}", self.volume, path)
    }

    pub(crate) fn document_scan_pattern(&self) -> String {
        format!("fs:{}:idx:*", self.volume)
    }

    pub(crate) fn token_scan_pattern(&self) -> String {
        format!("fs:{}:tok:*", self.volume)
    }

    pub(crate) fn vector_scan_pattern(&self) -> String {
        format!("fs:{}:vec:*", self.volume)
    }

    /// Path encoded in a vector key, if it is one.
    pub(crate) fn path_from_vector_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(&format!("fs:{}:vec:", self.volume))
    }
}

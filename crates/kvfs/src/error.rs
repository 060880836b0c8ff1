//! Error types for filesystem operations.

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by filesystem operations.
///
/// Every variant that names a path carries the canonical (normalized)
/// form of the path the caller supplied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No entry exists at the path.
    #[error("no such file or directory: {0}")]
    NotFound(String),

    /// A non-directory appeared where a directory was required.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A directory appeared where a file was required.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Destination already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Directory still has children.
    #[error("directory not empty: {0}")]
    NotEmpty(String),

    /// Malformed input: bad mode string, bad owner string, operation on "/".
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Symlink resolution exceeded the hop limit.
    #[error("too many levels of symbolic links: {0}")]
    TooManyLinks(String),

    /// The operation's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The backend failed underneath an otherwise valid operation.
    #[error("store error during {op} at {path}: {source}")]
    Store {
        op: &'static str,
        path: String,
        #[source]
        source: StoreError,
    },
}

impl Error {
    pub fn not_found(path: impl Into<String>) -> Self {
        Error::NotFound(path.into())
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Error::NotADirectory(path.into())
    }

    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Error::IsADirectory(path.into())
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Error::AlreadyExists(path.into())
    }

    pub fn not_empty(path: impl Into<String>) -> Self {
        Error::NotEmpty(path.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn too_many_links(path: impl Into<String>) -> Self {
        Error::TooManyLinks(path.into())
    }

    pub fn store(op: &'static str, path: impl Into<String>, source: StoreError) -> Self {
        Error::Store {
            op,
            path: path.into(),
            source,
        }
    }

    /// True when the error means "the entry is not there", as opposed to
    /// a structural or backend failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

//! Key namespace for filesystem records.
//!
//! All state for a volume lives under four key families:
//!
//! ```text
//! fs:{volume}:meta:{path}    hash   entry metadata
//! fs:{volume}:data:{path}    string file content
//! fs:{volume}:dir:{path}     set    child base names
//! fs:{volume}:xattr:{path}   hash   extended attributes
//! ```
//!
//! Paths embedded in keys are always canonical, so equal paths produce
//! equal keys and prefix scans line up with the directory tree.

use crate::path;

/// Volume used when none is configured.
pub const DEFAULT_VOLUME: &str = "main";

/// Key builder bound to a single volume.
///
/// The binding is fixed at construction. Switching volumes means
/// constructing a new `KeySpace` (and a new engine around it), so a key
/// built before a switch can never name the wrong volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    volume: String,
}

impl KeySpace {
    /// Create a key space for `volume`, falling back to [`DEFAULT_VOLUME`]
    /// when the name is empty.
    pub fn new(volume: impl Into<String>) -> Self {
        let volume = volume.into();
        let volume = if volume.is_empty() {
            DEFAULT_VOLUME.to_string()
        } else {
            volume
        };
        KeySpace { volume }
    }

    pub fn volume(&self) -> &str {
        &self.volume
    }

    /// Metadata hash key for a path.
    pub fn meta(&self, p: &str) -> String {
        format!("fs:{}:meta:{}", self.volume, path::normalize(p))
    }

    /// Content string key for a path.
    pub fn data(&self, p: &str) -> String {
        format!("fs:{}:data:{}", self.volume, path::normalize(p))
    }

    /// Directory membership set key for a path.
    pub fn dir(&self, p: &str) -> String {
        format!("fs:{}:dir:{}", self.volume, path::normalize(p))
    }

    /// Extended attribute hash key for a path.
    pub fn xattr(&self, p: &str) -> String {
        format!("fs:{}:xattr:{}", self.volume, path::normalize(p))
    }

    /// Metadata key of this volume's root directory.
    pub fn root_meta(&self) -> String {
        self.meta("/")
    }
}

/// Scan pattern matching the root metadata key of every volume.
pub fn volume_scan_pattern() -> &'static str {
    "fs:*:meta:/"
}

/// Extract the volume name from a root metadata key, as produced by a
/// scan over [`volume_scan_pattern`]. Returns `None` for keys of any
/// other shape.
pub fn volume_from_root_meta_key(key: &str) -> Option<&str> {
    let rest = key.strip_prefix("fs:")?;
    let vol = rest.strip_suffix(":meta:/")?;
    if vol.is_empty() { None } else { Some(vol) }
}

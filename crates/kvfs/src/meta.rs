//! Entry metadata and its hash-field encoding.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Mode assigned to directories created without an explicit mode.
pub const DEFAULT_DIR_MODE: &str = "0755";
/// Mode assigned to files created without an explicit mode.
pub const DEFAULT_FILE_MODE: &str = "0644";
/// Mode carried by every symlink.
pub const SYMLINK_MODE: &str = "0777";

/// What kind of entry a metadata record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Dir,
    File,
    Symlink,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Dir => "dir",
            EntryKind::File => "file",
            EntryKind::Symlink => "symlink",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dir" => Some(EntryKind::Dir),
            "file" => Some(EntryKind::File),
            "symlink" => Some(EntryKind::Symlink),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for one filesystem entry, stored as a backend hash.
///
/// Mode, uid and gid are kept as the strings the backend holds; mode is
/// an octal string like "0755". Times are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub kind: EntryKind,
    pub mode: String,
    pub uid: String,
    pub gid: String,
    pub size: i64,
    pub ctime: i64,
    pub mtime: i64,
    pub atime: i64,
    /// Symlink target path. `None` for everything but symlinks.
    pub link_target: Option<String>,
}

impl Metadata {
    /// Metadata for a new directory. An empty mode selects the default.
    pub fn new_dir(mode: &str, now: i64) -> Self {
        let mode = if mode.is_empty() { DEFAULT_DIR_MODE } else { mode };
        Metadata {
            kind: EntryKind::Dir,
            mode: mode.to_string(),
            uid: "0".to_string(),
            gid: "0".to_string(),
            size: 0,
            ctime: now,
            mtime: now,
            atime: now,
            link_target: None,
        }
    }

    /// Metadata for a new file. An empty mode selects the default.
    pub fn new_file(mode: &str, size: i64, now: i64) -> Self {
        let mode = if mode.is_empty() { DEFAULT_FILE_MODE } else { mode };
        Metadata {
            kind: EntryKind::File,
            mode: mode.to_string(),
            uid: "0".to_string(),
            gid: "0".to_string(),
            size,
            ctime: now,
            mtime: now,
            atime: now,
            link_target: None,
        }
    }

    /// Metadata for a new symlink pointing at `target`.
    pub fn new_symlink(target: &str, now: i64) -> Self {
        Metadata {
            kind: EntryKind::Symlink,
            mode: SYMLINK_MODE.to_string(),
            uid: "0".to_string(),
            gid: "0".to_string(),
            size: 0,
            ctime: now,
            mtime: now,
            atime: now,
            link_target: Some(target.to_string()),
        }
    }

    /// Encode as hash fields for a metadata write.
    ///
    /// `link_target` is written only when present, so non-symlink records
    /// never carry the field.
    pub fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("type".to_string(), self.kind.as_str().to_string()),
            ("mode".to_string(), self.mode.clone()),
            ("uid".to_string(), self.uid.clone()),
            ("gid".to_string(), self.gid.clone()),
            ("size".to_string(), self.size.to_string()),
            ("ctime".to_string(), self.ctime.to_string()),
            ("mtime".to_string(), self.mtime.to_string()),
            ("atime".to_string(), self.atime.to_string()),
        ];
        if let Some(target) = &self.link_target {
            fields.push(("link_target".to_string(), target.clone()));
        }
        fields
    }

    /// Decode from hash fields.
    ///
    /// Decoding is lenient: missing or unparseable numeric fields read as
    /// zero and an unrecognized type reads as a file, so a record touched
    /// by other tooling still stats rather than erroring.
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let num = |name: &str| -> i64 {
            fields
                .get(name)
                .and_then(|v| v.parse().ok())
                .unwrap_or_default()
        };
        let text = |name: &str| -> String { fields.get(name).cloned().unwrap_or_default() };

        let kind = fields
            .get("type")
            .and_then(|t| EntryKind::parse(t))
            .unwrap_or(EntryKind::File);
        let link_target = fields.get("link_target").filter(|t| !t.is_empty()).cloned();

        Metadata {
            kind,
            mode: text("mode"),
            uid: text("uid"),
            gid: text("gid"),
            size: num("size"),
            ctime: num("ctime"),
            mtime: num("mtime"),
            atime: num("atime"),
            link_target,
        }
    }

    /// POSIX-style mode string like "drwxr-xr-x".
    ///
    /// An unparseable stored mode renders with default permissions rather
    /// than failing the listing.
    pub fn mode_string(&self) -> String {
        let prefix = match self.kind {
            EntryKind::Dir => 'd',
            EntryKind::Symlink => 'l',
            EntryKind::File => '-',
        };

        let Some(bits) = parse_octal_mode(&self.mode) else {
            return format!("{prefix}rwxr-xr-x");
        };

        let mut out = String::with_capacity(10);
        out.push(prefix);
        let rwx = ['r', 'w', 'x'];
        for i in 0..9 {
            if bits & (1 << (8 - i)) != 0 {
                out.push(rwx[i % 3]);
            } else {
                out.push('-');
            }
        }
        out
    }
}

/// Parse an octal mode string such as "0755" or "644".
pub fn parse_octal_mode(mode: &str) -> Option<u32> {
    if mode.is_empty() {
        return None;
    }
    u32::from_str_radix(mode, 8).ok()
}

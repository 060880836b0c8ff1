//! Text and JSON rendering for command output.
//!
//! Every method returns the complete output, trailing newline included,
//! so handlers can `print!` it verbatim. Listings arrive already sorted
//! from the engine.

use anyhow::Result;
use chrono::{Local, TimeZone};
use serde::Serialize;
use serde_json::json;

use kvfs::{DirEntry, EntryKind, FindEntry, Metadata, TreeListing, TreeNode};
use textindex::SearchHit;

/// Longest content excerpt shown under a search hit, in characters.
const SNIPPET_CHARS: usize = 200;

pub struct Renderer {
    json: bool,
}

impl Renderer {
    pub fn new(json: bool) -> Self {
        Renderer { json }
    }

    /// Plain `ls`: one name per line, dotfiles hidden unless `all`.
    pub fn ls(&self, names: &[String], all: bool) -> Result<String> {
        let visible: Vec<&str> = names
            .iter()
            .filter(|name| all || !name.starts_with('.'))
            .map(String::as_str)
            .collect();
        if self.json {
            return pretty(&visible);
        }
        let mut out = String::new();
        for name in visible {
            out.push_str(name);
            out.push('\n');
        }
        Ok(out)
    }

    /// `ls -l`: mode string, owner, group, size, mtime, name. A child
    /// whose metadata record has vanished renders as question marks.
    pub fn ls_long(&self, entries: &[DirEntry], all: bool) -> Result<String> {
        let visible: Vec<&DirEntry> = entries
            .iter()
            .filter(|e| all || !e.name.starts_with('.'))
            .collect();
        if self.json {
            let rows: Vec<serde_json::Value> = visible
                .iter()
                .map(|e| {
                    if e.meta.mode.is_empty() {
                        json!({ "name": e.name })
                    } else {
                        json!({
                            "name": e.name,
                            "type": e.meta.kind.as_str(),
                            "mode": e.meta.mode,
                            "uid": e.meta.uid,
                            "gid": e.meta.gid,
                            "size": e.meta.size,
                            "mtime": e.meta.mtime,
                        })
                    }
                })
                .collect();
            return pretty(&rows);
        }
        let mut out = String::new();
        for entry in visible {
            if entry.meta.mode.is_empty() {
                out.push_str(&format!("?????????? ? ? ? ? {}\n", entry.name));
                continue;
            }
            let mut name = entry.name.clone();
            if entry.meta.kind == EntryKind::Symlink {
                if let Some(target) = &entry.meta.link_target {
                    name = format!("{name} -> {target}");
                }
            }
            out.push_str(&format!(
                "{} {} {} {:>6} {} {}\n",
                entry.meta.mode_string(),
                entry.meta.uid,
                entry.meta.gid,
                entry.meta.size,
                format_time(entry.meta.mtime),
                name,
            ));
        }
        Ok(out)
    }

    /// `stat` block in the coreutils layout.
    pub fn stat(&self, path: &str, meta: &Metadata) -> Result<String> {
        if self.json {
            let mut value = json!({
                "path": path,
                "type": meta.kind.as_str(),
                "mode": meta.mode,
                "uid": meta.uid,
                "gid": meta.gid,
                "size": meta.size,
                "ctime": meta.ctime,
                "mtime": meta.mtime,
                "atime": meta.atime,
            });
            if let Some(target) = &meta.link_target {
                value["link_target"] = json!(target);
            }
            return pretty(&value);
        }
        let mut out = String::new();
        out.push_str(&format!("  File: {path}\n"));
        out.push_str(&format!("  Type: {}\n", meta.kind.as_str()));
        out.push_str(&format!("  Mode: {} ({})\n", meta.mode_string(), meta.mode));
        out.push_str(&format!("   UID: {}\n", meta.uid));
        out.push_str(&format!("   GID: {}\n", meta.gid));
        out.push_str(&format!("  Size: {}\n", meta.size));
        out.push_str(&format!(" CTime: {}\n", format_time(meta.ctime)));
        out.push_str(&format!(" MTime: {}\n", format_time(meta.mtime)));
        out.push_str(&format!(" ATime: {}\n", format_time(meta.atime)));
        if let Some(target) = &meta.link_target {
            out.push_str(&format!("  Link: {target}\n"));
        }
        Ok(out)
    }

    /// `find` results: one path per line.
    pub fn find(&self, entries: &[FindEntry]) -> Result<String> {
        if self.json {
            let rows: Vec<serde_json::Value> = entries
                .iter()
                .map(|e| json!({ "path": e.path, "type": e.meta.kind.as_str() }))
                .collect();
            return pretty(&rows);
        }
        let mut out = String::new();
        for entry in entries {
            out.push_str(&entry.path);
            out.push('\n');
        }
        Ok(out)
    }

    /// Box-drawing `tree` with the directory/file summary line.
    pub fn tree(&self, listing: &TreeListing) -> Result<String> {
        if self.json {
            return pretty(&tree_value(&listing.root));
        }
        let mut out = String::new();
        out.push_str(&listing.root.name);
        out.push('\n');
        tree_rows(&mut out, &listing.root.children, "");
        out.push_str(&format!(
            "\n{} directories, {} files\n",
            listing.dirs, listing.files
        ));
        Ok(out)
    }

    /// Volume listing with the active volume starred.
    pub fn volumes(&self, volumes: &[String], active: &str) -> Result<String> {
        if self.json {
            return pretty(&volumes);
        }
        let mut out = String::new();
        for volume in volumes {
            let marker = if volume == active { "* " } else { "  " };
            out.push_str(marker);
            out.push_str(volume);
            out.push('\n');
        }
        Ok(out)
    }

    /// Token search hits: occurrence counts as whole-number scores.
    pub fn search_hits(&self, hits: &[SearchHit]) -> Result<String> {
        self.hits(hits, "score", 0)
    }

    /// Vector search hits: cosine similarity to four places.
    pub fn vector_hits(&self, hits: &[SearchHit]) -> Result<String> {
        self.hits(hits, "similarity", 4)
    }

    fn hits(&self, hits: &[SearchHit], label: &str, precision: usize) -> Result<String> {
        if self.json {
            return pretty(&hits);
        }
        if hits.is_empty() {
            return Ok("No results found.\n".to_string());
        }
        let mut out = String::new();
        for (i, hit) in hits.iter().enumerate() {
            out.push_str(&format!(
                "{}. {} ({}: {:.*})\n",
                i + 1,
                hit.path,
                label,
                precision,
                hit.score,
            ));
            out.push_str(&format!("   {}\n\n", snippet(&hit.content)));
        }
        Ok(out)
    }
}

/// Unix seconds as `Jan  2 15:04` local time; zero renders as `-`.
pub fn format_time(ts: i64) -> String {
    if ts == 0 {
        return "-".to_string();
    }
    match Local.timestamp_opt(ts, 0).single() {
        Some(when) => when.format("%b %e %H:%M").to_string(),
        None => "-".to_string(),
    }
}

fn pretty<T: Serialize>(value: &T) -> Result<String> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}

fn tree_rows(out: &mut String, children: &[TreeNode], prefix: &str) {
    let last = children.len().saturating_sub(1);
    for (i, child) in children.iter().enumerate() {
        let (connector, child_prefix) = if i == last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        out.push_str(prefix);
        out.push_str(connector);
        out.push_str(&child.name);
        out.push('\n');
        if child.kind == EntryKind::Dir && !child.children.is_empty() {
            tree_rows(out, &child.children, &format!("{prefix}{child_prefix}"));
        }
    }
}

fn tree_value(node: &TreeNode) -> serde_json::Value {
    let mut value = json!({
        "name": node.name,
        "type": node.kind.as_str(),
    });
    if !node.children.is_empty() {
        let children: Vec<serde_json::Value> = node.children.iter().map(tree_value).collect();
        value["children"] = json!(children);
    }
    value
}

fn snippet(content: &str) -> String {
    let text = match content.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    };
    text.replace('\n', " ")
}

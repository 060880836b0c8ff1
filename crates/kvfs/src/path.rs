//! Canonical path handling.
//!
//! Every path stored in the backend is canonical: absolute, no duplicate
//! slashes, no "." or ".." components, no trailing slash except for the
//! root itself. All functions here are total; malformed input normalizes
//! rather than failing, and ".." above the root clamps at the root.

/// Canonicalize a path string.
///
/// A missing leading slash is added, so relative input is interpreted
/// against the root.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// Parent of a canonical path. The root is its own parent.
pub fn parent(path: &str) -> String {
    let norm = normalize(path);
    if norm == "/" {
        return norm;
    }
    match norm.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => norm[..idx].to_string(),
    }
}

/// Final component of a canonical path. The root's base name is "/".
pub fn base_name(path: &str) -> String {
    let norm = normalize(path);
    if norm == "/" {
        return norm;
    }
    match norm.rfind('/') {
        Some(idx) => norm[idx + 1..].to_string(),
        None => norm,
    }
}

/// Join a path onto a base and canonicalize the result.
///
/// ".." components in `name` resolve against `base`, clamping at the root.
pub fn join(base: &str, name: &str) -> String {
    normalize(&format!("{base}/{name}"))
}

/// Components of a canonical path, outermost first. Empty for the root.
pub fn components(path: &str) -> Vec<String> {
    let norm = normalize(path);
    if norm == "/" {
        return Vec::new();
    }
    norm.trim_start_matches('/')
        .split('/')
        .map(str::to_string)
        .collect()
}

/// True when the path canonicalizes to the root.
pub fn is_root(path: &str) -> bool {
    normalize(path) == "/"
}

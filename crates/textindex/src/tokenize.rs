//! Content tokenization and binary detection.

use std::collections::BTreeSet;

const MIN_TOKEN_LEN: usize = 2;
const MAX_TOKEN_LEN: usize = 64;
const BINARY_SNIFF_LEN: usize = 512;

/// The distinct lowercased tokens of `text`: alphanumeric runs, with
/// very short and absurdly long runs dropped.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| (MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&t.chars().count()))
        .map(|t| t.to_lowercase())
        .collect()
}

/// How often any of `tokens` occurs in `text`, case-insensitively. Used
/// to rank hits that already passed the token filter.
pub fn occurrence_count(text: &str, tokens: &BTreeSet<String>) -> usize {
    let lowered = text.to_lowercase();
    tokens
        .iter()
        .map(|token| lowered.matches(token.as_str()).count())
        .sum()
}

/// Treats content with a NUL byte in its first 512 bytes as binary.
pub fn is_binary(content: &[u8]) -> bool {
    let sniff = &content[..content.len().min(BINARY_SNIFF_LEN)];
    sniff.contains(&0)
}

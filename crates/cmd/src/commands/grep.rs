use anyhow::{anyhow, bail, Result};
use log::debug;
use regex::Regex;

use kvfs::{path, EntryKind};
use textindex::is_simple_pattern;

use crate::common::CliContext;

/// Cap on index-supplied candidate files for a recursive grep.
const INDEX_CANDIDATE_LIMIT: usize = 10_000;

/// Regex line matching over file contents.
///
/// A recursive directory grep first tries the search index: for simple
/// literal patterns the token index narrows the candidate files, and
/// the regex then filters their lines. Anything else walks the subtree
/// and reads every file.
pub async fn grep_command(
    ctx: &CliContext,
    pattern: &str,
    target: &str,
    recursive: bool,
    ignore_case: bool,
    line_numbers: bool,
) -> Result<()> {
    let effective = if ignore_case {
        format!("(?i){pattern}")
    } else {
        pattern.to_string()
    };
    let re = Regex::new(&effective).map_err(|e| anyhow!("grep: invalid pattern: {e}"))?;

    let target = path::normalize(target);
    let Some(meta) = ctx.engine.stat(&target).await? else {
        bail!("grep: {target}: No such file or directory");
    };

    if meta.kind == EntryKind::Dir {
        if !recursive {
            bail!("grep: {target}: Is a directory");
        }
        if indexed_grep(ctx, &re, pattern, &target, line_numbers).await {
            return Ok(());
        }
        return grep_dir(ctx, &re, &target, line_numbers).await;
    }
    grep_file(ctx, &re, &target, None, line_numbers).await
}

/// Returns true when the index answered the query; false falls back to
/// the scan path.
async fn indexed_grep(
    ctx: &CliContext,
    re: &Regex,
    raw_pattern: &str,
    dir: &str,
    line_numbers: bool,
) -> bool {
    let Some(indexer) = &ctx.indexer else {
        return false;
    };
    if !is_simple_pattern(raw_pattern) {
        return false;
    }
    if !indexer.index_exists().await.unwrap_or(false) {
        return false;
    }
    let hits = match indexer
        .search(raw_pattern, Some(dir), INDEX_CANDIDATE_LIMIT)
        .await
    {
        Ok(hits) => hits,
        Err(err) => {
            debug!("index lookup failed, scanning instead: {err}");
            return false;
        }
    };
    for hit in hits {
        for (number, line) in hit.content.split('\n').enumerate() {
            if re.is_match(line) {
                print_match(Some(&hit.path), number + 1, line, line_numbers);
            }
        }
    }
    true
}

async fn grep_dir(ctx: &CliContext, re: &Regex, dir: &str, line_numbers: bool) -> Result<()> {
    let entries = ctx.engine.find(dir, None, Some(EntryKind::File)).await?;
    for entry in entries {
        if let Err(err) = grep_file(ctx, re, &entry.path, Some(&entry.path), line_numbers).await {
            debug!("grep: skipping {}: {err}", entry.path);
        }
    }
    Ok(())
}

async fn grep_file(
    ctx: &CliContext,
    re: &Regex,
    file: &str,
    prefix: Option<&str>,
    line_numbers: bool,
) -> Result<()> {
    let content = ctx.engine.read_file(file).await?;
    let text = String::from_utf8_lossy(&content);
    for (number, line) in text.split('\n').enumerate() {
        if re.is_match(line) {
            print_match(prefix, number + 1, line, line_numbers);
        }
    }
    Ok(())
}

fn print_match(prefix: Option<&str>, number: usize, line: &str, line_numbers: bool) {
    let mut display = String::new();
    if let Some(path) = prefix {
        display.push_str(path);
        display.push(':');
    }
    if line_numbers {
        display.push_str(&number.to_string());
        display.push(':');
    }
    display.push_str(line);
    println!("{display}");
}

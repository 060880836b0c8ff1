use anyhow::Result;

use kvfs::path;

use crate::common::CliContext;
use crate::output::Renderer;

/// Embedding similarity search over indexed file contents, optionally
/// pre-filtered to files containing the given terms.
pub async fn vsearch_command(
    ctx: &CliContext,
    query: &str,
    dir: Option<String>,
    filter: Option<&str>,
    top: usize,
) -> Result<()> {
    let indexer = ctx.indexer()?;
    let dir = dir.map(|d| path::normalize(&d));
    let hits = indexer
        .vector_search(query, dir.as_deref(), filter, top)
        .await?;
    print!("{}", Renderer::new(ctx.json).vector_hits(&hits)?);
    Ok(())
}

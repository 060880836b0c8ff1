use anyhow::Result;

use kvfs::path;

use crate::common::CliContext;
use crate::output::Renderer;

/// Token search: every query term must appear, results ranked by how
/// often the terms occur.
pub async fn search_command(
    ctx: &CliContext,
    query: &str,
    dir: Option<String>,
    limit: usize,
) -> Result<()> {
    let indexer = ctx.indexer()?;
    let dir = dir.map(|d| path::normalize(&d));
    let hits = indexer.search(query, dir.as_deref(), limit).await?;
    print!("{}", Renderer::new(ctx.json).search_hits(&hits)?);
    Ok(())
}

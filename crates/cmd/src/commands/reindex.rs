use anyhow::Result;

use textindex::ReindexOptions;

use crate::common::CliContext;

/// Rebuild the search index by walking files under `path`.
pub async fn reindex_command(ctx: &CliContext, path: Option<String>, drop: bool) -> Result<()> {
    let indexer = ctx.indexer()?;
    let opts = ReindexOptions {
        drop,
        root: path.unwrap_or_else(|| "/".to_string()),
    };
    let count = indexer.reindex(&ctx.engine, &opts).await?;
    println!("Indexed {count} files");
    Ok(())
}

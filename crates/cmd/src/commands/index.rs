use anyhow::{bail, Result};

use crate::common::CliContext;

pub async fn index_status(ctx: &CliContext) -> Result<()> {
    let indexer = ctx.indexer()?;
    if !indexer.index_exists().await? {
        println!("Index exists: no");
        println!("Run 'reindex' to create the index and populate it.");
        return Ok(());
    }
    println!("Index exists: yes");
    println!("Indexed documents: {}", indexer.document_count().await?);
    Ok(())
}

pub async fn index_create(ctx: &CliContext) -> Result<()> {
    let indexer = ctx.indexer()?;
    if indexer.index_exists().await? {
        bail!("index: index already exists (use 'index drop' first)");
    }
    indexer.ensure_index().await?;
    println!("Created index for volume '{}'", ctx.engine.volume());
    Ok(())
}

pub async fn index_drop(ctx: &CliContext) -> Result<()> {
    let indexer = ctx.indexer()?;
    if !indexer.index_exists().await? {
        bail!("index: no index for volume '{}'", ctx.engine.volume());
    }
    indexer.drop_index().await?;
    println!("Dropped index for volume '{}'", ctx.engine.volume());
    Ok(())
}

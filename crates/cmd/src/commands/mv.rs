use anyhow::Result;

use crate::common::CliContext;

pub async fn mv_command(ctx: &CliContext, src: &str, dst: &str) -> Result<()> {
    ctx.engine.rename(src, dst).await?;
    Ok(())
}

use anyhow::Result;

use crate::common::CliContext;

pub async fn rmdir_command(ctx: &CliContext, paths: &[String]) -> Result<()> {
    for path in paths {
        ctx.engine.rmdir(path).await?;
    }
    Ok(())
}

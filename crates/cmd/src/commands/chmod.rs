use anyhow::Result;

use crate::common::CliContext;

pub async fn chmod_command(ctx: &CliContext, mode: &str, paths: &[String]) -> Result<()> {
    for path in paths {
        ctx.engine.chmod(path, mode).await?;
    }
    Ok(())
}

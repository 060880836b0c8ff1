use anyhow::Result;

use crate::common::CliContext;

pub async fn touch_command(ctx: &CliContext, paths: &[String]) -> Result<()> {
    for path in paths {
        ctx.engine.touch(path).await?;
    }
    Ok(())
}

use anyhow::Result;

use crate::common::CliContext;

pub async fn mkdir_command(ctx: &CliContext, paths: &[String], parents: bool) -> Result<()> {
    for path in paths {
        ctx.engine.mkdir(path, parents).await?;
    }
    Ok(())
}

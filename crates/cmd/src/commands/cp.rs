use anyhow::Result;

use crate::common::CliContext;

pub async fn cp_command(ctx: &CliContext, src: &str, dst: &str, recursive: bool) -> Result<()> {
    if recursive {
        ctx.engine.copy_recursive(src, dst).await?;
    } else {
        ctx.engine.copy_file(src, dst).await?;
    }
    Ok(())
}

use anyhow::Result;

use crate::common::CliContext;

/// `owner` is `uid`, `uid:gid` or `:gid`; an omitted half stays as is.
pub async fn chown_command(ctx: &CliContext, owner: &str, paths: &[String]) -> Result<()> {
    for path in paths {
        ctx.engine.chown(path, owner).await?;
    }
    Ok(())
}

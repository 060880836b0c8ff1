use anyhow::{bail, Result};

use crate::common::CliContext;

/// Create a symlink. The target is stored as written, so relative
/// targets resolve against the link's directory at read time.
pub async fn ln_command(ctx: &CliContext, target: &str, link: &str, symbolic: bool) -> Result<()> {
    if !symbolic {
        bail!("ln: hard links not supported; use ln -s");
    }
    ctx.engine.symlink(target, link).await?;
    Ok(())
}

/// Follow a symlink chain and print the final path.
pub async fn readlink_command(ctx: &CliContext, path: &str) -> Result<()> {
    let resolved = ctx.engine.resolve_symlink(path).await?;
    println!("{resolved}");
    Ok(())
}

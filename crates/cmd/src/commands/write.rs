use anyhow::Result;

use crate::common::CliContext;

/// Replace a file's contents with the given words joined by spaces.
pub async fn write_command(ctx: &CliContext, path: &str, text: &[String]) -> Result<()> {
    let content = text.join(" ");
    ctx.engine.write_file(path, content.as_bytes()).await?;
    Ok(())
}

/// Append the given words to a file, creating it if missing.
pub async fn append_command(ctx: &CliContext, path: &str, text: &[String]) -> Result<()> {
    let content = text.join(" ");
    ctx.engine.append_file(path, content.as_bytes()).await?;
    Ok(())
}

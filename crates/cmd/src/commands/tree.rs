use anyhow::Result;

use crate::common::CliContext;
use crate::output::Renderer;

pub async fn tree_command(ctx: &CliContext, path: Option<String>, level: usize) -> Result<()> {
    let root = path.as_deref().unwrap_or("/");
    let listing = ctx.engine.tree(root, level).await?;
    print!("{}", Renderer::new(ctx.json).tree(&listing)?);
    Ok(())
}

use anyhow::Result;

use crate::common::{parse_kind, CliContext};
use crate::output::Renderer;

pub async fn find_command(
    ctx: &CliContext,
    path: Option<String>,
    name: Option<String>,
    kind: Option<String>,
) -> Result<()> {
    let root = path.as_deref().unwrap_or("/");
    let kind = kind.as_deref().map(parse_kind).transpose()?;
    let entries = ctx.engine.find(root, name.as_deref(), kind).await?;
    print!("{}", Renderer::new(ctx.json).find(&entries)?);
    Ok(())
}

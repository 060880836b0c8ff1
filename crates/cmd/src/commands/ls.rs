use anyhow::Result;

use crate::common::CliContext;
use crate::output::Renderer;

pub async fn ls_command(
    ctx: &CliContext,
    path: Option<String>,
    long: bool,
    all: bool,
) -> Result<()> {
    let path = path.as_deref().unwrap_or("/");
    let renderer = Renderer::new(ctx.json);
    let out = if long {
        let entries = ctx.engine.read_dir_with_meta(path).await?;
        renderer.ls_long(&entries, all)?
    } else {
        let names = ctx.engine.read_dir(path).await?;
        renderer.ls(&names, all)?
    };
    print!("{out}");
    Ok(())
}

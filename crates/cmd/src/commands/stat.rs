use anyhow::{bail, Result};

use kvfs::path;

use crate::common::CliContext;
use crate::output::Renderer;

pub async fn stat_command(ctx: &CliContext, paths: &[String]) -> Result<()> {
    let renderer = Renderer::new(ctx.json);
    for raw in paths {
        let path = path::normalize(raw);
        match ctx.engine.stat(&path).await? {
            None => bail!("stat: cannot stat '{path}': No such file or directory"),
            Some(meta) => print!("{}", renderer.stat(&path, &meta)?),
        }
    }
    Ok(())
}

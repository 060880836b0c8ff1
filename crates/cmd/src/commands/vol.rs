use anyhow::Result;

use kvfs::Engine;

use crate::common::CliContext;
use crate::output::Renderer;

pub async fn vol_list(ctx: &CliContext) -> Result<()> {
    let volumes = ctx.engine.list_volumes().await?;
    print!(
        "{}",
        Renderer::new(ctx.json).volumes(&volumes, ctx.engine.volume())?
    );
    Ok(())
}

pub async fn vol_create(ctx: &CliContext, name: &str) -> Result<()> {
    let engine = Engine::new(ctx.engine.store(), name);
    engine.init().await?;
    println!("Volume '{name}' created");
    Ok(())
}

pub async fn vol_info(ctx: &CliContext) -> Result<()> {
    if ctx.json {
        let value = serde_json::json!({ "volume": ctx.engine.volume() });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    println!("Volume: {}", ctx.engine.volume());
    Ok(())
}

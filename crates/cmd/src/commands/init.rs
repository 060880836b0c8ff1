use anyhow::Result;

use crate::common::CliContext;

/// Create the volume's root directory and report it. Opening the
/// context already initializes the volume, so this mostly confirms.
pub async fn init_command(ctx: &CliContext) -> Result<()> {
    ctx.engine.init().await?;
    println!("Volume '{}' initialized", ctx.engine.volume());
    Ok(())
}

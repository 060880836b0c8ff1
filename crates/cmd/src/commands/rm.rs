use anyhow::Result;

use crate::common::CliContext;

/// Remove entries. With `force`, failures are ignored and the loop
/// keeps going, like `rm -f`.
pub async fn rm_command(
    ctx: &CliContext,
    paths: &[String],
    recursive: bool,
    force: bool,
) -> Result<()> {
    for path in paths {
        let result = if recursive {
            ctx.engine.remove_recursive(path).await
        } else {
            ctx.engine.remove(path).await
        };
        if let Err(err) = result {
            if !force {
                return Err(err.into());
            }
        }
    }
    Ok(())
}

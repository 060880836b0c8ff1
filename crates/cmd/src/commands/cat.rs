use std::io::{self, Write};

use anyhow::Result;

use crate::common::CliContext;

/// Print file contents verbatim. A file whose content does not end in
/// a newline gets one appended so shell prompts stay on their own line.
pub async fn cat_command(ctx: &CliContext, paths: &[String]) -> Result<()> {
    let mut stdout = io::stdout();
    for path in paths {
        let content = ctx.engine.read_file(path).await?;
        stdout.write_all(&content)?;
        if !content.is_empty() && !content.ends_with(b"\n") {
            stdout.write_all(b"\n")?;
        }
    }
    stdout.flush()?;
    Ok(())
}

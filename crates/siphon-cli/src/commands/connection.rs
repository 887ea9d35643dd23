use anyhow::anyhow;

use crate::client::{CliContext, CliError, CliResult, start_engine};
use crate::output::{ConnectionReport, render_connection};

pub(crate) async fn handle_test_connection(ctx: &CliContext) -> CliResult<()> {
    let kind = ctx.config.downloader.downloader_type;
    let handle = start_engine(&ctx.config)?;
    let reachable = handle.engine.test_connection().await;
    handle.engine.close().await;

    render_connection(
        &ConnectionReport {
            backend: kind.to_string(),
            reachable,
        },
        ctx.format,
    )?;
    if reachable {
        Ok(())
    } else {
        Err(CliError::failure(anyhow!(
            "could not log in to the {kind} backend"
        )))
    }
}

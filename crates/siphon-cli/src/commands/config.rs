use crate::client::{CliContext, CliResult};
use crate::output::render_config;

pub(crate) fn handle_config_show(ctx: &CliContext) -> CliResult<()> {
    render_config(&ctx.config.redacted(), ctx.format)
}

use tracing::{info, warn};

use super::Context;

pub fn run(mut ctx: Context) -> anyhow::Result<()> {
    if ctx.config.auth.take().is_none() {
        warn!("You must log in first with `sindri login`.");
        return Ok(());
    }
    ctx.config.save(&ctx.config_path)?;
    info!("You have successfully logged out.");
    Ok(())
}

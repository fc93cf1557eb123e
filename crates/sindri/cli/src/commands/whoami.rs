use anyhow::bail;

use super::Context;

pub fn run(ctx: &Context) -> anyhow::Result<()> {
    let Some(auth) = &ctx.config.auth else {
        bail!("You must login first with `sindri login`.");
    };
    println!("{}", auth.team_slug);
    Ok(())
}

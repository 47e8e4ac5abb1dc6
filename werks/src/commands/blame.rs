use clap::Args;

use super::Context;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct BlameArgs {
    /// Werk id, defaults to the last werk
    pub id: Option<u32>,
}

pub fn run(args: BlameArgs, ctx: &Context) -> Result<()> {
    let id = ctx.werk_or_last(args.id)?;
    let stored = ctx.werks.load(id)?;
    ctx.werks.save_last(id);
    ctx.git.blame(&stored.path)
}

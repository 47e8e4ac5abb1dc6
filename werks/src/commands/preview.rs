use clap::Args;

use super::Context;
use crate::error::Result;
use crate::output::html_preview;

#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Werk id
    pub id: u32,
}

pub fn run(args: PreviewArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_valid(args.id)?;
    print!("{}", html_preview(&loaded));
    Ok(())
}

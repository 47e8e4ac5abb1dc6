use clap::Args;

use super::Context;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct UrlArgs {
    /// Werk id
    pub id: u32,
}

pub fn run(args: UrlArgs, ctx: &Context) -> Result<()> {
    ctx.werks.load(args.id)?;
    ctx.werks.save_last(args.id);
    println!("{}", ctx.config()?.online_url(args.id));
    Ok(())
}

use clap::Args;

use super::{edit_werk, Context};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Werk id, defaults to the last werk
    pub id: Option<u32>,
}

pub fn run(args: EditArgs, ctx: &Context) -> Result<()> {
    let id = ctx.werk_or_last(args.id)?;
    let path = ctx.werks.werk_path(id)?;
    edit_werk(ctx, &path, &[], false)?;
    ctx.werks.save_last(id);
    Ok(())
}

use clap::Args;
use tracing::info;

use super::Context;
use crate::error::{Result, WerkError};
use crate::output::werk_id;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Werk ids
    #[arg(required = true)]
    pub ids: Vec<u32>,
}

/// Remove werks from git and give their ids back to the stash
pub fn run(args: DeleteArgs, ctx: &Context) -> Result<()> {
    let project = ctx.config()?.project.clone();

    for id in args.ids {
        if !ctx.werks.exists(id) {
            return Err(WerkError::Usage(format!("There is no Werk {}.", id)));
        }
        let stored = ctx.werks.load(id)?;
        if let Err(e) = ctx.git.rm(&stored.path) {
            println!("Error removing Werk file: {}.", e);
            continue;
        }
        println!("Deleted Werk {} ({}).", werk_id(id), stored.content.title());

        let mut stash = ctx.load_stash()?;
        stash.add_id(id, &project);
        ctx.save_stash(&stash)?;
        info!("Returned werk id {} to the stash", id);
        println!("You now own the Werk ID {} again.", werk_id(id));
    }
    Ok(())
}

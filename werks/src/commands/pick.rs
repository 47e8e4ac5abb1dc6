use clap::Args;
use tracing::info;

use super::Context;
use crate::error::{Result, WerkError};
use crate::git::werk_in_commit;

#[derive(Args, Debug)]
pub struct PickArgs {
    /// Do not commit at the end
    #[arg(short, long)]
    pub no_commit: bool,

    /// Commits to pick
    #[arg(required = true)]
    pub commit: Vec<String>,
}

pub fn run(args: PickArgs, ctx: &Context) -> Result<()> {
    for commit in &args.commit {
        cherry_pick(ctx, commit, args.no_commit)?;
    }
    Ok(())
}

/// Cherry-pick a commit and move the werk it contains to the current
/// version, converting legacy werks to markdown on the way.
fn cherry_pick(ctx: &Context, commit: &str, no_commit: bool) -> Result<()> {
    let found = werk_in_commit(&ctx.git.diff_tree(commit)?).map(|(file_name, id)| {
        (ctx.werks.path().join(file_name), ctx.werks.new_werk_path(id), id)
    });

    if let Some((source, destination, _)) = &found {
        if source.exists() || destination.exists() {
            return Err(WerkError::Usage(format!(
                "Trying to pick Werk {} to {}, but Werk already present. Aborted.",
                source.display(),
                destination.display()
            )));
        }
    }

    let code = ctx.git.cherry_pick(commit, no_commit)?;

    if let Some((source, destination, id)) = &found {
        if source != destination {
            let stored = ctx.werks.load_path(source)?;
            ctx.git.mv(source, destination)?;
            ctx.werks.save(destination, *id, &stored.content)?;
        }

        // The version changes even when the pick conflicts, so that it is
        // not forgotten while resolving.
        let version = ctx.config()?.current_version()?.to_string();
        let mut stored = ctx.werks.load_path(destination)?;
        stored
            .content
            .metadata
            .insert("version".to_string(), version.clone());
        ctx.werks.save(destination, *id, &stored.content)?;
        ctx.git.add(destination)?;
        info!("Picked werk {} from {}", id, commit);
        println!(
            "Changed version of Werk {} to {}.",
            destination.display(),
            version
        );
    }

    if code != 0 {
        return Err(WerkError::PickFailed {
            commit: commit.to_string(),
            code,
        });
    }

    if let Some((_, destination, _)) = &found {
        if no_commit {
            println!("We don't commit yet. Here is the status:");
            println!("Please commit with git commit -C '{}'\n", commit);
            ctx.git.status()?;
        } else {
            ctx.git.add(destination)?;
            ctx.git.commit_amend_no_edit()?;
        }
    }
    Ok(())
}

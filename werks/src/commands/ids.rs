use clap::Args;
use tracing::info;

use super::Context;
use crate::error::{Result, WerkError};
use crate::stash::{id_ranges, reserve_ids, Stash};

#[derive(Args, Debug)]
pub struct IdsArgs {
    /// Number of werk ids to reserve. Without it, show the reserved ids.
    pub count: Option<u32>,
}

pub fn summary(stash: &Stash) -> String {
    let per_project: Vec<String> = stash
        .ids_by_project
        .iter()
        .map(|(project, ids)| format!("{}: {}", project, ids.len()))
        .collect();
    format!(
        "You have {} reserved IDs:\n{}",
        stash.count(),
        per_project.join("\n")
    )
}

pub fn run(args: IdsArgs, ctx: &Context) -> Result<()> {
    let Some(count) = args.count else {
        println!("{}", summary(&ctx.load_stash()?));
        return Ok(());
    };

    let config = ctx.config()?;
    let branch = ctx.git.current_branch()?;
    let repo = ctx.git.current_repo()?;
    if branch != config.branch || repo != config.repo {
        return Err(WerkError::Ids(format!(
            "Werk IDs can only be reserved on the '{}' branch on '{}', not '{}' on '{}'.",
            config.branch, config.repo, branch, repo
        )));
    }

    let first_free = ctx.werks.first_free()?;
    let ranges = id_ranges(&config.project).ok_or_else(|| {
        WerkError::Ids(format!("project {} has no Werk ID range", config.project))
    })?;
    let (new_first_free, fresh_ids) = reserve_ids(ranges, first_free, count)?;

    let mut stash = ctx.load_stash()?;
    for id in &fresh_ids {
        stash.add_id(*id, &config.project);
    }
    ctx.save_stash(&stash)?;
    ctx.werks.save_first_free(new_first_free)?;
    info!("Reserved werk ids {:?}", fresh_ids);

    println!(
        "Reserved {} additional IDs now. You have {} reserved IDs now.",
        count,
        stash.count()
    );

    if config.create_commit {
        ctx.git
            .commit_no_verify(&format!("Reserved {} Werk IDS", count))
            .map_err(|_| WerkError::Usage("Cannot commit.".to_string()))?;
        println!("--> Successfully committed reserved Werk IDS. Please push it soon!");
    } else {
        println!(
            "--> Reserved Werk IDs. Commit and push it soon, otherwise someone else reserves the same IDs!"
        );
    }
    Ok(())
}

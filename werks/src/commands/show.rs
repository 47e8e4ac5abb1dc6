use clap::Args;

use super::Context;
use crate::error::{Result, WerkError};
use crate::output::{list_line, SEPARATOR};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Werk ids, `all` for all werks. Defaults to the last werk.
    pub ids: Vec<String>,
}

fn selected_ids(args: &ShowArgs, ctx: &Context) -> Result<Vec<u32>> {
    if args.ids.iter().any(|id| id == "all") {
        return Ok(ctx.werks.load_all()?.into_keys().collect());
    }
    if args.ids.is_empty() {
        return Ok(vec![ctx.werks.last()?]);
    }
    args.ids
        .iter()
        .map(|id| {
            id.parse()
                .map_err(|_| WerkError::Usage(format!("Invalid Werk id: {}", id)))
        })
        .collect()
}

pub fn run(args: ShowArgs, ctx: &Context) -> Result<()> {
    let ids = selected_ids(&args, ctx)?;
    let modified = ctx.modified_werks();

    for (n, id) in ids.iter().enumerate() {
        if n > 0 {
            println!("{}", SEPARATOR);
        }
        let loaded = ctx.load_valid(*id)?;
        println!(
            "{}",
            list_line(&loaded, &loaded.werk.title, modified.contains(id))
        );
        println!("\n{}", loaded.werk.description);
    }
    if let Some(last) = ids.last() {
        ctx.werks.save_last(*last);
    }
    Ok(())
}

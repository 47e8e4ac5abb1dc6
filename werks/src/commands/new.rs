use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use clap::Args;
use console::style;

use super::{edit_werk, input_choice, prompt_input, Context};
use crate::error::Result;
use crate::output::{werk_id, WERK_NOTES};
use crate::parse::WerkParseResult;

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Files to commit together with the werk
    pub custom_files: Vec<String>,
}

/// Ask for the metadata, save the werk under a stashed id and open it in
/// the editor.
pub fn run(args: NewArgs, ctx: &Context) -> Result<()> {
    print!("{}", style(WERK_NOTES).green());

    let config = ctx.config()?;
    let mut stash = ctx.load_stash()?;
    let id = stash.pick_id(&config.project)?;

    let mut metadata = BTreeMap::new();
    metadata.insert("id".to_string(), id.to_string());
    metadata.insert(
        "date".to_string(),
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false),
    );
    metadata.insert("version".to_string(), config.current_version()?.to_string());

    let title = prompt_input("Title")?;
    if title.is_empty() {
        eprintln!("Cancelled.");
        return Ok(());
    }
    metadata.insert("title".to_string(), title);
    metadata.insert("class".to_string(), input_choice("Class", &config.class_choices())?);
    let edition = input_choice("Edition", &config.editions)?;
    metadata.insert(
        "component".to_string(),
        input_choice("Component", &config.components_of_edition(&edition))?,
    );
    metadata.insert("edition".to_string(), edition);
    metadata.insert("level".to_string(), input_choice("Level", &config.levels)?);
    metadata.insert(
        "compatible".to_string(),
        input_choice("Compatible", &config.compatible)?,
    );

    let path = ctx.werks.new_werk_path(id);
    let content = WerkParseResult {
        metadata,
        description: String::new(),
    };
    ctx.werks.save(&path, id, &content)?;
    ctx.git.add(&path)?;
    stash.free_id(id);
    ctx.save_stash(&stash)?;

    println!("Werk {} saved.", werk_id(id));
    edit_werk(ctx, &path, &args.custom_files, true)
}

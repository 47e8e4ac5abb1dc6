use std::collections::{BTreeMap, BTreeSet};

use clap::Args;

use super::Context;
use crate::config::WerksConfig;
use crate::error::{Result, WerkError};
use crate::output::{csv_export, list_line};
use crate::store::LoadedWerk;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Reverse order
    #[arg(short, long)]
    pub reverse: bool,

    /// Filter for edition, component, level, class, version or compatibility
    /// (prefixes work, `current` is the current version)
    pub filter: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFormat {
    Console,
    Csv,
}

/// Metadata field name to accepted values. Values of one field are or-ed,
/// different fields are and-ed.
pub type Filters = BTreeMap<&'static str, Vec<String>>;

/// Map each filter argument to the first field value it is a prefix of.
pub fn build_filters(
    config: &WerksConfig,
    versions: &BTreeSet<String>,
    arguments: &[String],
) -> Result<Filters> {
    let candidates: Vec<(&'static str, Vec<&str>)> = vec![
        ("edition", config.editions.iter().map(|(id, _)| id.as_str()).collect()),
        (
            "component",
            config
                .all_components()
                .into_iter()
                .map(|(id, _)| id.as_str())
                .collect(),
        ),
        ("level", config.levels.iter().map(|(id, _)| id.as_str()).collect()),
        ("class", config.classes.iter().map(|(id, _, _)| id.as_str()).collect()),
        ("version", versions.iter().map(String::as_str).collect()),
        ("compatible", config.compatible.iter().map(|(id, _)| id.as_str()).collect()),
    ];

    let mut filters = Filters::new();
    for argument in arguments {
        let argument = if argument == "current" {
            config.current_version()?
        } else {
            argument.as_str()
        };

        let hit = candidates.iter().find_map(|(field, values)| {
            values
                .iter()
                .find(|value| value.starts_with(argument))
                .map(|value| (*field, value.to_string()))
        });
        match hit {
            Some((field, value)) => filters.entry(field).or_default().push(value),
            None => {
                return Err(WerkError::Usage(format!(
                    "No such edition, component, state, class, or target version: {}",
                    argument
                )))
            }
        }
    }
    Ok(filters)
}

pub fn matches(loaded: &LoadedWerk, filters: &Filters) -> bool {
    filters.iter().all(|(field, accepted)| {
        loaded
            .stored
            .content
            .get(field)
            .is_some_and(|value| accepted.iter().any(|a| a == value))
    })
}

pub fn run(args: ListArgs, ctx: &Context, format: ListFormat) -> Result<()> {
    let werks = ctx.werks.load_all()?;
    let config = ctx.config()?;
    let versions: BTreeSet<String> = werks
        .values()
        .map(|loaded| loaded.werk.version.clone())
        .collect();
    let filters = build_filters(config, &versions, &args.filter)?;

    let mut selected: Vec<&LoadedWerk> = werks
        .values()
        .filter(|loaded| matches(loaded, &filters))
        .collect();
    selected.sort_by_key(|loaded| loaded.werk.date);
    if args.reverse {
        selected.reverse();
    }

    match format {
        ListFormat::Console => {
            let modified = ctx.modified_werks();
            for loaded in selected {
                println!(
                    "{}",
                    list_line(loaded, &loaded.werk.title, modified.contains(&loaded.werk.id))
                );
            }
        }
        ListFormat::Csv => print!("{}", csv_export(config, selected.iter().copied())),
    }
    Ok(())
}

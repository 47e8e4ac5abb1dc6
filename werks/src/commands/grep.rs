use std::collections::BTreeSet;

use clap::Args;

use super::Context;
use crate::error::Result;
use crate::output::{grep_highlight, list_line};

#[derive(Args, Debug)]
pub struct GrepArgs {
    /// Also show the matching description lines
    #[arg(short, long)]
    pub verbose: bool,

    /// Keywords that must all appear in title or description
    #[arg(required = true)]
    pub keywords: Vec<String>,
}

/// Title and description lines of a werk with all keywords highlighted
pub struct GrepMatch {
    pub title: String,
    pub lines: Vec<String>,
    pub matching_lines: BTreeSet<usize>,
}

/// Highlight every keyword. `None` unless each keyword matches somewhere.
pub fn grep_werk(title: &str, description: &str, keywords: &[String]) -> Option<GrepMatch> {
    let mut title = title.to_string();
    let mut lines: Vec<String> = description.split('\n').map(str::to_string).collect();
    let mut matching_lines = BTreeSet::new();

    for (n, keyword) in keywords.iter().enumerate() {
        let mut matched = false;
        if let Some(highlighted) = grep_highlight(&title, keyword, n + 1) {
            title = highlighted;
            matched = true;
        }
        for (index, line) in lines.iter_mut().enumerate() {
            if let Some(highlighted) = grep_highlight(line, keyword, n + 1) {
                *line = highlighted;
                matching_lines.insert(index);
                matched = true;
            }
        }
        if !matched {
            return None;
        }
    }

    Some(GrepMatch {
        title,
        lines,
        matching_lines,
    })
}

pub fn run(args: GrepArgs, ctx: &Context) -> Result<()> {
    let modified = ctx.modified_werks();
    for loaded in ctx.werks.load_all()?.values() {
        let Some(found) = grep_werk(&loaded.werk.title, &loaded.werk.description, &args.keywords)
        else {
            continue;
        };
        println!(
            "{}",
            list_line(loaded, &found.title, modified.contains(&loaded.werk.id))
        );
        if args.verbose {
            for index in &found.matching_lines {
                println!("  {}", found.lines[*index]);
            }
        }
    }
    Ok(())
}

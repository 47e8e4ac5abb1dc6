pub mod blame;
pub mod delete;
pub mod edit;
pub mod grep;
pub mod ids;
pub mod list;
pub mod new;
pub mod pick;
pub mod preview;
pub mod show;
pub mod url;

pub use blame::BlameArgs;
pub use delete::DeleteArgs;
pub use edit::EditArgs;
pub use grep::GrepArgs;
pub use ids::IdsArgs;
pub use list::{ListArgs, ListFormat};
pub use new::NewArgs;
pub use pick::PickArgs;
pub use preview::PreviewArgs;
pub use show::ShowArgs;
pub use url::UrlArgs;

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use once_cell::unsync::OnceCell;
use tracing::{debug, warn};

use crate::config::{Choice, WerksConfig};
use crate::error::{Result, WerkError};
use crate::git::Git;
use crate::stash::Stash;
use crate::store::{LoadedWerk, WerksDir};
use crate::werk::{load_werk, load_werk_file, Werk};

const FALLBACK_EDITORS: [&str; 3] = ["/usr/bin/editor", "/usr/bin/vim", "/bin/vi"];

/// Everything a subcommand works on
pub struct Context {
    pub werks: WerksDir,
    pub git: Git,
    /// Directory the tool was started in
    pub base_dir: PathBuf,
    stash_path: PathBuf,
    config: OnceCell<WerksConfig>,
}

impl Context {
    pub fn new(base_dir: PathBuf, stash_path: Option<PathBuf>) -> Result<Self> {
        let werks = WerksDir::find(&base_dir)?;
        let stash_path = match stash_path {
            Some(path) => path,
            None => Stash::default_path()?,
        };
        debug!("Using werks in {}", werks.path().display());
        Ok(Self {
            git: Git::new(werks.path()),
            werks,
            base_dir,
            stash_path,
            config: OnceCell::new(),
        })
    }

    /// The config is only read by commands that need it
    pub fn config(&self) -> Result<&WerksConfig> {
        self.config
            .get_or_try_init(|| WerksConfig::load(self.werks.path()))
    }

    pub fn load_stash(&self) -> Result<Stash> {
        Stash::load(&self.stash_path)
    }

    pub fn save_stash(&self, stash: &Stash) -> Result<()> {
        stash.save(&self.stash_path)
    }

    pub fn werk_or_last(&self, id: Option<u32>) -> Result<u32> {
        match id {
            Some(id) => Ok(id),
            None => self.werks.last(),
        }
    }

    /// Load and validate one werk
    pub fn load_valid(&self, id: u32) -> Result<LoadedWerk> {
        let stored = self.werks.load(id)?;
        let werk = load_werk(&stored.content, None).map_err(|e| {
            let content = fs::read_to_string(&stored.path).unwrap_or_default();
            e.in_file(&stored.path, content)
        })?;
        Ok(LoadedWerk { stored, werk })
    }

    /// Werks changed in the git index. Outside of a repository nothing is
    /// considered modified.
    pub fn modified_werks(&self) -> BTreeSet<u32> {
        self.git.modified_werks().unwrap_or_else(|e| {
            debug!("Cannot determine modified werks: {}", e);
            BTreeSet::new()
        })
    }
}

pub(crate) fn prompt_input(message: &str) -> Result<String> {
    print!("{}: ", message);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Resolve an answer to one of the choices: by number, by id or by an
/// unambiguous id prefix
fn resolve_choice<'a>(answer: &str, choices: &'a [Choice]) -> Option<&'a Choice> {
    if let Ok(number) = answer.parse::<usize>() {
        if let Some(choice) = number.checked_sub(1).and_then(|i| choices.get(i)) {
            return Some(choice);
        }
    }
    if let Some(choice) = choices.iter().find(|(id, _)| id == answer) {
        return Some(choice);
    }
    let mut candidates = choices.iter().filter(|(id, _)| id.starts_with(answer));
    match (candidates.next(), candidates.next()) {
        (Some(choice), None) if !answer.is_empty() => Some(choice),
        _ => None,
    }
}

pub(crate) fn input_choice(message: &str, choices: &[Choice]) -> Result<String> {
    println!("{}:", message);
    for (nr, (id, name)) in choices.iter().enumerate() {
        println!("  {:>2}) {:<12} {}", nr + 1, id, name);
    }
    loop {
        print!("{}: ", message);
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Err(WerkError::Usage("Cancelled.".to_string()));
        }
        match resolve_choice(input.trim(), choices) {
            Some((id, _)) => return Ok(id.clone()),
            None => println!("Invalid choice {:?}", input.trim()),
        }
    }
}

fn find_editor() -> Option<String> {
    std::env::var("EDITOR")
        .ok()
        .filter(|editor| !editor.is_empty())
        .or_else(|| {
            FALLBACK_EDITORS
                .iter()
                .find(|path| Path::new(path).exists())
                .map(|path| path.to_string())
        })
}

/// Open a werk in the editor until it validates, then stage it and commit
/// when requested and configured.
pub(crate) fn edit_werk(
    ctx: &Context,
    path: &Path,
    custom_files: &[String],
    commit: bool,
) -> Result<()> {
    if !path.exists() {
        return Err(WerkError::Usage("No Werk with this id.".to_string()));
    }
    let editor = find_editor()
        .ok_or_else(|| WerkError::Usage("No editor available (please set EDITOR).".to_string()))?;
    let config = ctx.config()?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let initial = fs::read_to_string(path)?;
    let line_count = initial.matches('\n').count();

    let werk = loop {
        let status = Command::new("bash")
            .arg("-c")
            .arg(format!("{} +{} \"$0\"", editor, line_count))
            .arg(path)
            .status()?;
        if !status.success() {
            return Err(WerkError::Usage(
                "Editor returned error, something is very wrong!".to_string(),
            ));
        }

        let content = fs::read_to_string(path)?;
        match load_werk_file(&content, &file_name, Some(config)) {
            Ok(werk) => break werk,
            Err(e) => {
                warn!("Werk {} does not validate", file_name);
                println!("{}\n", initial);
                println!("{}\n", e);
                println!(
                    "Could not load the Werk, see the error above.\n\
                     You may copy the initial Werk text above the error to fix your Werk.\n\
                     Will reopen the editor, after you acknowledged with enter"
                );
                let mut input = String::new();
                if io::stdin().read_line(&mut input)? == 0 {
                    return Err(e);
                }
            }
        }
    };

    ctx.git.add(path)?;
    if commit && config.create_commit {
        commit_werk(ctx, &werk, custom_files)?;
    }
    Ok(())
}

/// `<id> <class prefix> <title>`, then the description
pub fn commit_message(werk: &Werk, prefix: Option<&str>) -> String {
    let title = match prefix {
        Some(prefix) => format!("{} {}", prefix, werk.title),
        None => werk.title.clone(),
    };
    format!("{:0>5} {}\n\n{}", werk.id, title, werk.description)
}

fn commit_werk(ctx: &Context, werk: &Werk, custom_files: &[String]) -> Result<()> {
    let config = ctx.config()?;
    let message = commit_message(werk, config.class_prefix(&werk.class.to_string()));

    if !custom_files.is_empty() {
        let mut files = custom_files.to_vec();
        let top_level = ctx.git.top_level()?;
        files.push(top_level.join(".werks").to_string_lossy().into_owned());
        Git::new(&ctx.base_dir).commit(&message, &files, false)
    } else if ctx.git.something_in_index()? {
        ctx.git.add(ctx.werks.path())?;
        ctx.git.commit(&message, &[], false)
    } else {
        ctx.git.commit(&message, &[], true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_werk;

    fn choices() -> Vec<Choice> {
        vec![
            ("fix".to_string(), "Bug fix".to_string()),
            ("feature".to_string(), "New feature".to_string()),
            ("security".to_string(), "Security fix".to_string()),
        ]
    }

    #[test]
    fn test_resolve_choice() {
        let choices = choices();
        assert_eq!(resolve_choice("2", &choices).map(|c| c.0.as_str()), Some("feature"));
        assert_eq!(resolve_choice("fix", &choices).map(|c| c.0.as_str()), Some("fix"));
        assert_eq!(resolve_choice("s", &choices).map(|c| c.0.as_str()), Some("security"));
        assert_eq!(resolve_choice("f", &choices), None);
        assert_eq!(resolve_choice("4", &choices), None);
        assert_eq!(resolve_choice("0", &choices), None);
        assert_eq!(resolve_choice("", &choices), None);
    }

    #[test]
    fn test_commit_message() {
        let parsed = parse_werk(
            "[//]: # (werk v2)\n# Fix agent crash\n\nkey | value\n--- | ---\n\
             date | 2024-01-11T09:03:10+00:00\nversion | 2.3.0\nclass | fix\n\
             edition | cre\ncomponent | checks\nlevel | 1\ncompatible | yes\n\nDetails\n",
            "815.md",
        )
        .unwrap();
        let werk = load_werk(&parsed, None).unwrap();
        assert_eq!(
            commit_message(&werk, Some("FIX")),
            "00815 FIX Fix agent crash\n\nDetails"
        );
        assert_eq!(commit_message(&werk, None), "00815 Fix agent crash\n\nDetails");
    }
}

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cmk_werks::commands::{
    self, BlameArgs, Context, DeleteArgs, EditArgs, GrepArgs, IdsArgs, ListArgs, ListFormat,
    NewArgs, PickArgs, PreviewArgs, ShowArgs, UrlArgs,
};
use cmk_werks::WerkError;

#[derive(Parser)]
#[command(name = "werk")]
#[command(about = "Manage the werks (changelog entries) of the repository")]
#[command(version)]
#[command(long_about = "
werk works on the .werks directory found by walking up from the current
directory. Ids of new werks are taken from the reserved ids in ~/.cmk-werk-ids.

Examples:
  werk list current fix            # Bug fixes of the current version
  werk show 15432                  # Show one werk
  werk grep -v backup proxmox      # Werks mentioning both keywords
  werk ids 10                      # Reserve ten werk ids
  werk new                         # Create a werk interactively
")]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// File holding the reserved werk ids
    #[arg(long, global = true, env = "WERK_IDS_FILE")]
    ids_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show who worked on a werk
    Blame(BlameArgs),

    /// Delete werks and give their ids back
    Delete(DeleteArgs),

    /// Open a werk in the editor
    Edit(EditArgs),

    /// Export werks as CSV, grouped by component
    Export(ListArgs),

    /// Show werks containing all of the given keywords
    Grep(GrepArgs),

    /// Show the number of reserved werk ids or reserve new ones
    Ids(IdsArgs),

    /// List werks
    List(ListArgs),

    /// Create a new werk
    New(NewArgs),

    /// Cherry-pick commits and move their werks to the current version
    #[command(alias = "cherry-pick")]
    Pick(PickArgs),

    /// Preview the HTML rendering of a werk
    Preview(PreviewArgs),

    /// Show werks, the last one by default
    Show(ShowArgs),

    /// Show the online URL of a werk
    Url(UrlArgs),
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.debug);
    if cli.no_color {
        console::set_colors_enabled(false);
    }

    if let Err(e) = run_command(cli) {
        eprintln!("{}", e);
        process::exit(e.exit_code());
    }
}

fn run_command(cli: Cli) -> Result<(), WerkError> {
    let base_dir = std::env::current_dir()?;
    let ctx = Context::new(base_dir, cli.ids_file)?;
    debug!("Werk tool started");

    match cli.command {
        Commands::Blame(args) => commands::blame::run(args, &ctx),
        Commands::Delete(args) => commands::delete::run(args, &ctx),
        Commands::Edit(args) => commands::edit::run(args, &ctx),
        Commands::Export(args) => commands::list::run(args, &ctx, ListFormat::Csv),
        Commands::Grep(args) => commands::grep::run(args, &ctx),
        Commands::Ids(args) => commands::ids::run(args, &ctx),
        Commands::List(args) => commands::list::run(args, &ctx, ListFormat::Console),
        Commands::New(args) => commands::new::run(args, &ctx),
        Commands::Pick(args) => commands::pick::run(args, &ctx),
        Commands::Preview(args) => commands::preview::run(args, &ctx),
        Commands::Show(args) => commands::show::run(args, &ctx),
        Commands::Url(args) => commands::url::run(args, &ctx),
    }
}

fn init_logging(debug: bool) {
    let log_level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cmk_werks={},werk={}", log_level, log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert()
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["werk", "cherry-pick", "-n", "abc123"]).unwrap();
        assert!(matches!(cli.command, Commands::Pick(PickArgs { no_commit: true, .. })));

        let cli = Cli::try_parse_from(["werk", "grep", "-v", "backup"]).unwrap();
        assert!(matches!(cli.command, Commands::Grep(GrepArgs { verbose: true, .. })));

        assert!(Cli::try_parse_from(["werk", "delete"]).is_err());
        assert!(Cli::try_parse_from(["werk", "url", "abc"]).is_err());
    }
}

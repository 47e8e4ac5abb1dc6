//! Werks are the changelog entries of the project: one markdown file per
//! change in the `.werks` directory of the repository.
//!
//! This crate parses, validates and formats werk files and implements the
//! `werk` command line tool on top of them.

pub mod commands;
pub mod config;
pub mod error;
pub mod format;
pub mod git;
pub mod output;
pub mod parse;
pub mod stash;
pub mod store;
pub mod werk;

pub use config::WerksConfig;
pub use error::{Result, WerkError};
pub use format::format_as_markdown_werk;
pub use parse::{parse_werk, WerkParseResult, WERK_V2_MARKER};
pub use stash::{reserve_ids, Stash};
pub use store::{LoadedWerk, StoredWerk, WerksDir};
pub use werk::{load_werk, load_werk_file, Compatibility, Werk, WerkClass};

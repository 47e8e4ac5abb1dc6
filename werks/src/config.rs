use std::collections::BTreeMap;
use std::path::Path;

use config::{Config, File, FileFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, WerkError};

pub const CONFIG_FILE: &str = "config.toml";

static DEFINES_MAKE_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^VERSION\s*:?=\s*(\S+)\s*$").expect("valid regex"));

/// `(id, human readable name)`
pub type Choice = (String, String);

/// Project settings, read from `.werks/config.toml`
#[derive(Debug, Clone, Deserialize)]
pub struct WerksConfig {
    pub project: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub create_commit: bool,
    /// URL template, `{id}` is replaced by the werk id
    pub online_url: String,
    #[serde(default)]
    pub current_version: String,
    pub editions: Vec<Choice>,
    pub components: Vec<Choice>,
    #[serde(default)]
    pub edition_components: BTreeMap<String, Vec<Choice>>,
    /// `(id, name, commit message prefix)`
    pub classes: Vec<(String, String, String)>,
    pub levels: Vec<Choice>,
    pub compatible: Vec<Choice>,
}

impl WerksConfig {
    /// Load the config of a `.werks` directory.
    ///
    /// Without `current_version` in the file, the version is taken from
    /// `defines.make` next to the `.werks` directory.
    pub fn load(werks_dir: &Path) -> Result<Self> {
        let path = werks_dir.join(CONFIG_FILE);
        debug!("Loading werk config from {}", path.display());

        let mut config: WerksConfig = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        if config.current_version.is_empty() {
            let defines = werks_dir.join("..").join("defines.make");
            if let Some(version) = current_version_from_defines_make(&defines) {
                config.current_version = version;
            }
        }
        Ok(config)
    }

    pub fn current_version(&self) -> Result<&str> {
        if self.current_version.is_empty() {
            Err(WerkError::Usage(
                "No current version configured and none found in defines.make".to_string(),
            ))
        } else {
            Ok(&self.current_version)
        }
    }

    /// Components of all editions
    pub fn all_components(&self) -> Vec<&Choice> {
        self.components
            .iter()
            .chain(self.edition_components.values().flatten())
            .collect()
    }

    /// Components selectable for werks of one edition
    pub fn components_of_edition(&self, edition: &str) -> Vec<Choice> {
        let mut components = self.components.clone();
        if let Some(extra) = self.edition_components.get(edition) {
            components.extend(extra.iter().cloned());
        }
        components
    }

    pub fn class_choices(&self) -> Vec<Choice> {
        self.classes
            .iter()
            .map(|(id, name, _)| (id.clone(), name.clone()))
            .collect()
    }

    /// Commit message prefix of a werk class, if any
    pub fn class_prefix(&self, class: &str) -> Option<&str> {
        self.classes
            .iter()
            .find(|(id, _, _)| id == class)
            .map(|(_, _, prefix)| prefix.as_str())
            .filter(|prefix| !prefix.is_empty())
    }

    /// Human readable name of a werk class
    pub fn class_name<'a>(&'a self, class: &'a str) -> &'a str {
        self.classes
            .iter()
            .find(|(id, _, _)| id == class)
            .map(|(_, name, _)| name.as_str())
            .unwrap_or(class)
    }

    pub fn online_url(&self, id: u32) -> String {
        self.online_url.replace("{id}", &id.to_string())
    }
}

/// Read `VERSION := x.y.z` from a `defines.make`.
pub fn current_version_from_defines_make(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    DEFINES_MAKE_VERSION
        .captures(&content)
        .map(|caps| caps[1].to_string())
}

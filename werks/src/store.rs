use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, WerkError};
use crate::format::format_as_markdown_werk;
use crate::parse::{parse_werk, werk_id_from_file_name, WerkParseResult};
use crate::werk::{load_werk, Werk};

pub const WERKS_DIR: &str = ".werks";
const LAST_FILE: &str = ".last";
const FIRST_FREE_FILE: &str = "first_free";

/// A werk file as found on disk
#[derive(Debug, Clone)]
pub struct StoredWerk {
    pub id: u32,
    pub path: PathBuf,
    pub content: WerkParseResult,
}

impl StoredWerk {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn is_markdown(&self) -> bool {
        self.path.extension().is_some_and(|ext| ext == "md")
    }
}

/// A stored werk that passed validation
#[derive(Debug, Clone)]
pub struct LoadedWerk {
    pub stored: StoredWerk,
    pub werk: Werk,
}

/// The `.werks` directory of a repository
#[derive(Debug, Clone)]
pub struct WerksDir {
    path: PathBuf,
}

impl WerksDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Walk up from `start` to the first directory containing `.werks`.
    pub fn find(start: &Path) -> Result<Self> {
        start
            .ancestors()
            .map(|dir| dir.join(WERKS_DIR))
            .find(|candidate| candidate.is_dir())
            .map(Self::new)
            .ok_or(WerkError::NoWerksDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of an existing werk, markdown or legacy
    pub fn werk_path(&self, id: u32) -> Result<PathBuf> {
        [id.to_string(), format!("{}.md", id)]
            .into_iter()
            .map(|name| self.path.join(name))
            .find(|path| path.exists())
            .ok_or(WerkError::NotFound(id))
    }

    pub fn exists(&self, id: u32) -> bool {
        self.werk_path(id).is_ok()
    }

    /// New werks are always written as markdown
    pub fn new_werk_path(&self, id: u32) -> PathBuf {
        self.path.join(format!("{}.md", id))
    }

    /// Ids of all werk files, sorted
    pub fn ids(&self) -> Result<Vec<u32>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if let Some(id) = werk_id_from_file_name(&entry.file_name().to_string_lossy()) {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    pub fn load_path(&self, path: &Path) -> Result<StoredWerk> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let id = werk_id_from_file_name(&file_name).ok_or_else(|| {
            WerkError::parse(&file_name, "file name is not a werk id")
        })?;
        let text = fs::read_to_string(path)?;
        let content = parse_werk(&text, &file_name).map_err(|e| e.in_file(path, text.as_str()))?;
        Ok(StoredWerk {
            id,
            path: path.to_path_buf(),
            content,
        })
    }

    pub fn load(&self, id: u32) -> Result<StoredWerk> {
        let path = self.werk_path(id)?;
        self.load_path(&path)
    }

    /// Load and validate all werks. Invalid ones are reported and skipped.
    pub fn load_all(&self) -> Result<BTreeMap<u32, LoadedWerk>> {
        let mut werks = BTreeMap::new();
        for id in self.ids()? {
            let loaded = self.load(id).and_then(|stored| {
                let werk = load_werk(&stored.content, None)?;
                Ok(LoadedWerk { stored, werk })
            });
            match loaded {
                Ok(loaded) => {
                    werks.insert(id, loaded);
                }
                Err(e) => {
                    warn!("Skipping invalid werk {}", id);
                    eprintln!("ERROR: Skipping invalid Werk {}: {}", id, e);
                }
            }
        }
        debug!("Loaded {} werks from {}", werks.len(), self.path.display());
        Ok(werks)
    }

    /// Write a werk as markdown and remember it as the last touched one.
    pub fn save(&self, path: &Path, id: u32, content: &WerkParseResult) -> Result<()> {
        fs::write(path, format_as_markdown_werk(content))?;
        self.save_last(id);
        Ok(())
    }

    pub fn last(&self) -> Result<u32> {
        fs::read_to_string(self.path.join(LAST_FILE))
            .ok()
            .and_then(|content| content.trim().parse().ok())
            .ok_or(WerkError::NoLastWerk)
    }

    pub fn save_last(&self, id: u32) {
        if let Err(e) = fs::write(self.path.join(LAST_FILE), format!("{}\n", id)) {
            debug!("Cannot remember last werk: {}", e);
        }
    }

    pub fn first_free(&self) -> Result<u32> {
        let path = self.path.join(FIRST_FREE_FILE);
        fs::read_to_string(&path)
            .ok()
            .and_then(|content| content.trim().parse().ok())
            .ok_or_else(|| WerkError::Ids(format!("Could not load {}", path.display())))
    }

    pub fn save_first_free(&self, first_free: u32) -> Result<()> {
        fs::write(self.path.join(FIRST_FREE_FILE), format!("{}\n", first_free))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const WERK: &str = "[//]: # (werk v2)
# Stored werk

key | value
--- | ---
date | 2024-01-11T09:03:10+00:00
version | 2.3.0
class | fix
edition | cre
component | checks
level | 1
compatible | yes

Description
";

    fn werks_dir() -> (TempDir, WerksDir) {
        let root = TempDir::new().unwrap();
        let path = root.path().join(WERKS_DIR);
        fs::create_dir(&path).unwrap();
        (root, WerksDir::new(path))
    }

    #[test]
    fn test_find_walks_up() {
        let (root, werks) = werks_dir();
        let nested = root.path().join("agents").join("plugins");
        fs::create_dir_all(&nested).unwrap();
        let found = WerksDir::find(&nested).unwrap();
        assert_eq!(found.path(), werks.path());

        let elsewhere = TempDir::new().unwrap();
        assert!(matches!(
            WerksDir::find(elsewhere.path()),
            Err(WerkError::NoWerksDir)
        ));
    }

    #[test]
    fn test_ids_and_paths() {
        let (_root, werks) = werks_dir();
        fs::write(werks.path().join("15001.md"), WERK).unwrap();
        fs::write(werks.path().join("9001"), "Title: x\n\n").unwrap();
        fs::write(werks.path().join("first_free"), "15002\n").unwrap();
        fs::write(werks.path().join("config.toml"), "").unwrap();

        assert_eq!(werks.ids().unwrap(), vec![9001, 15001]);
        assert_eq!(werks.werk_path(9001).unwrap(), werks.path().join("9001"));
        assert_eq!(werks.werk_path(15001).unwrap(), werks.path().join("15001.md"));
        assert!(matches!(werks.werk_path(1), Err(WerkError::NotFound(1))));
        assert_eq!(werks.first_free().unwrap(), 15002);
    }

    #[test]
    fn test_load_all_skips_invalid() {
        let (_root, werks) = werks_dir();
        fs::write(werks.path().join("15001.md"), WERK).unwrap();
        fs::write(
            werks.path().join("15002.md"),
            WERK.replace("level | 1", "level | 7"),
        )
        .unwrap();
        fs::write(werks.path().join("15003.md"), "garbage").unwrap();

        let loaded = werks.load_all().unwrap();
        assert_eq!(loaded.keys().copied().collect::<Vec<_>>(), vec![15001]);
        assert_eq!(loaded[&15001].werk.title, "Stored werk");
    }

    #[test]
    fn test_save_remembers_last() {
        let (_root, werks) = werks_dir();
        assert!(matches!(werks.last(), Err(WerkError::NoLastWerk)));

        fs::write(werks.path().join("15001.md"), WERK).unwrap();
        let mut stored = werks.load(15001).unwrap();
        stored.content.metadata.insert("version".into(), "2.3.0p1".into());
        werks.save(&stored.path, stored.id, &stored.content).unwrap();

        assert_eq!(werks.last().unwrap(), 15001);
        let written = fs::read_to_string(werks.path().join("15001.md")).unwrap();
        assert_eq!(written, WERK.replace("version | 2.3.0\n", "version | 2.3.0p1\n"));
    }

    #[test]
    fn test_load_error_names_file() {
        let (_root, werks) = werks_dir();
        fs::write(werks.path().join("15003.md"), "garbage").unwrap();
        let err = werks.load(15003).unwrap_err();
        assert!(matches!(err, WerkError::InFile { .. }));
        assert!(err.to_string().contains("15003.md"));
        assert!(err.to_string().ends_with("garbage"));
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WerkError};

pub const STASH_FILE: &str = ".cmk-werk-ids";

/// Werk id ranges per project, start inclusive and end exclusive
pub const WERK_ID_RANGES: &[(&str, &[(u32, u32)])] = &[
    ("cma", &[(9_000, 10_000)]),
    ("cmk", &[(10_000, 1_000_000)]),
    ("cloudmk", &[(1_000_000, 2_000_000)]),
];

pub fn id_ranges(project: &str) -> Option<&'static [(u32, u32)]> {
    WERK_ID_RANGES
        .iter()
        .find(|(name, _)| *name == project)
        .map(|(_, ranges)| *ranges)
}

/// Werk ids reserved by the current user, kept in the home directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stash {
    pub ids_by_project: BTreeMap<String, Vec<u32>>,
}

impl Stash {
    pub fn default_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(STASH_FILE))
            .ok_or_else(|| WerkError::Usage("Cannot determine home directory".to_string()))
    }

    /// A missing stash file is an empty stash
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No werk id stash at {}", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.ids_by_project.values().map(Vec::len).sum()
    }

    pub fn add_id(&mut self, id: u32, project: &str) {
        let ids = self.ids_by_project.entry(project.to_string()).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    /// The next reserved id of a project, without removing it
    pub fn pick_id(&self, project: &str) -> Result<u32> {
        self.ids_by_project
            .get(project)
            .and_then(|ids| ids.first().copied())
            .ok_or_else(|| {
                WerkError::Ids(format!(
                    "You have no Werk IDs left for project {:?}. \
                     You can reserve 10 additional IDs with 'werk ids 10'.",
                    project
                ))
            })
    }

    pub fn free_id(&mut self, id: u32) {
        for ids in self.ids_by_project.values_mut() {
            ids.retain(|i| *i != id);
        }
    }
}

/// Reserve `count` ids starting at `first_free`, continuing into the next
/// range when one is exhausted.
///
/// Returns the new first free id and the reserved ids.
pub fn reserve_ids(ranges: &[(u32, u32)], first_free: u32, count: u32) -> Result<(u32, Vec<u32>)> {
    let mut reserved = Vec::new();
    let mut first_free = first_free;
    let mut count = count;

    for (index, &(start, end)) in ranges.iter().enumerate() {
        if first_free > end {
            continue;
        }
        if first_free < start {
            return Err(WerkError::Ids(format!(
                "Configuration error: first_free {} not in range {}..{}",
                first_free, start, end
            )));
        }
        let new_first_free = first_free.saturating_add(count);
        if new_first_free < end {
            reserved.extend(first_free..new_first_free);
            return Ok((new_first_free, reserved));
        }
        reserved.extend(first_free..end);
        count -= end - first_free;
        match ranges.get(index + 1) {
            Some(&(next_start, _)) => first_free = next_start,
            None => {
                return Err(WerkError::Ids(
                    "Not enough ids available, please add a fresh range".to_string(),
                ))
            }
        }
    }

    Err(WerkError::Ids("Could not allocate ids".to_string()))
}

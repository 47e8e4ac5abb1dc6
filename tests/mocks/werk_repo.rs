use std::fs;
use std::path::{Path, PathBuf};

use cmk_werks::WerksDir;
use tempfile::TempDir;

const CONFIG: &str = r#"project = "cmk"
online_url = "https://checkmk.com/werk/{id}"
create_commit = false
editions = [["cre", "Checkmk Raw Edition"], ["cee", "Checkmk Enterprise Editions"]]
components = [["checks", "Checks & agents"], ["multisite", "User interface"]]
classes = [["fix", "Bug fix", "FIX"], ["feature", "New feature", ""], ["security", "Security fix", "SEC"]]
levels = [["1", "Trivial change"], ["2", "Prominent change"], ["3", "Major change"]]
compatible = [["yes", "Compatible"], ["no", "Incompatible"]]

[edition_components]
cee = [["reporting", "Reporting & availability"]]
"#;

/// A scratch checkout with a `.werks` directory and a `defines.make`
pub struct WerkRepo {
    root: TempDir,
}

impl WerkRepo {
    pub fn new(version: &str) -> std::io::Result<Self> {
        let root = TempDir::new()?;
        let werks = root.path().join(".werks");
        fs::create_dir(&werks)?;
        fs::write(werks.join("config.toml"), CONFIG)?;
        fs::write(werks.join("first_free"), "15010\n")?;
        fs::write(
            root.path().join("defines.make"),
            format!("# generated\nVERSION            := {}\n", version),
        )?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn werks_path(&self) -> PathBuf {
        self.root.path().join(".werks")
    }

    pub fn werks_dir(&self) -> WerksDir {
        WerksDir::new(self.werks_path())
    }

    /// Write a markdown werk file as is
    pub fn write(&self, file_name: &str, content: &str) -> std::io::Result<PathBuf> {
        let path = self.werks_path().join(file_name);
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Write a werk with the given metadata rows
    pub fn add_werk(&self, id: u32, title: &str, rows: &[(&str, &str)], description: &str) -> std::io::Result<PathBuf> {
        let table: String = rows
            .iter()
            .map(|(key, value)| format!("{} | {}\n", key, value))
            .collect();
        self.write(
            &format!("{}.md", id),
            &format!(
                "[//]: # (werk v2)\n# {}\n\nkey | value\n--- | ---\n{}\n{}\n",
                title, table, description
            ),
        )
    }
}

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::debug;

use crate::error::{Result, WerkError};
use crate::parse::werk_id_from_file_name;

/// Thin wrapper around the `git` executable
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        debug!("git {}", args.join(" "));
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.workdir).args(args);
        cmd
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        let output = self.command(args).output()?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(WerkError::Git {
                command: args.join(" "),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn stdout(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run a command attached to the terminal, returning its exit code
    fn interactive(&self, args: &[&str]) -> Result<i32> {
        let status = self.command(args).status()?;
        Ok(status.code().unwrap_or(1))
    }

    fn checked(&self, args: &[&str]) -> Result<()> {
        match self.interactive(args)? {
            0 => Ok(()),
            code => Err(WerkError::Git {
                command: args.join(" "),
                message: format!("exit code {}", code),
            }),
        }
    }

    fn status_porcelain(&self) -> Result<String> {
        self.stdout(&["status", "--porcelain"])
    }

    /// Ids of werks that are added or modified in the index
    pub fn modified_werks(&self) -> Result<BTreeSet<u32>> {
        Ok(modified_werks_from_status(&self.status_porcelain()?))
    }

    pub fn something_in_index(&self) -> Result<bool> {
        Ok(self
            .status_porcelain()?
            .lines()
            .any(|line| line.starts_with('M')))
    }

    pub fn add(&self, path: &Path) -> Result<()> {
        self.output(&["add", &path.to_string_lossy()]).map(drop)
    }

    pub fn rm(&self, path: &Path) -> Result<()> {
        self.output(&["rm", "-f", &path.to_string_lossy()]).map(drop)
    }

    pub fn mv(&self, source: &Path, destination: &Path) -> Result<()> {
        self.output(&[
            "mv",
            &source.to_string_lossy(),
            &destination.to_string_lossy(),
        ])
        .map(drop)
    }

    pub fn top_level(&self) -> Result<PathBuf> {
        Ok(PathBuf::from(
            self.stdout(&["rev-parse", "--show-toplevel"])?.trim(),
        ))
    }

    pub fn current_branch(&self) -> Result<String> {
        Ok(self.stdout(&["branch", "--show-current"])?.trim().to_string())
    }

    /// Origin URL without user and `.git` suffix
    pub fn current_repo(&self) -> Result<String> {
        let url = self.stdout(&["config", "--get", "remote.origin.url"])?;
        Ok(normalize_repo_url(&url))
    }

    /// Commit with a message. `files` limits the commit to these paths, `all`
    /// commits all tracked changes.
    pub fn commit(&self, message: &str, files: &[String], all: bool) -> Result<()> {
        let mut args = vec!["commit"];
        if all {
            args.push("-a");
        }
        args.extend(["-m", message]);
        args.extend(files.iter().map(String::as_str));
        self.checked(&args)
    }

    pub fn commit_amend_no_edit(&self) -> Result<()> {
        self.checked(&["commit", "--no-edit", "--amend"])
    }

    /// Commit everything below the working directory, skipping hooks
    pub fn commit_no_verify(&self, message: &str) -> Result<()> {
        self.checked(&["commit", "--no-verify", "-m", message, "."])
    }

    pub fn blame(&self, path: &Path) -> Result<()> {
        self.checked(&["blame", &path.to_string_lossy()])
    }

    /// Files touched by a commit, relative to the repository root
    pub fn diff_tree(&self, commit: &str) -> Result<Vec<String>> {
        Ok(self
            .stdout(&["diff-tree", "--no-commit-id", "--name-only", "-r", commit])?
            .lines()
            .map(str::to_string)
            .collect())
    }

    /// Cherry-pick a commit, returning git's exit code
    pub fn cherry_pick(&self, commit: &str, no_commit: bool) -> Result<i32> {
        let mut args = vec!["cherry-pick"];
        if no_commit {
            args.push("--no-commit");
        }
        args.push(commit);
        self.interactive(&args)
    }

    pub fn status(&self) -> Result<()> {
        self.checked(&["status"])
    }
}

fn modified_werks_from_status(status: &str) -> BTreeSet<u32> {
    status
        .lines()
        .filter(|line| line.starts_with(&['A', 'M'][..]) && line.contains(".werks/"))
        .filter_map(|line| line.rsplit('/').next())
        .filter_map(|name| werk_id_from_file_name(name.trim()))
        .collect()
}

fn normalize_repo_url(url: &str) -> String {
    let url = url.trim();
    let url = url.rsplit('@').next().unwrap_or(url);
    url.strip_suffix(".git").unwrap_or(url).to_string()
}

/// The werk a commit touches, if any: `(file name, id)`
pub fn werk_in_commit(files: &[String]) -> Option<(String, u32)> {
    files.iter().rev().find_map(|file| {
        let path = Path::new(file);
        let parent = path.parent()?.file_name()?;
        if parent != ".werks" {
            return None;
        }
        let name = path.file_name()?.to_string_lossy().into_owned();
        let id = werk_id_from_file_name(&name)?;
        Some((name, id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modified_werks() {
        let status = [
            "M  .werks/15001.md",
            "A  .werks/15002.md",
            "?? .werks/15003.md",
            "M  agents/plugins/mk_foo",
            "A  .werks/first_free",
            " M .werks/9001",
        ]
        .join("\n");
        let modified = modified_werks_from_status(&status);
        assert_eq!(modified.into_iter().collect::<Vec<_>>(), vec![15001, 15002]);
    }

    #[test]
    fn test_normalize_repo_url() {
        assert_eq!(
            normalize_repo_url("ssh://jenkins@review.lan.example.com:29418/check_mk.git\n"),
            "review.lan.example.com:29418/check_mk"
        );
        assert_eq!(
            normalize_repo_url("https://github.com/example/checkmk"),
            "https://github.com/example/checkmk"
        );
    }

    #[test]
    fn test_werk_in_commit() {
        let files = vec![
            "cmk/plugins/proxmox_ve/agent.py".to_string(),
            ".werks/16005.md".to_string(),
        ];
        assert_eq!(werk_in_commit(&files), Some(("16005.md".to_string(), 16005)));

        let files = vec!["packages/.werks/first_free".to_string(), "README".to_string()];
        assert_eq!(werk_in_commit(&files), None);
    }
}

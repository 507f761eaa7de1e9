//! Sources for the list of files a pull request changed.
//!
//! The [`ChangedFileSource`] trait abstracts over the ways to obtain that
//! list: a newline-separated list on stdin or in a file, `git diff
//! --name-only`, or the GitHub pull request files API.
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};

use crate::github;

/// A source for the paths changed by a pull request, relative to the
/// repository root.
pub trait ChangedFileSource {
    /// Fetch the changed paths.
    fn fetch_files(&self) -> Result<Vec<String>>;

    /// Get the commit SHA, if available.
    fn sha(&self) -> Option<&str> {
        None
    }
}

/// Split a newline-separated path list. Blank lines and surrounding
/// whitespace are ignored; repeated paths keep their first position.
pub fn parse_file_list(text: &str) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !files.iter().any(|f| f == line) {
            files.push(line.to_string());
        }
    }
    files
}

/// Path list from stdin.
pub struct StdinFiles;

impl ChangedFileSource for StdinFiles {
    fn fetch_files(&self) -> Result<Vec<String>> {
        let text = std::io::read_to_string(std::io::stdin())
            .context("Failed to read changed files from stdin")?;
        Ok(parse_file_list(&text))
    }
}

/// Path list from a file.
pub struct ListFile {
    pub path: PathBuf,
}

impl ChangedFileSource for ListFile {
    fn fetch_files(&self) -> Result<Vec<String>> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        Ok(parse_file_list(&text))
    }
}

/// Paths from `git diff --name-only <args>` (e.g. `origin/main...HEAD`).
pub struct GitChangedFiles {
    /// Arguments to pass to `git diff --name-only`.
    pub args: String,
}

impl ChangedFileSource for GitChangedFiles {
    fn fetch_files(&self) -> Result<Vec<String>> {
        let diff_args: Vec<&str> = self.args.split_whitespace().collect();
        let output = Command::new("git")
            .arg("diff")
            .arg("--name-only")
            .args(&diff_args)
            .output()
            .context("Failed to run git diff")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git diff failed: {stderr}");
        }

        let text = String::from_utf8(output.stdout).context("git diff output not valid UTF-8")?;
        Ok(parse_file_list(&text))
    }
}

/// Paths from a GitHub pull request.
pub struct GitHubFiles<'a> {
    /// The resolved GitHub context.
    pub context: &'a github::Context,
}

impl ChangedFileSource for GitHubFiles<'_> {
    fn fetch_files(&self) -> Result<Vec<String>> {
        self.context.fetch_pr_files()
    }

    fn sha(&self) -> Option<&str> {
        self.context.sha.as_deref()
    }
}

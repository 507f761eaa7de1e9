//! Command handler functions for the covdelta CLI.
//!
//! Handlers take already-loaded inputs and return their output as a
//! `String`, making them easy to test without capturing stdout or touching
//! the network.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::ValueEnum;

use crate::config::ReportConfig;
use crate::diff::{self, Alignment};
use crate::model::CoverageSnapshot;
use crate::paths::{self, ChangedFiles};
use crate::report::{self, MarkdownFormatter, RenderContext, ReportFormatter, TextFormatter};

/// Output style for the `report` command.
#[derive(Clone, Debug, ValueEnum)]
pub enum Style {
    Text,
    Markdown,
    Json,
}

/// Where the list of changed files is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Stdin,
    ListFile(PathBuf),
    GitDiff(String),
    GitHub,
}

/// Pick the changed-file source. An explicit list or git diff wins; with a
/// GitHub context available the pull request's files are used; stdin is the
/// last resort.
#[must_use]
pub fn select_source(
    changed_files: Option<&Path>,
    git_diff: Option<&str>,
    github_available: bool,
) -> SourceKind {
    match (changed_files, git_diff) {
        (Some(path), _) if path.as_os_str() == "-" => SourceKind::Stdin,
        (Some(path), _) => SourceKind::ListFile(path.to_path_buf()),
        (None, Some(args)) => SourceKind::GitDiff(args.to_string()),
        (None, None) if github_available => SourceKind::GitHub,
        (None, None) => SourceKind::Stdin,
    }
}

/// Rendered report plus the failure figure the caller decides exit status
/// from.
#[derive(Debug)]
pub struct ReportOutcome {
    pub output: String,
    /// Worst per-file drop beyond the fail delta, as a display string.
    pub failure_percent: Option<String>,
}

/// Compare `current` against `base` for the given changed files and render
/// the result.
pub fn cmd_report(
    current: &CoverageSnapshot,
    base: &CoverageSnapshot,
    changed_files: Vec<String>,
    config: &ReportConfig,
    style: &Style,
    sha: Option<String>,
    repo_url: Option<String>,
) -> Result<ReportOutcome> {
    let changed = ChangedFiles::new(changed_files);
    let alignment = Alignment::discover(changed, current, base, config.strip_path_prefix());
    let diff_report = diff::compute_diff(current, base, &alignment)?;

    let ctx = RenderContext {
        sha,
        repo_url,
        prefix: alignment.current_prefix().clone(),
    };
    let vars = report::template_vars(&diff_report, config, &ctx)?;

    let output = match style {
        Style::Text => TextFormatter.format(&vars),
        Style::Markdown => MarkdownFormatter.format(&vars),
        Style::Json => {
            let mut json = serde_json::to_string_pretty(&vars)?;
            json.push('\n');
            json
        }
    };

    Ok(ReportOutcome {
        output,
        failure_percent: vars.coverage_file_failure_percent,
    })
}

/// Show which prefix aligns the coverage keys with the changed files and
/// which coverage entries it selects.
pub fn cmd_prefix(
    snapshot: &CoverageSnapshot,
    changed_files: Vec<String>,
    strip_prefix: Option<&str>,
) -> Result<String> {
    let changed = ChangedFiles::new(changed_files);
    let prefix = paths::discover_prefix_with_override(&changed, snapshot.keys(), strip_prefix);

    let mut out = String::new();
    writeln!(out, "Prefix:     {:?}", prefix.as_str()).unwrap();

    let matched: Vec<&str> = snapshot
        .keys()
        .filter(|k| paths::is_in_pr(k, &prefix, &changed))
        .collect();
    writeln!(
        out,
        "Matched:    {}/{} changed files",
        matched.len(),
        changed.len()
    )
    .unwrap();
    for key in &matched {
        writeln!(out, "  {key}").unwrap();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileMetrics, TOTAL_KEY};

    fn snapshot(entries: &[(&str, f64)]) -> CoverageSnapshot {
        CoverageSnapshot::from_entries(
            entries
                .iter()
                .map(|&(p, pct)| (p.to_string(), FileMetrics::uniform(100, pct))),
        )
    }

    fn files(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_cmd_report_text() {
        let current = snapshot(&[(TOTAL_KEY, 80.0), ("/w/src/a.js", 90.0), ("/w/src/b.js", 50.0)]);
        let base = snapshot(&[(TOTAL_KEY, 78.0), ("/w/src/a.js", 80.0), ("/w/src/b.js", 50.0)]);

        let outcome = cmd_report(
            &current,
            &base,
            files(&["src/a.js", "src/b.js"]),
            &ReportConfig::default(),
            &Style::Text,
            None,
            None,
        )
        .unwrap();

        assert!(outcome.output.contains("Total: 80% of 100 lines (+2)"));
        assert!(outcome.output.contains("src/a.js"));
        assert!(outcome.output.contains("Unchanged files: 1"));
        assert!(outcome.failure_percent.is_none());
    }

    #[test]
    fn test_cmd_report_failure() {
        let current = snapshot(&[(TOTAL_KEY, 80.0), ("src/a.js", 70.0)]);
        let base = snapshot(&[(TOTAL_KEY, 80.0), ("src/a.js", 75.56)]);

        let outcome = cmd_report(
            &current,
            &base,
            files(&["src/a.js"]),
            &ReportConfig::default(),
            &Style::Markdown,
            Some("abc1234def".to_string()),
            Some("https://github.com/o/r".to_string()),
        )
        .unwrap();

        assert_eq!(outcome.failure_percent.as_deref(), Some("5.6"));
        assert!(outcome.output.contains("dropped by **5.6%**"));
        assert!(outcome.output.contains("https://github.com/o/r/commits/abc1234def"));
    }

    #[test]
    fn test_cmd_report_json() {
        let current = snapshot(&[(TOTAL_KEY, 80.0), ("src/a.js", 70.0)]);
        let base = CoverageSnapshot::new();

        let outcome = cmd_report(
            &current,
            &base,
            files(&["src/a.js"]),
            &ReportConfig::default(),
            &Style::Json,
            None,
            None,
        )
        .unwrap();

        let json: serde_json::Value = serde_json::from_str(&outcome.output).unwrap();
        assert_eq!(json["changed"][0]["isNewFile"], true);
        assert_eq!(json["changed"][0]["lines"]["diff"], "70");
        assert_eq!(json["total"]["diff"], "80");
    }

    #[test]
    fn test_cmd_report_missing_total() {
        let current = snapshot(&[("src/a.js", 70.0)]);
        let result = cmd_report(
            &current,
            &CoverageSnapshot::new(),
            files(&["src/a.js"]),
            &ReportConfig::default(),
            &Style::Text,
            None,
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_select_source_explicit_wins() {
        let list = Path::new("changed.txt");
        assert_eq!(
            select_source(Some(list), Some("main...HEAD"), true),
            SourceKind::ListFile(PathBuf::from("changed.txt"))
        );
        assert_eq!(select_source(Some(Path::new("-")), None, true), SourceKind::Stdin);
        assert_eq!(
            select_source(None, Some("main...HEAD"), true),
            SourceKind::GitDiff("main...HEAD".to_string())
        );
    }

    #[test]
    fn test_select_source_uses_github_context() {
        // `--comment` alone builds a GitHub context; the PR files must come
        // from it, not from an empty stdin.
        assert_eq!(select_source(None, None, true), SourceKind::GitHub);
        assert_eq!(select_source(None, None, false), SourceKind::Stdin);
    }

    #[test]
    fn test_cmd_prefix() {
        let snap = snapshot(&[
            (TOTAL_KEY, 50.0),
            ("/x/y/z/a", 1.0),
            ("/x/y/z/b/c/d", 1.0),
            ("/x/y/z/b/c/d/e/f", 1.0),
            ("/x/y/z/m/n/o/p/q/r", 1.0),
        ]);

        let out = cmd_prefix(&snap, files(&["/a", "/b/c/d", "/b/c/d/e/f"]), None).unwrap();

        assert!(out.contains("Prefix:     \"/x/y/z\""));
        assert!(out.contains("Matched:    3/3 changed files"));
        assert!(out.contains("/x/y/z/b/c/d/e/f"));
        assert!(!out.contains("/m/n/o"));
    }
}

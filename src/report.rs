//! Classification of a [`DiffReport`] and rendering of the result.
//!
//! Files are split into changed and unchanged by their rounded deltas, the
//! worst per-file drop beyond the configured threshold is picked out, and
//! everything is turned into display strings ([`TemplateVars`]) before a
//! [`ReportFormatter`] lays it out as text or markdown.

use std::fmt::Write;

use serde::Serialize;

use crate::config::ReportConfig;
use crate::error::Result;
use crate::format::{count_to_string, decimal_to_string, round_one_decimal};
use crate::model::{CoverageDiff, DiffReport, DiffSummary, FileDiff, MetricKind};
use crate::paths::PathPrefix;

/// Hidden marker used to find our comment on a pull request.
pub const PR_IDENTIFIER: &str = "<!-- covdelta-output -->";

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Files of a report split by whether their coverage moved.
#[derive(Debug, Default)]
pub struct Classification<'a> {
    pub changed: Vec<&'a FileDiff>,
    pub unchanged: Vec<&'a FileDiff>,
}

/// A file is changed when any metric's diff, rounded to one decimal, is not
/// zero. Rounding first is what keeps a `0.01` wobble out of the report.
#[must_use]
pub fn is_changed(summary: &DiffSummary) -> bool {
    summary.diffs().any(|(_, diff)| round_one_decimal(diff) != 0.0)
}

/// Partition every non-aggregate entry, keeping report order in each bucket.
#[must_use]
pub fn classify(report: &DiffReport) -> Classification<'_> {
    let (changed, unchanged): (Vec<_>, Vec<_>) =
        report.files.iter().partition(|f| is_changed(&f.summary));
    Classification { changed, unchanged }
}

/// The largest per-file drop that exceeds `fail_delta`, formatted without
/// its sign. `None` when no file dropped by more than `fail_delta` in any
/// metric.
pub fn worst_failure_percent(report: &DiffReport, fail_delta: f64) -> Result<Option<String>> {
    let worst = report
        .files
        .iter()
        .flat_map(|f| f.summary.diffs())
        .map(|(_, diff)| diff)
        .filter(|&diff| diff < 0.0 && -diff > fail_delta)
        .min_by(|a, b| a.total_cmp(b));

    worst.map(|diff| decimal_to_string(diff.abs())).transpose()
}

// ---------------------------------------------------------------------------
// Template variables
// ---------------------------------------------------------------------------

/// Display strings for one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricVars {
    pub percent: String,
    pub diff: String,
}

impl MetricVars {
    fn from_diff(diff: &CoverageDiff) -> Result<Self> {
        Ok(Self {
            percent: decimal_to_string(diff.percent)?,
            diff: decimal_to_string(diff.diff)?,
        })
    }
}

/// Display strings for all four metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSet {
    pub lines: MetricVars,
    pub statements: MetricVars,
    pub functions: MetricVars,
    pub branches: MetricVars,
}

impl MetricSet {
    fn from_summary(summary: &DiffSummary) -> Result<Self> {
        Ok(Self {
            lines: MetricVars::from_diff(&summary.lines)?,
            statements: MetricVars::from_diff(&summary.statements)?,
            functions: MetricVars::from_diff(&summary.functions)?,
            branches: MetricVars::from_diff(&summary.branches)?,
        })
    }

    #[must_use]
    pub fn get(&self, kind: MetricKind) -> &MetricVars {
        match kind {
            MetricKind::Lines => &self.lines,
            MetricKind::Statements => &self.statements,
            MetricKind::Functions => &self.functions,
            MetricKind::Branches => &self.branches,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileVars {
    /// Coverage key the entry came from.
    pub filepath: String,
    /// Path relative to the repository, when the key carried the prefix.
    pub relative_path: String,
    pub is_new_file: bool,
    #[serde(flatten)]
    pub metrics: MetricSet,
}

impl FileVars {
    fn new(file: &FileDiff, prefix: &PathPrefix) -> Result<Self> {
        Ok(Self {
            filepath: file.path.clone(),
            relative_path: prefix.strip(&file.path).unwrap_or(&file.path).to_string(),
            is_new_file: file.summary.is_new_file,
            metrics: MetricSet::from_summary(&file.summary)?,
        })
    }
}

/// Aggregate figures: the line count plus line coverage up front, and all
/// four metrics for the totals table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalVars {
    pub lines: String,
    pub percent: String,
    pub diff: String,
    pub metrics: MetricSet,
}

/// Commit and alignment details the formatters need besides the report.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub sha: Option<String>,
    /// Web URL of the repository, e.g. `https://github.com/owner/repo`.
    pub repo_url: Option<String>,
    /// Prefix of current coverage keys, stripped for display.
    pub prefix: PathPrefix,
}

/// Everything a formatter renders, already converted to display strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateVars {
    pub title: String,
    pub custom_message: String,
    pub commit_sha: Option<String>,
    pub commit_url: Option<String>,
    pub pr_identifier: String,
    pub has_diffs: bool,
    pub coverage_file_failure_percent: Option<String>,
    pub fail_delta: String,
    pub total: TotalVars,
    pub changed: Vec<FileVars>,
    pub unchanged: Vec<FileVars>,
    pub all: Vec<FileVars>,
}

/// Classify the report and convert it into [`TemplateVars`].
pub fn template_vars(
    report: &DiffReport,
    config: &ReportConfig,
    ctx: &RenderContext,
) -> Result<TemplateVars> {
    let classification = classify(report);
    let to_vars = |files: &[&FileDiff]| -> Result<Vec<FileVars>> {
        files.iter().map(|f| FileVars::new(f, &ctx.prefix)).collect()
    };

    let changed = to_vars(&classification.changed)?;
    let unchanged = to_vars(&classification.unchanged)?;
    let all = report
        .files
        .iter()
        .map(|f| FileVars::new(f, &ctx.prefix))
        .collect::<Result<Vec<_>>>()?;

    let total = TotalVars {
        lines: count_to_string(report.total.lines.total),
        percent: decimal_to_string(report.total.lines.percent)?,
        diff: decimal_to_string(report.total.lines.diff)?,
        metrics: MetricSet::from_summary(&report.total)?,
    };

    let commit_url = match (&ctx.repo_url, &ctx.sha) {
        (Some(url), Some(sha)) => Some(format!("{}/commits/{sha}", url.trim_end_matches('/'))),
        _ => None,
    };

    Ok(TemplateVars {
        title: config.title.clone(),
        custom_message: config.custom_message.clone(),
        commit_sha: ctx.sha.clone(),
        commit_url,
        pr_identifier: PR_IDENTIFIER.to_string(),
        has_diffs: !changed.is_empty(),
        coverage_file_failure_percent: worst_failure_percent(report, config.fail_delta)?,
        fail_delta: decimal_to_string(config.fail_delta)?,
        total,
        changed,
        unchanged,
        all,
    })
}

// ---------------------------------------------------------------------------
// Formatters
// ---------------------------------------------------------------------------

/// Trait for laying out template variables.
pub trait ReportFormatter {
    fn format(&self, vars: &TemplateVars) -> String;
}

/// Prefix a display delta with `+` when it is positive.
fn signed(diff: &str) -> String {
    if diff == "0" || diff.starts_with('-') {
        diff.to_string()
    } else {
        format!("+{diff}")
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

/// Plain text formatter.
pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, vars: &TemplateVars) -> String {
        let mut out = String::new();

        writeln!(out, "{}", vars.title).unwrap();
        writeln!(
            out,
            "Total: {}% of {} lines ({})",
            vars.total.percent,
            vars.total.lines,
            signed(&vars.total.diff)
        )
        .unwrap();
        for kind in MetricKind::ALL {
            let m = vars.total.metrics.get(kind);
            writeln!(out, "  {:<12} {:>6}% ({})", kind.label(), m.percent, signed(&m.diff))
                .unwrap();
        }

        if vars.changed.is_empty() {
            out.push_str("\nNo coverage changes in files touched by this pull request.\n");
        } else {
            out.push_str("\nChanged files:\n");
            for f in &vars.changed {
                let new = if f.is_new_file { " (new)" } else { "" };
                write!(out, "  {}{new}", f.relative_path).unwrap();
                for kind in MetricKind::ALL {
                    let m = f.metrics.get(kind);
                    write!(out, "  {} {}% ({})", kind, m.percent, signed(&m.diff)).unwrap();
                }
                out.push('\n');
            }
        }

        if !vars.unchanged.is_empty() {
            writeln!(out, "\nUnchanged files: {}", vars.unchanged.len()).unwrap();
        }

        if let Some(ref pct) = vars.coverage_file_failure_percent {
            writeln!(
                out,
                "\nFile coverage dropped by {pct}% (allowed: {}%)",
                vars.fail_delta
            )
            .unwrap();
        }

        out
    }
}

/// Markdown formatter for pull request comments.
pub struct MarkdownFormatter;

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, vars: &TemplateVars) -> String {
        let mut md = String::new();

        writeln!(md, "{}", vars.pr_identifier).unwrap();
        writeln!(md, "## {}\n", vars.title).unwrap();

        if let Some(ref pct) = vars.coverage_file_failure_percent {
            writeln!(
                md,
                "> :x: Coverage of a file dropped by **{pct}%**, more than the allowed {}%.\n",
                vars.fail_delta
            )
            .unwrap();
        }

        writeln!(
            md,
            "**{}%** of **{}** lines covered ({})\n",
            vars.total.percent,
            vars.total.lines,
            signed(&vars.total.diff)
        )
        .unwrap();

        md.push_str("| Total | Coverage | Change |\n");
        md.push_str("|:------|---------:|-------:|\n");
        for kind in MetricKind::ALL {
            let m = vars.total.metrics.get(kind);
            writeln!(md, "| {} | {}% | {} |", kind.label(), m.percent, signed(&m.diff)).unwrap();
        }

        if vars.changed.is_empty() {
            md.push_str("\nNo coverage changes in files touched by this pull request.\n");
        } else {
            md.push_str("\n### Changed files\n\n");
            md.push_str("| File | Lines | Statements | Functions | Branches |\n");
            md.push_str("|:-----|------:|-----------:|----------:|---------:|\n");
            for f in &vars.changed {
                let new = if f.is_new_file { " :new:" } else { "" };
                write!(md, "| `{}`{new} |", f.relative_path).unwrap();
                for kind in MetricKind::ALL {
                    let m = f.metrics.get(kind);
                    if f.is_new_file {
                        write!(md, " {}% |", m.percent).unwrap();
                    } else {
                        write!(md, " {}% ({}) |", m.percent, signed(&m.diff)).unwrap();
                    }
                }
                md.push('\n');
            }
        }

        if !vars.unchanged.is_empty() {
            writeln!(
                md,
                "\n<details>\n<summary>Unchanged files ({})</summary>\n",
                vars.unchanged.len()
            )
            .unwrap();
            md.push_str("| File | Lines | Statements | Functions | Branches |\n");
            md.push_str("|:-----|------:|-----------:|----------:|---------:|\n");
            for f in &vars.unchanged {
                write!(md, "| `{}` |", f.relative_path).unwrap();
                for kind in MetricKind::ALL {
                    write!(md, " {}% |", f.metrics.get(kind).percent).unwrap();
                }
                md.push('\n');
            }
            md.push_str("\n</details>\n");
        }

        if !vars.custom_message.is_empty() {
            writeln!(md, "\n{}", vars.custom_message).unwrap();
        }

        if let Some(ref sha) = vars.commit_sha {
            let short = short_sha(sha);
            match vars.commit_url {
                Some(ref url) => writeln!(md, "\n<sub>Commit [{short}]({url})</sub>").unwrap(),
                None => writeln!(md, "\n<sub>Commit {short}</sub>").unwrap(),
            }
        }

        md
    }
}

//! Compute per-file and aggregate coverage diffs between a base and a
//! current snapshot.
//!
//! Only files the pull request touched are compared. Membership and the
//! matching base entry are resolved through an [`Alignment`], which carries
//! the changed-file set and one [`PathPrefix`] per snapshot. The two
//! prefixes are discovered independently: the base report may come from a
//! checkout with a different layout.

use tracing::{debug, warn};

use crate::error::{CovdeltaError, Result};
use crate::model::{
    CoverageDiff, CoverageMetric, CoverageSnapshot, DiffReport, DiffSummary, FileDiff, FileMetrics,
};
use crate::paths::{self, ChangedFiles, PathPrefix};

/// How coverage keys of both snapshots map onto the PR's changed files.
#[derive(Debug, Clone, Default)]
pub struct Alignment {
    changed: ChangedFiles,
    current_prefix: PathPrefix,
    base_prefix: PathPrefix,
}

impl Alignment {
    pub fn new(changed: ChangedFiles, current_prefix: PathPrefix, base_prefix: PathPrefix) -> Self {
        Self {
            changed,
            current_prefix,
            base_prefix,
        }
    }

    /// Discover a prefix for each snapshot against the same changed files.
    /// A configured `strip_prefix` is honored for both.
    pub fn discover(
        changed: ChangedFiles,
        current: &CoverageSnapshot,
        base: &CoverageSnapshot,
        strip_prefix: Option<&str>,
    ) -> Self {
        let current_prefix =
            paths::discover_prefix_with_override(&changed, current.keys(), strip_prefix);
        let base_prefix =
            paths::discover_prefix_with_override(&changed, base.keys(), strip_prefix);

        debug!(
            current = %current_prefix,
            base = %base_prefix,
            changed_files = changed.len(),
            "path alignment"
        );
        let alignment = Self::new(changed, current_prefix, base_prefix);
        if alignment.prefixes_diverge() {
            warn!(
                current = %alignment.current_prefix,
                base = %alignment.base_prefix,
                "base and current coverage use different path prefixes"
            );
        }
        alignment
    }

    /// Whether a base prefix was discovered and differs from the current
    /// one. An empty base prefix means nothing aligned (new files only, or
    /// no base report) and is not a divergence.
    #[must_use]
    pub fn prefixes_diverge(&self) -> bool {
        !self.base_prefix.is_empty() && self.current_prefix != self.base_prefix
    }

    #[must_use]
    pub fn changed(&self) -> &ChangedFiles {
        &self.changed
    }

    #[must_use]
    pub fn current_prefix(&self) -> &PathPrefix {
        &self.current_prefix
    }

    #[must_use]
    pub fn base_prefix(&self) -> &PathPrefix {
        &self.base_prefix
    }

    /// Whether a current-snapshot key is one of the PR's changed files.
    #[must_use]
    pub fn is_in_pr(&self, key: &str) -> bool {
        paths::is_in_pr(key, &self.current_prefix, &self.changed)
    }

    /// Find the base entry for a current-snapshot key: first under the
    /// base prefix, then under the identical key.
    fn base_entry<'a>(&self, key: &str, base: &'a CoverageSnapshot) -> Option<&'a FileMetrics> {
        self.current_prefix
            .strip(key)
            .and_then(|rel| base.get(&self.base_prefix.apply(rel)))
            .or_else(|| base.get(key))
    }
}

fn metric_diff(current: &CoverageMetric, base: Option<&CoverageMetric>) -> CoverageDiff {
    CoverageDiff {
        total: current.total,
        percent: current.percent,
        diff: current.percent - base.map_or(0.0, |b| b.percent),
    }
}

/// Diff one entry. A missing base entry marks the file as new and its diff
/// equals the current percentage.
pub fn diff_summary(current: &FileMetrics, base: Option<&FileMetrics>) -> DiffSummary {
    DiffSummary {
        lines: metric_diff(&current.lines, base.map(|b| &b.lines)),
        statements: metric_diff(&current.statements, base.map(|b| &b.statements)),
        functions: metric_diff(&current.functions, base.map(|b| &b.functions)),
        branches: metric_diff(&current.branches, base.map(|b| &b.branches)),
        is_new_file: base.is_none(),
    }
}

/// Build the [`DiffReport`] for every in-PR file of `current`, plus the
/// aggregate entry. The aggregate is taken from each snapshot's own total,
/// never summed from files.
///
/// Fails with [`CovdeltaError::MissingTotal`] when `current` has no
/// aggregate entry.
pub fn compute_diff(
    current: &CoverageSnapshot,
    base: &CoverageSnapshot,
    alignment: &Alignment,
) -> Result<DiffReport> {
    let current_total = current.total().ok_or(CovdeltaError::MissingTotal)?;
    let total = diff_summary(current_total, base.total());

    let files: Vec<FileDiff> = current
        .files()
        .filter(|(key, _)| alignment.is_in_pr(key))
        .map(|(key, metrics)| FileDiff {
            path: key.to_string(),
            summary: diff_summary(metrics, alignment.base_entry(key, base)),
        })
        .collect();

    if files.is_empty() && !alignment.changed().is_empty() {
        warn!(
            changed_files = alignment.changed().len(),
            coverage_files = current.len(),
            "no coverage entries matched the pull request's changed files"
        );
    }

    Ok(DiffReport { total, files })
}

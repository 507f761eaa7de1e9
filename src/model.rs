//! In-memory representation of coverage summaries and of the diff between
//! two of them. Snapshots are produced by [`crate::summary`] and consumed by
//! [`crate::diff`]; a [`DiffReport`] is what the classifier and formatters
//! work from.

use std::collections::HashMap;

use serde::Serialize;

/// Key under which coverage summaries store the aggregate entry.
pub const TOTAL_KEY: &str = "total";

/// The four metric kinds carried by a coverage summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Lines,
    Statements,
    Functions,
    Branches,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Lines,
        MetricKind::Statements,
        MetricKind::Functions,
        MetricKind::Branches,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Lines => "lines",
            MetricKind::Statements => "statements",
            MetricKind::Functions => "functions",
            MetricKind::Branches => "branches",
        }
    }

    /// Capitalized label used in rendered tables.
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Lines => "Lines",
            MetricKind::Statements => "Statements",
            MetricKind::Functions => "Functions",
            MetricKind::Branches => "Branches",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item count and covered percentage for one metric kind.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CoverageMetric {
    pub total: u64,
    /// Percentage in `[0, 100]`.
    pub percent: f64,
}

impl CoverageMetric {
    pub fn new(total: u64, percent: f64) -> Self {
        Self { total, percent }
    }
}

/// All four metrics for a single path (or for the aggregate entry).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FileMetrics {
    pub lines: CoverageMetric,
    pub statements: CoverageMetric,
    pub functions: CoverageMetric,
    pub branches: CoverageMetric,
}

impl FileMetrics {
    /// Same metric for every kind. Handy for building snapshots by hand.
    pub fn uniform(total: u64, percent: f64) -> Self {
        let m = CoverageMetric::new(total, percent);
        Self {
            lines: m,
            statements: m,
            functions: m,
            branches: m,
        }
    }

    #[must_use]
    pub fn get(&self, kind: MetricKind) -> &CoverageMetric {
        match kind {
            MetricKind::Lines => &self.lines,
            MetricKind::Statements => &self.statements,
            MetricKind::Functions => &self.functions,
            MetricKind::Branches => &self.branches,
        }
    }
}

/// A full coverage summary for one commit: per-file metrics in the order
/// they appeared in the source document, plus the aggregate entry.
#[derive(Debug, Clone, Default)]
pub struct CoverageSnapshot {
    total: Option<FileMetrics>,
    files: Vec<(String, FileMetrics)>,
    index: HashMap<String, usize>,
}

impl CoverageSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from `(path, metrics)` pairs. An entry keyed
    /// [`TOTAL_KEY`] becomes the aggregate; a repeated path replaces the
    /// earlier metrics but keeps its original position.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, FileMetrics)>,
    {
        let mut snapshot = Self::new();
        for (path, metrics) in entries {
            snapshot.insert(path, metrics);
        }
        snapshot
    }

    pub fn insert(&mut self, path: String, metrics: FileMetrics) {
        if path == TOTAL_KEY {
            self.total = Some(metrics);
            return;
        }
        match self.index.get(&path) {
            Some(&i) => self.files[i].1 = metrics,
            None => {
                self.index.insert(path.clone(), self.files.len());
                self.files.push((path, metrics));
            }
        }
    }

    /// The aggregate entry, if the summary had one.
    #[must_use]
    pub fn total(&self) -> Option<&FileMetrics> {
        self.total.as_ref()
    }

    /// Metrics for a path. [`TOTAL_KEY`] resolves to the aggregate entry.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileMetrics> {
        if path == TOTAL_KEY {
            return self.total.as_ref();
        }
        self.index.get(path).map(|&i| &self.files[i].1)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// File entries (never the aggregate) in document order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &FileMetrics)> {
        self.files.iter().map(|(p, m)| (p.as_str(), m))
    }

    /// File paths (never the aggregate) in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|(p, _)| p.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.total.is_none()
    }
}

/// Change in one metric between base and current.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageDiff {
    /// Item count in the current snapshot.
    pub total: u64,
    /// Current covered percentage.
    pub percent: f64,
    /// `current - base` in percentage points; unrounded.
    pub diff: f64,
}

/// Per-metric diffs for one path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiffSummary {
    pub lines: CoverageDiff,
    pub statements: CoverageDiff,
    pub functions: CoverageDiff,
    pub branches: CoverageDiff,
    pub is_new_file: bool,
}

impl DiffSummary {
    #[must_use]
    pub fn get(&self, kind: MetricKind) -> &CoverageDiff {
        match kind {
            MetricKind::Lines => &self.lines,
            MetricKind::Statements => &self.statements,
            MetricKind::Functions => &self.functions,
            MetricKind::Branches => &self.branches,
        }
    }

    /// `(kind, diff)` pairs in [`MetricKind::ALL`] order.
    pub fn diffs(&self) -> impl Iterator<Item = (MetricKind, f64)> + '_ {
        MetricKind::ALL.into_iter().map(|k| (k, self.get(k).diff))
    }
}

/// A [`DiffSummary`] together with the coverage path it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileDiff {
    pub path: String,
    #[serde(flatten)]
    pub summary: DiffSummary,
}

/// Result of comparing two snapshots: the aggregate diff and one entry per
/// in-PR file, in current-snapshot order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffReport {
    pub total: DiffSummary,
    pub files: Vec<FileDiff>,
}

impl DiffReport {
    /// Look up a path; [`TOTAL_KEY`] resolves to the aggregate entry.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&DiffSummary> {
        if path == TOTAL_KEY {
            return Some(&self.total);
        }
        self.files
            .iter()
            .find(|f| f.path == path)
            .map(|f| &f.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_total_is_separate() {
        let snapshot = CoverageSnapshot::from_entries(vec![
            ("total".to_string(), FileMetrics::uniform(10, 50.0)),
            ("src/a.js".to_string(), FileMetrics::uniform(4, 25.0)),
        ]);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.total().unwrap().lines.percent, 50.0);
        assert_eq!(snapshot.get("total").unwrap().lines.total, 10);
        assert!(!snapshot.contains("total"));
        assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["src/a.js"]);
    }

    #[test]
    fn test_snapshot_preserves_order_and_replaces_duplicates() {
        let snapshot = CoverageSnapshot::from_entries(vec![
            ("b".to_string(), FileMetrics::uniform(1, 10.0)),
            ("a".to_string(), FileMetrics::uniform(1, 20.0)),
            ("b".to_string(), FileMetrics::uniform(1, 30.0)),
        ]);
        assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(snapshot.get("b").unwrap().branches.percent, 30.0);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = CoverageSnapshot::new();
        assert!(snapshot.is_empty());
        assert!(snapshot.total().is_none());
    }
}

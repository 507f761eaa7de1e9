//! Loader for istanbul `json-summary` reports (`coverage-summary.json`).
//!
//! The format is a JSON object keyed by file path, plus a `"total"` key for
//! the aggregate. Each value contains one object per metric kind:
//!
//! ```json
//! { "lines": { "total": 10, "covered": 8, "skipped": 0, "pct": 80 },
//!   "statements": { ... }, "functions": { ... }, "branches": { ... } }
//! ```
//!
//! Only `total` and `pct` are read; other keys are ignored. Entries keep the
//! order they have in the document.

use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde_json::Value;
use tracing::warn;

use crate::error::{CovdeltaError, Result};
use crate::model::{CoverageMetric, CoverageSnapshot, FileMetrics, MetricKind};

/// Parse a coverage summary from raw bytes.
pub fn parse(input: &[u8]) -> Result<CoverageSnapshot> {
    if input.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(CovdeltaError::Parse("coverage summary is empty".to_string()));
    }

    let mut deser = serde_json::Deserializer::from_slice(input);
    let entries = serde::Deserializer::deserialize_map(&mut deser, OrderedEntries)?;
    deser.end()?;

    let mut snapshot = CoverageSnapshot::new();
    for (path, entry) in entries {
        let metrics = parse_entry(&path, &entry)?;
        snapshot.insert(path, metrics);
    }
    Ok(snapshot)
}

/// Read and parse a coverage summary from disk.
pub fn load(path: &Path) -> Result<CoverageSnapshot> {
    let content = std::fs::read(path)?;
    parse(&content)
}

/// Like [`load`], but a missing file yields an empty snapshot. Used for the
/// base report, which does not exist on the first run against a branch.
pub fn load_optional(path: &Path) -> Result<CoverageSnapshot> {
    match std::fs::read(path) {
        Ok(content) => parse(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "base coverage not found; every file counts as new");
            Ok(CoverageSnapshot::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Collects the top-level object into `(key, value)` pairs without
/// reordering.
struct OrderedEntries;

impl<'de> Visitor<'de> for OrderedEntries {
    type Value = Vec<(String, Value)>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a coverage summary JSON object")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            entries.push((key, value));
        }
        Ok(entries)
    }
}

fn parse_entry(path: &str, entry: &Value) -> Result<FileMetrics> {
    if !entry.is_object() {
        return Err(CovdeltaError::Parse(format!(
            "'{path}': expected an object of metrics"
        )));
    }
    Ok(FileMetrics {
        lines: parse_metric(path, entry, MetricKind::Lines)?,
        statements: parse_metric(path, entry, MetricKind::Statements)?,
        functions: parse_metric(path, entry, MetricKind::Functions)?,
        branches: parse_metric(path, entry, MetricKind::Branches)?,
    })
}

fn parse_metric(path: &str, entry: &Value, kind: MetricKind) -> Result<CoverageMetric> {
    let metric = entry
        .get(kind.as_str())
        .filter(|m| m.is_object())
        .ok_or_else(|| CovdeltaError::Parse(format!("'{path}': missing '{kind}' metrics")))?;

    let total = metric
        .get("total")
        .and_then(Value::as_u64)
        .ok_or_else(|| {
            CovdeltaError::Parse(format!(
                "'{path}': {kind}.total must be a non-negative integer"
            ))
        })?;

    let percent = metric
        .get("pct")
        .and_then(Value::as_f64)
        .ok_or_else(|| CovdeltaError::Parse(format!("'{path}': {kind}.pct must be a number")))?;

    if !percent.is_finite() {
        return Err(CovdeltaError::NonFinite(percent));
    }
    if !(0.0..=100.0).contains(&percent) {
        return Err(CovdeltaError::Parse(format!(
            "'{path}': {kind}.pct {percent} is outside 0-100"
        )));
    }

    Ok(CoverageMetric::new(total, percent))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(total: u64, pct: f64) -> String {
        format!(r#"{{ "total": {total}, "covered": 0, "skipped": 0, "pct": {pct} }}"#)
    }

    fn entry(total: u64, pct: f64) -> String {
        let m = metric(total, pct);
        format!(r#"{{ "lines": {m}, "statements": {m}, "functions": {m}, "branches": {m} }}"#)
    }

    #[test]
    fn test_parse_summary() {
        let input = format!(
            r#"{{ "total": {}, "/src/b.js": {}, "/src/a.js": {} }}"#,
            entry(1234, 82.12),
            entry(10, 50.0),
            entry(4, 100.0)
        );
        let snapshot = parse(input.as_bytes()).unwrap();

        assert_eq!(snapshot.total().unwrap().lines.total, 1234);
        assert_eq!(snapshot.total().unwrap().lines.percent, 82.12);
        assert_eq!(
            snapshot.keys().collect::<Vec<_>>(),
            vec!["/src/b.js", "/src/a.js"]
        );
        assert_eq!(snapshot.get("/src/a.js").unwrap().branches.percent, 100.0);
    }

    #[test]
    fn test_parse_ignores_extra_keys() {
        let m = metric(3, 33.33);
        let input = format!(
            r#"{{ "total": {{ "lines": {m}, "statements": {m}, "functions": {m}, "branches": {m}, "branchesTrue": {m} }} }}"#
        );
        let snapshot = parse(input.as_bytes()).unwrap();
        assert_eq!(snapshot.total().unwrap().functions.total, 3);
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(matches!(parse(b"  \n"), Err(CovdeltaError::Parse(_))));
    }

    #[test]
    fn test_parse_not_an_object() {
        assert!(matches!(parse(b"[1, 2]"), Err(CovdeltaError::Json(_))));
    }

    #[test]
    fn test_parse_missing_metric() {
        let m = metric(1, 100.0);
        let input = format!(r#"{{ "a.js": {{ "lines": {m}, "statements": {m}, "functions": {m} }} }}"#);
        let err = parse(input.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("branches"));
    }

    #[test]
    fn test_parse_non_numeric_pct() {
        let bad = r#"{ "total": 0, "covered": 0, "skipped": 0, "pct": "Unknown" }"#;
        let input = format!(
            r#"{{ "total": {{ "lines": {bad}, "statements": {bad}, "functions": {bad}, "branches": {bad} }} }}"#
        );
        let err = parse(input.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("lines.pct"));
    }

    #[test]
    fn test_parse_pct_out_of_range() {
        let input = format!(r#"{{ "total": {} }}"#, entry(1, 140.0));
        assert!(matches!(
            parse(input.as_bytes()),
            Err(CovdeltaError::Parse(_))
        ));
    }

    #[test]
    fn test_load_optional_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = load_optional(&dir.path().join("nope.json")).unwrap();
        assert!(snapshot.is_empty());
    }
}

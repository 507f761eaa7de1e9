//! Alignment between PR-relative file paths and coverage-report keys.
//!
//! A PR lists files relative to the repository root, while coverage tools
//! usually key entries by absolute path or by a path relative to the
//! directory the test runner ran in. The two namespaces are reconciled by
//! finding a single literal prefix such that `prefix + changed_file` is a
//! coverage key for as many changed files as possible.

use std::collections::HashSet;

use tracing::debug;

/// Number of non-empty `/`-separated segments in a path.
fn depth(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}

/// Stable sort by path depth, shallowest first.
pub fn sort_by_depth(files: &mut [String]) {
    files.sort_by_key(|f| depth(f));
}

/// The files a pull request touched, kept both in depth order (for prefix
/// discovery) and as a set (for membership checks).
#[derive(Debug, Clone, Default)]
pub struct ChangedFiles {
    ordered: Vec<String>,
    set: HashSet<String>,
}

impl ChangedFiles {
    /// Build from the list reported by the source-control host. Duplicates
    /// are dropped (first occurrence wins) before the depth sort.
    pub fn new<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = HashSet::new();
        let mut ordered = Vec::new();
        for f in files {
            let f = f.into();
            if set.insert(f.clone()) {
                ordered.push(f);
            }
        }
        sort_by_depth(&mut ordered);
        Self { ordered, set }
    }

    /// Files in depth-ascending order.
    #[must_use]
    pub fn ordered(&self) -> &[String] {
        &self.ordered
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.set.contains(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

/// Literal prefix that maps changed-file paths onto coverage keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PathPrefix(String);

impl PathPrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The PR-relative path for a coverage key, if the key starts with
    /// this prefix.
    #[must_use]
    pub fn strip<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.0.as_str())
    }

    /// The coverage key a PR-relative path would have under this prefix.
    #[must_use]
    pub fn apply(&self, path: &str) -> String {
        format!("{}{}", self.0, path)
    }
}

impl std::fmt::Display for PathPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// If `key` ends with `file` on a path-segment boundary, the part of `key`
/// in front of it.
fn suffix_candidate<'a>(key: &'a str, file: &str) -> Option<&'a str> {
    if file.is_empty() {
        return None;
    }
    let head = key.strip_suffix(file)?;
    if head.is_empty() || head.ends_with('/') || file.starts_with('/') {
        Some(head)
    } else {
        None
    }
}

/// Number of changed files that resolve to a coverage key under `prefix`.
fn score(prefix: &str, changed: &ChangedFiles, keys: &HashSet<&str>) -> usize {
    changed
        .ordered()
        .iter()
        .filter(|f| keys.contains(format!("{prefix}{f}").as_str()))
        .count()
}

/// Scored search for the prefix that aligns `keys` with `changed`.
///
/// Every coverage key that ends with a changed file (on a segment boundary)
/// proposes the text before the match as a candidate. Candidates are scored
/// by how many changed files they resolve; the highest score wins, then the
/// longer candidate, then the one found first. With no candidate resolving
/// at least one file the prefix is empty.
pub fn discover_prefix<'a, I>(changed: &ChangedFiles, keys: I) -> PathPrefix
where
    I: IntoIterator<Item = &'a str>,
{
    let keys: Vec<&str> = keys.into_iter().collect();
    let key_set: HashSet<&str> = keys.iter().copied().collect();

    let mut candidates: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for file in changed.ordered() {
        for &key in &keys {
            if let Some(candidate) = suffix_candidate(key, file) {
                if seen.insert(candidate) {
                    candidates.push(candidate);
                }
            }
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for candidate in candidates {
        let s = score(candidate, changed, &key_set);
        if s == 0 {
            continue;
        }
        let better = match best {
            None => true,
            Some((b, bs)) => s > bs || (s == bs && candidate.len() > b.len()),
        };
        if better {
            best = Some((candidate, s));
        }
    }

    match best {
        Some((prefix, s)) => {
            debug!(prefix, score = s, "discovered path prefix");
            PathPrefix::new(prefix)
        }
        None => {
            debug!("no path prefix resolves any changed file");
            PathPrefix::default()
        }
    }
}

/// Like [`discover_prefix`], but honoring a configured literal prefix.
///
/// The override is used as-is when it alone aligns every changed file that
/// suffix-matches some key. Otherwise it is removed from the keys that carry
/// it, discovery runs on the remainder, and the result is the override
/// followed by whatever discovery found. Keys that never carry the override
/// (a base report from another checkout) get plain discovery.
pub fn discover_prefix_with_override<'a, I>(
    changed: &ChangedFiles,
    keys: I,
    strip_prefix: Option<&str>,
) -> PathPrefix
where
    I: IntoIterator<Item = &'a str>,
{
    let strip = match strip_prefix {
        Some(s) if !s.is_empty() => s,
        _ => return discover_prefix(changed, keys),
    };

    let keys: Vec<&str> = keys.into_iter().collect();
    let stripped: Vec<&str> = keys
        .iter()
        .copied()
        .filter_map(|k| k.strip_prefix(strip))
        .collect();
    if stripped.is_empty() {
        debug!(prefix = strip, "no coverage key carries the configured prefix");
        return discover_prefix(changed, keys);
    }
    let key_set: HashSet<&str> = stripped.iter().copied().collect();

    let matchable: Vec<&String> = changed
        .ordered()
        .iter()
        .filter(|f| stripped.iter().any(|k| suffix_candidate(k, f).is_some()))
        .collect();
    if !matchable.is_empty() && matchable.iter().all(|f| key_set.contains(f.as_str())) {
        debug!(prefix = strip, "configured prefix aligns all changed files");
        return PathPrefix::new(strip);
    }

    let discovered = discover_prefix(changed, stripped);
    PathPrefix::new(format!("{strip}{discovered}"))
}

/// Whether a coverage key belongs to one of the PR's changed files: the key
/// must start with `prefix` and the remainder must be a changed file
/// verbatim.
#[must_use]
pub fn is_in_pr(key: &str, prefix: &PathPrefix, changed: &ChangedFiles) -> bool {
    prefix.strip(key).is_some_and(|rest| changed.contains(rest))
}

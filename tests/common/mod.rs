use std::path::{Path, PathBuf};

use covdelta::model::CoverageSnapshot;
use tempfile::TempDir;

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn load_fixture(name: &str) -> CoverageSnapshot {
    covdelta::summary::load(&fixture(name)).unwrap()
}

pub fn changed_files() -> Vec<String> {
    let text = std::fs::read_to_string(fixture("changed-files.txt")).unwrap();
    covdelta::files::parse_file_list(&text)
}

/// Write `content` to a file in a fresh temporary directory. The caller must
/// hold onto `TempDir` to keep the file alive.
pub fn write_temp(name: &str, content: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    (dir, path)
}

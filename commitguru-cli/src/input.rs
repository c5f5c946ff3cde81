//! Loading thresholds and commit streams from JSON files.

use std::path::Path;

use commitguru_core::{Commit, ThresholdTable};
use serde_json::{Map, Value};

use crate::CliResult;

/// Abstraction over input access for testability.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait InputSource {
    /// Read an input file into a string.
    fn read_to_string(&self, path: &Path) -> CliResult<String>;
}

/// Input source backed by `std::fs`.
#[derive(Debug, Default, Clone)]
pub(crate) struct StdInputSource;

impl InputSource for StdInputSource {
    fn read_to_string(&self, path: &Path) -> CliResult<String> {
        Ok(std::fs::read_to_string(path)?)
    }
}

/// Load a flat `<name>nonbuggy` / `<name>buggy` JSON object.
pub(crate) fn load_thresholds<S: InputSource + ?Sized>(
    source: &S,
    path: &Path,
) -> CliResult<ThresholdTable> {
    let contents = source.read_to_string(path)?;
    let config: Map<String, Value> = serde_json::from_str(&contents)
        .map_err(|err| format!("invalid thresholds in {}: {err}", path.display()))?;
    let table = ThresholdTable::from_config(&config)?;
    if table.is_empty() {
        log::warn!("{} does not configure any metrics", path.display());
    }
    Ok(table)
}

/// Load a JSON array of commit records.
pub(crate) fn load_commits<S: InputSource + ?Sized>(
    source: &S,
    path: &Path,
) -> CliResult<Vec<Commit>> {
    let contents = source.read_to_string(path)?;
    let commits: Vec<Commit> = serde_json::from_str(&contents)
        .map_err(|err| format!("invalid commits in {}: {err}", path.display()))?;
    Ok(commits)
}

#[cfg(test)]
mod tests {
    use super::{InputSource, MockInputSource, StdInputSource, load_commits, load_thresholds};
    use std::path::{Path, PathBuf};

    #[test]
    fn loads_thresholds_from_source() {
        let mut source = MockInputSource::new();
        source
            .expect_read_to_string()
            .withf(|path| path == Path::new("thresholds.json"))
            .returning(|_| Ok(r#"{"lanonbuggy": 2, "labuggy": 8, "id": 7}"#.to_string()));

        let table = load_thresholds(&source, Path::new("thresholds.json")).expect("thresholds");

        assert_eq!(table.len(), 1);
        assert!(table.recognizes("la"));
    }

    #[test]
    fn rejects_thresholds_that_are_not_an_object() {
        let mut source = MockInputSource::new();
        source
            .expect_read_to_string()
            .returning(|_| Ok("[1, 2]".to_string()));

        let error = load_thresholds(&source, Path::new("thresholds.json")).expect_err("invalid");
        assert!(error.to_string().contains("invalid thresholds in thresholds.json"));
    }

    #[test]
    fn surfaces_threshold_configuration_errors() {
        let mut source = MockInputSource::new();
        source
            .expect_read_to_string()
            .returning(|_| Ok(r#"{"lanonbuggy": 2}"#.to_string()));

        let error = load_thresholds(&source, Path::new("thresholds.json")).expect_err("missing");
        assert_eq!(error.to_string(), "metric `la` is missing bound `labuggy`");
    }

    #[test]
    fn loads_commit_records() {
        let mut source = MockInputSource::new();
        source.expect_read_to_string().returning(|_| {
            Ok(r#"[{"commit_hash": "a1", "la": 3}, {"commit_hash": "b2", "la": "9"}]"#.to_string())
        });

        let commits = load_commits(&source, Path::new("repo.json")).expect("commits");

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[1]["commit_hash"], "b2");
    }

    #[test]
    fn propagates_read_failures() {
        let mut source = MockInputSource::new();
        source
            .expect_read_to_string()
            .returning(|_| Err("boom".into()));

        let error = load_commits(&source, Path::new("repo.json")).expect_err("read fails");
        assert_eq!(error.to_string(), "boom");
    }

    #[test]
    fn std_source_reads_files() {
        let root = std::env::temp_dir().join(unique_dir_name());
        std::fs::create_dir_all(&root).expect("create temp dir");
        let file_path = root.join("commits.json");
        std::fs::write(&file_path, "[]").expect("write test file");

        let contents = StdInputSource.read_to_string(&file_path).expect("read file");
        assert_eq!(contents, "[]");

        std::fs::remove_dir_all(&root).expect("cleanup temp dir");
    }

    fn unique_dir_name() -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        PathBuf::from(format!("commitguru_input_test_{nanos}"))
    }
}

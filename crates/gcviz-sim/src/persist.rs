//! Result artifacts.
//!
//! Each collector result is written as pretty JSON to
//! `<dir>/<rc|ms>_<scenario>_<YYYYmmdd_HHMMSS_ffffff>.json`, stamped in UTC. Writes go to a
//! temp file first and are renamed into place. Persistence is best effort:
//! callers log failures and carry on.

use crate::error::PersistenceError;
use crate::model::CollectorRunResult;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, warn};

/// Writes collector results to a directory
#[derive(Debug, Clone)]
pub struct ResultPersister {
    dir: PathBuf,
}

impl ResultPersister {
    /// Create a persister, creating `dir` if possible.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        match std::fs::create_dir_all(&dir) {
            Ok(()) => info!("Result artifacts directory: {}", dir.display()),
            Err(e) => warn!("Cannot create artifacts directory {}: {}", dir.display(), e),
        }
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a result written at `timestamp`, without collision
    /// handling.
    pub fn artifact_name(result: &CollectorRunResult, timestamp: &DateTime<Utc>) -> String {
        format!(
            "{}_{}_{}.json",
            result.algorithm.file_prefix(),
            sanitize(&result.scenario),
            timestamp.format("%Y%m%d_%H%M%S_%6f")
        )
    }

    /// Write one result. Returns the path written.
    pub async fn persist(
        &self,
        result: &CollectorRunResult,
        timestamp: &DateTime<Utc>,
    ) -> Result<PathBuf, PersistenceError> {
        fs::create_dir_all(&self.dir).await?;

        let json = serde_json::to_string_pretty(result)?;
        let path = self.free_path(&Self::artifact_name(result, timestamp)).await?;
        let temp_path = path.with_extension("json.tmp");

        fs::write(&temp_path, json.as_bytes()).await?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        info!("{} JSON saved: {}", result.algorithm, path.display());
        Ok(path)
    }

    /// Write both results of a run under one timestamp. Failures are
    /// logged and skipped.
    pub async fn persist_all(
        &self,
        results: &[&CollectorRunResult],
        timestamp: &DateTime<Utc>,
    ) -> Vec<PathBuf> {
        let mut written = Vec::with_capacity(results.len());
        for result in results {
            match self.persist(result, timestamp).await {
                Ok(path) => written.push(path),
                Err(e) => error!("Failed to save {} JSON: {}", result.algorithm, e),
            }
        }
        written
    }

    /// `name`, or `name` with a `_N` suffix if that file already exists.
    async fn free_path(&self, name: &str) -> Result<PathBuf, PersistenceError> {
        let candidate = self.dir.join(name);
        if !fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        let stem = name.trim_end_matches(".json");
        let mut n = 1u32;
        loop {
            let candidate = self.dir.join(format!("{}_{}.json", stem, n));
            if !fs::try_exists(&candidate).await? {
                debug!("Artifact name collision, using {}", candidate.display());
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

/// Keep scenario ids usable as a file name component.
fn sanitize(scenario: &str) -> String {
    let cleaned: String = scenario
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "unknown".to_string() } else { cleaned }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Algorithm;
    use chrono::TimeZone;

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_artifact_name() {
        let result = CollectorRunResult::failure(Algorithm::ReferenceCounting, "cycle_leak", "x");
        assert_eq!(
            ResultPersister::artifact_name(&result, &stamp()),
            "rc_cycle_leak_20240309_140507_000000.json"
        );

        let sneaky = CollectorRunResult::failure(Algorithm::MarkSweep, "../etc/passwd", "x");
        let name = ResultPersister::artifact_name(&sneaky, &stamp());
        assert!(name.starts_with("ms_"));
        assert!(!name.contains('/'));
    }

    #[test]
    fn test_sanitize_empty() {
        assert_eq!(sanitize(""), "unknown");
        assert_eq!(sanitize("cascade-delete_2"), "cascade-delete_2");
    }

    #[tokio::test]
    async fn test_persist_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let persister = ResultPersister::new(dir.path().join("logs"));
        let result = CollectorRunResult::failure(Algorithm::MarkSweep, "basic", "Timeout");

        let path = persister.persist(&result, &stamp()).await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let back: CollectorRunResult = serde_json::from_str(&content).unwrap();
        assert_eq!(back, result);
    }

    #[tokio::test]
    async fn test_same_timestamp_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let persister = ResultPersister::new(dir.path());
        let result = CollectorRunResult::failure(Algorithm::MarkSweep, "basic", "x");

        let first = persister.persist(&result, &stamp()).await.unwrap();
        let second = persister.persist(&result, &stamp()).await.unwrap();
        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());
    }

    #[tokio::test]
    async fn test_persist_all_swallows_failures() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the directory should be makes every write fail
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, "").unwrap();
        let persister = ResultPersister::new(&blocked);

        let rc = CollectorRunResult::failure(Algorithm::ReferenceCounting, "basic", "x");
        let ms = CollectorRunResult::failure(Algorithm::MarkSweep, "basic", "x");
        let written = persister.persist_all(&[&rc, &ms], &stamp()).await;
        assert!(written.is_empty());
    }
}

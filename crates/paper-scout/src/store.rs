//! Per-run working files.
//!
//! Each executed source's raw records are written to
//! `<work_dir>/<group>/<YYYY-MM-DD>_<source>.json` and read back within the
//! same run. Files from earlier dates are removed after the run.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::StoreError;
use crate::models::{PaperRecord, Source};

/// Working directory for intermediate artifacts.
#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io { path: path.to_path_buf(), source }
}

impl WorkDir {
    /// Use `root` as the working directory. Nothing is created until a save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one group's artifacts.
    #[must_use]
    pub fn group_dir(&self, group: &str) -> PathBuf {
        self.root.join(group)
    }

    /// Artifact path for one source on one date.
    #[must_use]
    pub fn artifact_path(&self, group: &str, date: NaiveDate, source: Source) -> PathBuf {
        self.group_dir(group).join(format!("{date}_{}.json", source.as_str()))
    }

    /// Write a source's records, replacing any earlier artifact.
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be written.
    pub async fn save(
        &self,
        group: &str,
        date: NaiveDate,
        source: Source,
        records: &[PaperRecord],
    ) -> Result<PathBuf, StoreError> {
        let dir = self.group_dir(group);
        tokio::fs::create_dir_all(&dir).await.map_err(io_error(&dir))?;

        let path = self.artifact_path(group, date, source);
        let body = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&path, body).await.map_err(io_error(&path))?;
        tracing::debug!(path = %path.display(), count = records.len(), "saved artifact");
        Ok(path)
    }

    /// Read a source's records back.
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or not a record array.
    pub async fn load(
        &self,
        group: &str,
        date: NaiveDate,
        source: Source,
    ) -> Result<Vec<PaperRecord>, StoreError> {
        let path = self.artifact_path(group, date, source);
        let body = tokio::fs::read(&path).await.map_err(io_error(&path))?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Delete artifacts dated before `today`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns error if the group directory cannot be listed or a file cannot be removed.
    pub async fn cleanup_stale(&self, group: &str, today: NaiveDate) -> Result<usize, StoreError> {
        let dir = self.group_dir(group);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(io_error(&dir)(e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await.map_err(io_error(&dir))? {
            let path = entry.path();
            let stale = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(artifact_date)
                .is_some_and(|date| date < today);
            if stale {
                tokio::fs::remove_file(&path).await.map_err(io_error(&path))?;
                tracing::debug!(path = %path.display(), "removed stale artifact");
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Date prefix of an artifact file name (`2024-10-15_pubmed.json`).
fn artifact_date(name: &str) -> Option<NaiveDate> {
    let (date, rest) = name.split_once('_')?;
    if !rest.ends_with(".json") {
        return None;
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, d).unwrap()
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = WorkDir::new(tmp.path());
        let records = vec![PaperRecord::new("T", Source::PubMed, day(15)).with_keywords(["k"])];

        let path = store.save("blood", day(15), Source::PubMed, &records).await.unwrap();
        assert!(path.ends_with("blood/2024-10-15_pubmed.json"));
        assert_eq!(store.load("blood", day(15), Source::PubMed).await.unwrap(), records);
    }

    #[tokio::test]
    async fn test_load_missing_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = WorkDir::new(tmp.path());
        assert!(matches!(store.load("g", day(15), Source::ArXiv).await, Err(StoreError::Io { .. })));
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_older_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let store = WorkDir::new(tmp.path());
        store.save("g", day(14), Source::PubMed, &[]).await.unwrap();
        store.save("g", day(15), Source::PubMed, &[]).await.unwrap();
        tokio::fs::write(store.group_dir("g").join("notes.txt"), "keep").await.unwrap();

        assert_eq!(store.cleanup_stale("g", day(15)).await.unwrap(), 1);
        assert!(!store.artifact_path("g", day(14), Source::PubMed).exists());
        assert!(store.artifact_path("g", day(15), Source::PubMed).exists());
        assert_eq!(store.cleanup_stale("missing", day(15)).await.unwrap(), 0);
    }
}

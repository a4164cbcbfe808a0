//! Text Store: the staging directory holding one `<stem>_source.txt` per
//! successfully decoded file.
//!
//! Writes are plain overwrites, so two sources sharing a stem
//! (`report.pdf`, `report.txt`) leave only the later artifact behind.

use crate::error::FichaError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Suffix appended to the source stem for every staged artifact.
pub const SOURCE_SUFFIX: &str = "_source.txt";

/// Handle on the staging directory of one run.
#[derive(Debug, Clone)]
pub struct TextStore {
    dir: PathBuf,
}

fn staging_err(path: &Path) -> impl FnOnce(std::io::Error) -> FichaError + '_ {
    move |source| FichaError::Staging {
        path: path.to_path_buf(),
        source,
    }
}

impl TextStore {
    /// Handle on `<output_dir>/<name>`; touches nothing on disk.
    pub fn at(output_dir: &Path, name: &str) -> Self {
        Self {
            dir: output_dir.join(name),
        }
    }

    /// Create (or reset) `<output_dir>/<name>`.
    pub fn create(output_dir: &Path, name: &str) -> Result<Self, FichaError> {
        let store = Self::at(output_dir, name);
        store.reset()?;
        Ok(store)
    }

    /// Ensure the directory exists and is empty.
    ///
    /// Anything left from an interrupted earlier run is removed first.
    pub fn reset(&self) -> Result<(), FichaError> {
        if self.dir.exists() {
            debug!("Clearing stale staging directory {}", self.dir.display());
            std::fs::remove_dir_all(&self.dir).map_err(staging_err(&self.dir))?;
        }
        std::fs::create_dir_all(&self.dir).map_err(staging_err(&self.dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the artifact for `stem`.
    pub fn artifact_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}{SOURCE_SUFFIX}"))
    }

    /// Write `text` as the artifact for `stem`, overwriting any previous one.
    pub fn write(&self, stem: &str, text: &str) -> Result<PathBuf, FichaError> {
        let path = self.artifact_path(stem);
        std::fs::write(&path, text.as_bytes()).map_err(staging_err(&path))?;
        debug!("Staged {} ({} bytes)", path.display(), text.len());
        Ok(path)
    }

    /// Staged artifacts as `(stem, path)`, in directory-listing order.
    pub fn artifacts(&self) -> Result<Vec<(String, PathBuf)>, FichaError> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(staging_err(&self.dir))? {
            let entry = entry.map_err(staging_err(&self.dir))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = name.strip_suffix(SOURCE_SUFFIX) {
                if entry.path().is_file() {
                    out.push((stem.to_string(), entry.path()));
                }
            }
        }
        Ok(out)
    }

    /// Read an artifact back. Artifacts are always written as UTF-8.
    pub fn read(&self, path: &Path) -> Result<String, FichaError> {
        let bytes = std::fs::read(path).map_err(staging_err(path))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Remove the staging directory. Failures are logged and otherwise ignored.
    pub fn cleanup(&self) {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!("Removed staging directory {}", self.dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove staging directory {}: {}", self.dir.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TextStore::create(tmp.path(), "temp_processed").unwrap();
        let text = "Ação\n\u{FFFD}\tfim\n";
        let path = store.write("paper", text).unwrap();
        assert_eq!(path, tmp.path().join("temp_processed").join("paper_source.txt"));
        assert_eq!(store.read(&path).unwrap(), text);
    }

    #[test]
    fn stem_collision_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TextStore::create(tmp.path(), "stage").unwrap();
        store.write("report", "from pdf").unwrap();
        store.write("report", "from txt").unwrap();
        let artifacts = store.artifacts().unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(store.read(&artifacts[0].1).unwrap(), "from txt");
    }

    #[test]
    fn artifacts_ignore_foreign_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TextStore::create(tmp.path(), "stage").unwrap();
        store.write("a", "x").unwrap();
        std::fs::write(store.dir().join("stray.log"), "noise").unwrap();
        let stems: Vec<String> = store.artifacts().unwrap().into_iter().map(|(s, _)| s).collect();
        assert_eq!(stems, vec!["a"]);
    }

    #[test]
    fn create_clears_stale_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let first = TextStore::create(tmp.path(), "stage").unwrap();
        first.write("old", "stale").unwrap();
        let second = TextStore::create(tmp.path(), "stage").unwrap();
        assert!(second.artifacts().unwrap().is_empty());
    }

    #[test]
    fn cleanup_removes_dir_and_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TextStore::create(tmp.path(), "stage").unwrap();
        store.write("a", "x").unwrap();
        store.cleanup();
        assert!(!store.dir().exists());
        store.cleanup();
    }
}

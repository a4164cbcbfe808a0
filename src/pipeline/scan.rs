//! Input resolution: validate the run directories and enumerate source files.
//!
//! Kind detection is purely by filename suffix (case-insensitive). Content is
//! never sniffed: a mislabelled file simply fails in its decoder and is
//! skipped, which keeps dispatch cheap and predictable.

use crate::config::AggregationMode;
use crate::error::FichaError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Declared document kind of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Pdf,
    Word,
    Text,
    Image,
    Unknown,
}

const IMAGE_SUFFIXES: [&str; 5] = ["jpeg", "jpg", "png", "tif", "tiff"];

impl SourceKind {
    /// Derive the kind from a file name.
    ///
    /// Image suffixes are only recognised in multimodal mode; otherwise they
    /// fall through to `Unknown` and take the text path.
    pub fn from_path(path: &Path, mode: AggregationMode) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => SourceKind::Pdf,
            "doc" | "docx" => SourceKind::Word,
            "txt" => SourceKind::Text,
            e if mode.is_multimodal() && IMAGE_SUFFIXES.contains(&e) => SourceKind::Image,
            _ => SourceKind::Unknown,
        }
    }
}

/// A file found directly under the input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: SourceKind,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, mode: AggregationMode) -> Self {
        let path = path.into();
        let kind = SourceKind::from_path(&path, mode);
        Self { path, kind }
    }

    /// File name as shown in status lines.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// File name without its last extension (`paper.v2.pdf` → `paper.v2`).
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Validate the run directories before anything is started.
///
/// The output directory is created if absent; failure to create it is a
/// validation error.
pub fn validate_dirs(input_dir: &Path, output_dir: &Path) -> Result<(), FichaError> {
    if input_dir.as_os_str().is_empty() || input_dir.to_string_lossy().trim().is_empty() {
        return Err(FichaError::MissingInputDir);
    }
    if output_dir.as_os_str().is_empty() || output_dir.to_string_lossy().trim().is_empty() {
        return Err(FichaError::MissingOutputDir);
    }
    if !input_dir.exists() {
        return Err(FichaError::InputDirNotFound {
            path: input_dir.to_path_buf(),
        });
    }
    if !input_dir.is_dir() {
        return Err(FichaError::InputNotADirectory {
            path: input_dir.to_path_buf(),
        });
    }
    std::fs::create_dir_all(output_dir).map_err(|e| FichaError::OutputDirCreateFailed {
        path: output_dir.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Enumerate regular files directly under `input_dir`, in directory-listing order.
///
/// Sub-directories are ignored (no recursion). The order is whatever the
/// host filesystem returns and is not sorted.
pub async fn scan_directory(
    input_dir: &Path,
    mode: AggregationMode,
) -> Result<Vec<SourceFile>, FichaError> {
    let io_err = |e: std::io::Error| FichaError::InputDirUnreadable {
        path: input_dir.to_path_buf(),
        source: e,
    };

    let mut entries = tokio::fs::read_dir(input_dir).await.map_err(io_err)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        // metadata() follows symlinks, so a link to a regular file counts.
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                let file = SourceFile::new(path, mode);
                debug!("Found {:?} source: {}", file.kind, file.path.display());
                files.push(file);
            }
            Ok(_) => debug!("Ignoring non-file entry: {}", path.display()),
            Err(e) => debug!("Ignoring unreadable entry {}: {}", path.display(), e),
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(name: &str, mode: AggregationMode) -> SourceKind {
        SourceKind::from_path(Path::new(name), mode)
    }

    #[test]
    fn kind_is_case_insensitive() {
        let m = AggregationMode::PerFile;
        assert_eq!(kind("Paper.PDF", m), SourceKind::Pdf);
        assert_eq!(kind("thesis.DocX", m), SourceKind::Word);
        assert_eq!(kind("legacy.doc", m), SourceKind::Word);
        assert_eq!(kind("notes.TXT", m), SourceKind::Text);
        assert_eq!(kind("README", m), SourceKind::Unknown);
        assert_eq!(kind("data.csv", m), SourceKind::Unknown);
    }

    #[test]
    fn images_only_in_multimodal_mode() {
        for name in ["a.jpeg", "a.JPG", "a.png", "a.tif", "a.TIFF"] {
            assert_eq!(kind(name, AggregationMode::Combined), SourceKind::Image, "{name}");
            assert_eq!(kind(name, AggregationMode::PerFile), SourceKind::Unknown, "{name}");
        }
    }

    #[test]
    fn stem_drops_only_last_extension() {
        let f = SourceFile::new("/in/paper.v2.pdf", AggregationMode::PerFile);
        assert_eq!(f.stem(), "paper.v2");
        assert_eq!(f.file_name(), "paper.v2.pdf");
        let dotfile = SourceFile::new("/in/.notes", AggregationMode::PerFile);
        assert_eq!(dotfile.stem(), ".notes");
    }

    #[test]
    fn validate_rejects_blank_and_missing_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("out");
        assert!(matches!(
            validate_dirs(Path::new(""), &out),
            Err(FichaError::MissingInputDir)
        ));
        assert!(matches!(
            validate_dirs(tmp.path(), Path::new("   ")),
            Err(FichaError::MissingOutputDir)
        ));
        assert!(matches!(
            validate_dirs(&tmp.path().join("nope"), &out),
            Err(FichaError::InputDirNotFound { .. })
        ));
    }

    #[test]
    fn validate_rejects_file_as_input_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            validate_dirs(&file, &tmp.path().join("out")),
            Err(FichaError::InputNotADirectory { .. })
        ));
    }

    #[test]
    fn validate_creates_output_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("deep").join("out");
        validate_dirs(tmp.path(), &out).unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn validate_fails_when_output_cannot_be_created() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "file, not dir").unwrap();
        let err = validate_dirs(tmp.path(), &blocker.join("out")).unwrap_err();
        assert!(matches!(err, FichaError::OutputDirCreateFailed { .. }));
    }

    #[tokio::test]
    async fn scan_skips_subdirectories() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.pdf"), b"%PDF").unwrap();
        std::fs::write(tmp.path().join("b.txt"), b"hi").unwrap();
        std::fs::create_dir(tmp.path().join("nested")).unwrap();
        std::fs::write(tmp.path().join("nested").join("c.txt"), b"deep").unwrap();

        let mut files = scan_directory(tmp.path(), AggregationMode::PerFile)
            .await
            .unwrap();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let names: Vec<String> = files.iter().map(SourceFile::file_name).collect();
        assert_eq!(names, vec!["a.pdf", "b.txt"]);
        assert_eq!(files[0].kind, SourceKind::Pdf);
        assert_eq!(files[1].kind, SourceKind::Text);
    }
}

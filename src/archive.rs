//! Persistence of removed bibliography text.
//!
//! Every span the reference stripper deletes is written to
//! `<archive_dir>/<index>.md` so a removal can be audited or undone. Files
//! are keyed by corpus index, so concurrent documents never collide.

use crate::error::CleanError;
use crate::output::RemovedSpan;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes removed spans under one directory.
#[derive(Debug, Clone)]
pub struct RemovalArchiver {
    dir: PathBuf,
}

impl RemovalArchiver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Archive path for `index`.
    pub fn path_for(&self, index: &str) -> PathBuf {
        self.dir.join(format!("{index}.md"))
    }

    /// Write `span` verbatim, replacing any earlier archive for its index.
    pub async fn archive(&self, span: &RemovedSpan) -> Result<PathBuf, CleanError> {
        let path = self.path_for(&span.index);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CleanError::ArchiveWriteFailed {
                path: self.dir.clone(),
                source: e,
            })?;

        write_atomic(&path, &span.text)
            .await
            .map_err(|e| CleanError::ArchiveWriteFailed {
                path: path.clone(),
                source: e,
            })?;

        debug!(
            "Index {}: archived {} bytes ({:?}) to {}",
            span.index,
            span.text.len(),
            span.reason,
            path.display()
        );
        Ok(path)
    }
}

/// Write to `<path>.tmp`, then rename into place.
///
/// A failed write never leaves a truncated file at `path`, and the temp
/// file is removed on either error path.
pub(crate) async fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!("{e}.tmp"))
        .unwrap_or_else(|| "tmp".to_string());
    let tmp_path = path.with_extension(ext);
    let result = match tokio::fs::write(&tmp_path, contents).await {
        Ok(()) => tokio::fs::rename(&tmp_path, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp_path).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RemovalReason;

    #[tokio::test]
    async fn test_archive_writes_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let archiver = RemovalArchiver::new(tmp.path().join("logs/removed_refs"));
        let span = RemovedSpan {
            index: "10019".into(),
            text: "## References\n\n[1] A.\n".into(),
            reason: RemovalReason::TitleMatch,
        };

        let path = archiver.archive(&span).await.unwrap();
        assert_eq!(path, tmp.path().join("logs/removed_refs/10019.md"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), span.text);
        assert!(!path.with_extension("md.tmp").exists());
    }

    #[tokio::test]
    async fn test_archive_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let archiver = RemovalArchiver::new(tmp.path());
        let mut span = RemovedSpan {
            index: "1".into(),
            text: "old\n".into(),
            reason: RemovalReason::HeuristicBlock,
        };
        archiver.archive(&span).await.unwrap();
        span.text = "new\n".into();
        let path = archiver.archive(&span).await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "new\n");
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("5.md");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), "x").unwrap();

        assert!(write_atomic(&target, "body\n").await.is_err());
        assert!(!tmp.path().join("5.md.tmp").exists());
        assert!(target.is_dir());
    }

    #[test]
    fn test_path_for() {
        let archiver = RemovalArchiver::new("logs/removed_refs");
        assert_eq!(
            archiver.path_for("42"),
            PathBuf::from("logs/removed_refs/42.md")
        );
        assert_eq!(archiver.dir(), Path::new("logs/removed_refs"));
    }
}

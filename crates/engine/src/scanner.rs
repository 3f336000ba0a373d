// Local collection scanner: enumerates markdown documents in a vault.

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SubsecRound, Utc};
use thiserror::Error;
use tracing::warn;
use vectorlink_common::path::relative_document_path;
use vectorlink_common::types::LocalDocument;

use crate::config::DOCUMENT_EXTENSION;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("vault root `{0}` is not a directory")]
    NotADirectory(PathBuf),

    #[error("invalid document path `{0}`")]
    InvalidPath(String),
}

impl ScanError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}

/// Source of local documents for a sync run.
pub trait LocalCollection: Send + Sync {
    /// Every document the index should track, sorted by path.
    ///
    /// Called from async code without yielding. The walk blocks the calling
    /// thread, which is acceptable on the CLI's current-thread runtime where
    /// nothing else is scheduled while a run plans.
    fn list_documents(&self) -> Result<Vec<LocalDocument>, ScanError>;

    /// Contents of the document at a normalized vault-relative path.
    fn read_bytes(&self, path: &str) -> impl Future<Output = Result<Vec<u8>, ScanError>> + Send;
}

/// Filesystem-backed collection rooted at a vault directory.
#[derive(Debug, Clone)]
pub struct VaultScanner {
    root: PathBuf,
}

impl VaultScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Walk the vault and collect markdown documents.
    ///
    /// Hidden directories (including `.vectorlink/`) are skipped. Entries
    /// whose path cannot be normalized are logged and left out.
    pub fn scan(&self) -> Result<Vec<LocalDocument>, ScanError> {
        let metadata = fs::metadata(&self.root).map_err(|e| ScanError::io(&self.root, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(self.root.clone()));
        }

        let mut documents = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            for entry in read_entries_sorted(&dir)? {
                let file_type = fs::symlink_metadata(&entry)
                    .map_err(|e| ScanError::io(&entry, e))?
                    .file_type();
                if file_type.is_dir() {
                    if !is_hidden(&entry) {
                        pending.push(entry);
                    }
                    continue;
                }
                if !file_type.is_file() || !is_markdown(&entry) {
                    continue;
                }

                let path = match relative_document_path(&self.root, &entry) {
                    Ok(path) => path,
                    Err(error) => {
                        warn!(path = %entry.display(), error = %error, "skipping document with invalid path");
                        continue;
                    }
                };
                let modified = fs::metadata(&entry)
                    .and_then(|m| m.modified())
                    .map_err(|e| ScanError::io(&entry, e))?;
                documents.push(LocalDocument { path, last_modified: to_millis(modified) });
            }
        }

        documents.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(documents)
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, ScanError> {
        let normalized = vectorlink_common::path::normalize_path(path)
            .map_err(|_| ScanError::InvalidPath(path.to_string()))?;
        Ok(self.root.join(normalized))
    }
}

impl LocalCollection for VaultScanner {
    fn list_documents(&self) -> Result<Vec<LocalDocument>, ScanError> {
        self.scan()
    }

    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>, ScanError> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full).await.map_err(|e| ScanError::io(&full, e))
    }
}

/// Timestamps are compared at millisecond precision on both sides.
pub fn to_millis(time: std::time::SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time).trunc_subsecs(3)
}

fn read_entries_sorted(path: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let mut entries = fs::read_dir(path)
        .map_err(|e| ScanError::io(path, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ScanError::io(path, e))?
        .into_iter()
        .map(|entry| entry.path())
        .collect::<Vec<_>>();
    entries.sort();
    Ok(entries)
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DOCUMENT_EXTENSION))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name().and_then(|name| name.to_str()).is_some_and(|name| name.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn paths(docs: &[LocalDocument]) -> Vec<&str> {
        docs.iter().map(|d| d.path.as_str()).collect()
    }

    #[test]
    fn scan_finds_markdown_recursively_sorted() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.md", "b");
        write(dir.path(), "a.md", "a");
        write(dir.path(), "projects/plan.md", "plan");
        write(dir.path(), "projects/deep/notes.MD", "upper");

        let docs = VaultScanner::new(dir.path()).scan().unwrap();
        assert_eq!(paths(&docs), vec!["a.md", "b.md", "projects/deep/notes.MD", "projects/plan.md"]);
    }

    #[test]
    fn scan_ignores_other_extensions() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "a");
        write(dir.path(), "image.png", "png");
        write(dir.path(), "notes.txt", "txt");
        write(dir.path(), "README", "none");

        let docs = VaultScanner::new(dir.path()).scan().unwrap();
        assert_eq!(paths(&docs), vec!["a.md"]);
    }

    #[test]
    fn scan_skips_hidden_directories() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "a");
        write(dir.path(), ".obsidian/workspace.md", "hidden");
        write(dir.path(), ".vectorlink/notes.md", "state");

        let docs = VaultScanner::new(dir.path()).scan().unwrap();
        assert_eq!(paths(&docs), vec!["a.md"]);
    }

    #[test]
    fn scan_truncates_mtime_to_millis() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "a");

        let docs = VaultScanner::new(dir.path()).scan().unwrap();
        let ts = docs[0].last_modified;
        assert_eq!(ts.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn scan_missing_root_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = VaultScanner::new(dir.path().join("missing")).scan();
        assert!(matches!(result, Err(ScanError::Io { .. })));
    }

    #[test]
    fn scan_file_root_is_rejected() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "a");
        let result = VaultScanner::new(dir.path().join("a.md")).scan();
        assert!(matches!(result, Err(ScanError::NotADirectory(_))));
    }

    #[tokio::test]
    async fn read_bytes_returns_contents() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "projects/plan.md", "# Plan\n");

        let scanner = VaultScanner::new(dir.path());
        let bytes = scanner.read_bytes("projects/plan.md").await.unwrap();
        assert_eq!(bytes, b"# Plan\n");
    }

    #[tokio::test]
    async fn read_bytes_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let scanner = VaultScanner::new(dir.path());
        let result = scanner.read_bytes("../secret.md").await;
        assert!(matches!(result, Err(ScanError::InvalidPath(_))));
    }
}

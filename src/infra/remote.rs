// ============================================================
// Layer 6 — Remote Artifact Store Interface
// ============================================================
// The object store the artifacts live in. The service needs
// exactly two operations from it:
//
//   list_keys      → every object name under the bucket/prefix
//   download_to    → copy one object to a local path
//
// Implementations:
//   S3Remote   (infra::s3, feature "s3")
//   DirRemote  (below) — a plain directory, e.g. a mounted bucket

use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The object does not exist in the store.
    #[error("object '{0}' not found")]
    NotFound(String),

    /// The store could not be reached or answered with a server error.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    /// Anything else (permissions, malformed response, local write).
    #[error("remote store error: {0}")]
    Other(String),
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Human readable location for log lines, e.g. `s3://bucket/prefix`.
    fn location(&self) -> String;

    /// Object names relative to the configured prefix.
    async fn list_keys(&self) -> Result<Vec<String>, RemoteError>;

    /// Write the object `key` to `dest`, overwriting it.
    async fn download_to(&self, key: &str, dest: &Path) -> Result<(), RemoteError>;
}

// ─── DirRemote ────────────────────────────────────────────────────────────────
/// Serves artifacts out of a local or mounted directory.
#[derive(Debug, Clone)]
pub struct DirRemote {
    root: PathBuf,
}

impl DirRemote {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

fn map_io(err: io::Error, key: &str) -> RemoteError {
    match err.kind() {
        io::ErrorKind::NotFound => RemoteError::NotFound(key.to_string()),
        io::ErrorKind::PermissionDenied => RemoteError::Other(err.to_string()),
        _ => RemoteError::Unavailable(err.to_string()),
    }
}

#[async_trait]
impl RemoteStore for DirRemote {
    fn location(&self) -> String {
        format!("dir://{}", self.root.display())
    }

    async fn list_keys(&self) -> Result<Vec<String>, RemoteError> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| RemoteError::Unavailable(format!("{}: {e}", self.root.display())))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?
        {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file {
                if let Some(name) = entry.file_name().to_str() {
                    keys.push(name.to_string());
                }
            }
        }
        Ok(keys)
    }

    async fn download_to(&self, key: &str, dest: &Path) -> Result<(), RemoteError> {
        let src = self.root.join(key);
        tokio::fs::copy(&src, dest).await.map_err(|e| map_io(e, key))?;
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dir_remote_lists_files_only() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("a.zip"), b"a").unwrap();
        std::fs::write(root.path().join("b.txt"), b"b").unwrap();
        std::fs::create_dir(root.path().join("nested.zip")).unwrap();

        let remote = DirRemote::new(root.path());
        let mut keys = remote.list_keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a.zip".to_string(), "b.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_dir_remote_download() {
        let root = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("m.zip"), b"payload").unwrap();

        let remote = DirRemote::new(root.path());
        let dest = out.path().join("m.zip");
        remote.download_to("m.zip", &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");

        let err = remote.download_to("missing.zip", &dest).await.unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_dir_remote_missing_root_is_unavailable() {
        let remote = DirRemote::new("/definitely/not/here");
        assert!(matches!(
            remote.list_keys().await.unwrap_err(),
            RemoteError::Unavailable(_)
        ));
    }
}

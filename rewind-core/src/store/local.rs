/*!
Local directory artifact store adapter.

Artifacts live as plain files under `<root>/<folder>/`; the artifact id is
the folder-relative path and creation timestamps come from file metadata.
*/

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, info};

use super::ArtifactStore;
use crate::artifact::{self, Artifact, UploadReceipt};
use crate::{Result, RewindError};

/// Artifact store backed by a directory tree on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    /// Create a store rooted at the given directory
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn resolve(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }
}

#[async_trait]
impl ArtifactStore for LocalDirStore {
    async fn list(&self, folder: &str, name_prefix: Option<&str>) -> Result<Vec<Artifact>> {
        let dir = self.root.join(folder);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&dir).await?;
        let mut artifacts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(prefix) = name_prefix {
                if !name.starts_with(prefix) {
                    continue;
                }
            }
            // birth time is unsupported on some filesystems
            let created = meta.created().or_else(|_| meta.modified())?;
            artifacts.push(Artifact {
                id: format!("{folder}/{name}"),
                name,
                created_at: DateTime::<Utc>::from(created),
                size_bytes: meta.len(),
            });
        }

        debug!(folder = %dir.display(), count = artifacts.len(), "listed artifacts");
        Ok(artifacts)
    }

    async fn upload(&self, local_path: &Path, folder: &str, name: &str) -> Result<UploadReceipt> {
        let dir = self.root.join(folder);
        fs::create_dir_all(&dir).await?;

        let bytes = fs::read(local_path).await?;
        let dest = dir.join(name);
        fs::write(&dest, &bytes).await.map_err(|e| {
            RewindError::store(format!(
                "failed to write artifact {}: {e}",
                dest.display()
            ))
        })?;

        info!(name = %name, size = bytes.len(), "uploaded artifact");
        Ok(UploadReceipt {
            id: format!("{folder}/{name}"),
            web_view_link: None,
            content_hash: artifact::content_hash(&bytes),
        })
    }

    async fn download(&self, id: &str, dest: &Path) -> Result<()> {
        let src = self.resolve(id);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(&src, dest).await.map_err(|e| {
            RewindError::store(format!("failed to read artifact {}: {e}", src.display()))
        })?;
        debug!(id = %id, dest = %dest.display(), "downloaded artifact");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.resolve(id);
        if path.exists() {
            fs::remove_file(&path).await.map_err(|e| {
                RewindError::store(format!(
                    "failed to delete artifact {}: {e}",
                    path.display()
                ))
            })?;
        }
        info!(id = %id, "deleted artifact");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn seed(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        tokio::fs::write(&path, contents).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_upload_list_download_delete_roundtrip() {
        let root = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let store = LocalDirStore::new(root.path());

        let src = seed(&scratch, "base.json", r#"{"items":[]}"#).await;
        let receipt = store.upload(&src, "backups", "base.json").await.unwrap();
        assert_eq!(receipt.id, "backups/base.json");
        assert_eq!(receipt.content_hash, artifact::content_hash(br#"{"items":[]}"#));

        let listed = store.list("backups", None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "base.json");
        assert_eq!(listed[0].size_bytes, 12);

        let dest = scratch.path().join("fetched.json");
        store.download(&receipt.id, &dest).await.unwrap();
        assert_eq!(
            tokio::fs::read_to_string(&dest).await.unwrap(),
            r#"{"items":[]}"#
        );

        store.delete(&receipt.id).await.unwrap();
        assert!(store.list("backups", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_honors_name_prefix() {
        let root = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let store = LocalDirStore::new(root.path());

        let snap = seed(&scratch, "base.json", "{}").await;
        let log = seed(&scratch, "audit_1.jsonl", "").await;
        store.upload(&snap, "backups", "base.json").await.unwrap();
        store.upload(&log, "backups", "audit_1.jsonl").await.unwrap();

        let logs = store.list("backups", Some("audit_")).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].name, "audit_1.jsonl");
    }

    #[tokio::test]
    async fn test_list_missing_folder_is_empty() {
        let root = TempDir::new().unwrap();
        let store = LocalDirStore::new(root.path());
        assert!(store.list("nowhere", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_missing_artifact_fails() {
        let root = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let store = LocalDirStore::new(root.path());

        let result = store
            .download("backups/ghost.json", &scratch.path().join("out"))
            .await;
        assert!(matches!(result, Err(RewindError::Store(_))));
    }
}

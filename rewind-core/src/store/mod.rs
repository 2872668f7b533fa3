/*!
Artifact store port and adapters.

This module defines the storage abstraction (port) over the external
object store holding backup artifacts, and its concrete adapters. The
recovery engine works against the port and never sees backend details.
*/

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use std::path::Path;

use async_trait::async_trait;

use crate::artifact::{Artifact, UploadReceipt};
use crate::Result;

/// Async interface to the object store holding backup artifacts.
///
/// Calls are awaited in sequence on the recovery path; only retention
/// cleanup is allowed to overlap its own deletions.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// List the artifacts in a folder, optionally filtered by name prefix
    async fn list(&self, folder: &str, name_prefix: Option<&str>) -> Result<Vec<Artifact>>;

    /// Upload a local file into the folder under the given name
    async fn upload(&self, local_path: &Path, folder: &str, name: &str) -> Result<UploadReceipt>;

    /// Stream an artifact's full content to a local file
    async fn download(&self, id: &str, dest: &Path) -> Result<()>;

    /// Delete an artifact
    async fn delete(&self, id: &str) -> Result<()>;
}

pub use local::LocalDirStore;
#[cfg(feature = "s3")]
pub use s3::S3ArtifactStore;

/// In-memory artifact store for testing
///
/// Stores objects with caller-controlled creation timestamps and can mark
/// individual artifacts as inaccessible to exercise fatal paths.
#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use super::ArtifactStore;
    use crate::artifact::{self, Artifact, UploadReceipt};
    use crate::{Result, RewindError};

    struct StoredObject {
        folder: String,
        artifact: Artifact,
        bytes: Vec<u8>,
    }

    #[derive(Default)]
    pub struct MemoryStore {
        objects: Mutex<Vec<StoredObject>>,
        poisoned: Mutex<HashSet<String>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Insert an object with an explicit creation timestamp
        pub fn put(
            &self,
            folder: &str,
            name: &str,
            created_at: DateTime<Utc>,
            bytes: &[u8],
        ) -> String {
            let id = Uuid::new_v4().to_string();
            self.objects.lock().unwrap().push(StoredObject {
                folder: folder.to_string(),
                artifact: Artifact {
                    id: id.clone(),
                    name: name.to_string(),
                    created_at,
                    size_bytes: bytes.len() as u64,
                },
                bytes: bytes.to_vec(),
            });
            id
        }

        /// Make download and delete of the given artifact fail
        pub fn poison(&self, id: &str) {
            self.poisoned.lock().unwrap().insert(id.to_string());
        }

        pub fn contains(&self, id: &str) -> bool {
            self.objects
                .lock()
                .unwrap()
                .iter()
                .any(|o| o.artifact.id == id)
        }
    }

    #[async_trait]
    impl ArtifactStore for MemoryStore {
        async fn list(&self, folder: &str, name_prefix: Option<&str>) -> Result<Vec<Artifact>> {
            Ok(self
                .objects
                .lock()
                .unwrap()
                .iter()
                .filter(|o| o.folder == folder)
                .filter(|o| name_prefix.map_or(true, |p| o.artifact.name.starts_with(p)))
                .map(|o| o.artifact.clone())
                .collect())
        }

        async fn upload(
            &self,
            local_path: &Path,
            folder: &str,
            name: &str,
        ) -> Result<UploadReceipt> {
            let bytes = tokio::fs::read(local_path).await?;
            let content_hash = artifact::content_hash(&bytes);
            let id = self.put(folder, name, Utc::now(), &bytes);
            Ok(UploadReceipt {
                id,
                web_view_link: None,
                content_hash,
            })
        }

        async fn download(&self, id: &str, dest: &Path) -> Result<()> {
            if self.poisoned.lock().unwrap().contains(id) {
                return Err(RewindError::store(format!("artifact {id} is not accessible")));
            }
            let bytes = {
                let objects = self.objects.lock().unwrap();
                objects
                    .iter()
                    .find(|o| o.artifact.id == id)
                    .map(|o| o.bytes.clone())
                    .ok_or_else(|| RewindError::store(format!("artifact {id} not found")))?
            };
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(dest, bytes).await?;
            Ok(())
        }

        async fn delete(&self, id: &str) -> Result<()> {
            if self.poisoned.lock().unwrap().contains(id) {
                return Err(RewindError::store(format!("artifact {id} is not accessible")));
            }
            self.objects
                .lock()
                .unwrap()
                .retain(|o| o.artifact.id != id);
            Ok(())
        }
    }
}

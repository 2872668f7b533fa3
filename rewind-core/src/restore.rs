/*!
Snapshot restore step.

Fetches the selected full-snapshot artifact and bulk-loads it into the
relational store. The orchestrator treats this step as atomic: either the
store matches the snapshot afterwards or the run aborts as fatal. It is
always the first mutating step of a recovery run and is never skipped.
*/

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use rewind_retry::{download_policy, with_backoff};

use crate::artifact::Artifact;
use crate::rows::RowStore;
use crate::store::ArtifactStore;
use crate::RewindError;

/// Failure legs of the restore step.
#[derive(Error, Debug)]
pub enum RestoreError {
    /// The snapshot artifact could not be fetched from the store
    #[error("failed to fetch snapshot: {0}")]
    Fetch(RewindError),

    /// The bulk load into the relational store failed
    #[error("bulk load failed: {0}")]
    Load(RewindError),
}

/// Restores a full snapshot into the relational store.
pub struct SnapshotRestorer<'a, A: ArtifactStore, R: RowStore> {
    store: &'a A,
    rows: &'a R,
    work_dir: &'a Path,
}

impl<'a, A: ArtifactStore, R: RowStore> SnapshotRestorer<'a, A, R> {
    pub fn new(store: &'a A, rows: &'a R, work_dir: &'a Path) -> Self {
        Self {
            store,
            rows,
            work_dir,
        }
    }

    /// Download the snapshot artifact and replace the relational store's
    /// contents with it. Returns the local path of the downloaded snapshot.
    pub async fn restore(&self, snapshot: &Artifact) -> Result<PathBuf, RestoreError> {
        tokio::fs::create_dir_all(self.work_dir)
            .await
            .map_err(|e| RestoreError::Fetch(RewindError::Io(e)))?;

        let dest = self.work_dir.join(&snapshot.name);
        with_backoff("download_snapshot", download_policy(), || {
            self.store.download(&snapshot.id, &dest)
        })
        .await
        .map_err(RestoreError::Fetch)?;

        self.rows.bulk_restore(&dest).map_err(RestoreError::Load)?;

        info!(snapshot = %snapshot.name, "snapshot restored");
        Ok(dest)
    }
}

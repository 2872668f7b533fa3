/*!
# Rewind Core Engine

Backup snapshot selection and incremental change-log recovery.

This crate restores a database to a recent point in time by combining the
most recent full snapshot with the ordered sequence of change-log files
recorded since that snapshot was taken:

- Artifact store port with local-directory and S3 adapters
- Pure snapshot/incremental classification by naming convention
- Bulk snapshot restore into a pluggable relational store
- Idempotent line-by-line replay of change-log files
- A recovery orchestrator with a strict fatal/recoverable error boundary
- Retention-based cleanup of expired artifacts

## Architecture

Domain logic is isolated from infrastructure concerns: the artifact store
and the relational store are ports with pluggable adapters, so the engine
works against any object store and any row-keyed data store.

## Usage

```rust,no_run
use rewind_core::{JsonRowStore, LocalDirStore, RecoveryEngine};

# async fn run() {
let store = LocalDirStore::new("/var/backups");
let rows = JsonRowStore::new().with_persist_path("state.json");
let engine = RecoveryEngine::new(store, rows, "backups", ".rewind-work");

let report = engine.recover(None).await;
println!("applied {} change-log entries", report.applied);
# }
```
*/

pub mod artifact;
pub mod changelog;
pub mod classify;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod recovery;
pub mod replay;
pub mod restore;
pub mod rows;
pub mod store;

pub use artifact::{Artifact, UploadReceipt, INCREMENTAL_PREFIX};
pub use changelog::{ChangeLogEntry, Operation};
pub use classify::RecoveryPlan;
pub use cleanup::CleanupReport;
pub use config::{StoreBackend, StoreConfig};
pub use error::{Result, RewindError};
pub use recovery::{AbortReason, RecoveryEngine, RecoveryReport, RunOutcome};
pub use replay::{LogReport, ReplayEngine, ReplayError};
pub use restore::{RestoreError, SnapshotRestorer};
pub use rows::json::JsonRowStore;
pub use rows::{RowKey, RowStore, TableError, TableHandle};
#[cfg(feature = "s3")]
pub use store::S3ArtifactStore;
pub use store::{ArtifactStore, LocalDirStore};

/*!
Recovery orchestration.

Sequences classifier, snapshot restore, and incremental replay into one
run: pick the latest full snapshot, bulk-load it, then replay every
incremental log newer than the snapshot, oldest first, one file at a time.
A run always yields a final report, fatal or not, so repeated invocation
is the standard recovery path: a partially applied run leaves the store at
snapshot-plus-some-prefix-of-incrementals, which re-running safely extends
because replay is idempotent.
*/

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

use rewind_retry::{download_policy, with_backoff};

use crate::classify;
use crate::cleanup::{self, CleanupReport};
use crate::replay::{ReplayEngine, ReplayError};
use crate::restore::{RestoreError, SnapshotRestorer};
use crate::rows::RowStore;
use crate::store::ArtifactStore;
use crate::Result;

/// Why a recovery run stopped before completion.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum AbortReason {
    /// No full snapshot exists; nothing was modified
    #[error("no full snapshot available in folder '{folder}'")]
    NoSnapshot { folder: String },

    #[error("failed to list backup artifacts: {message}")]
    List { message: String },

    #[error("failed to fetch snapshot '{name}': {message}")]
    SnapshotFetch { name: String, message: String },

    /// The bulk load failed; the store is in an undefined state and needs
    /// operator intervention
    #[error("restore of snapshot '{name}' failed: {message}")]
    Restore { name: String, message: String },

    #[error("failed to fetch incremental '{name}': {message}")]
    IncrementalFetch { name: String, message: String },

    #[error("failed to read incremental '{name}': {message}")]
    IncrementalRead { name: String, message: String },
}

/// Terminal state of a recovery run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RunOutcome {
    Completed,
    Aborted(AbortReason),
}

/// Aggregate result of one recovery run.
///
/// Produced even when the run aborts, so an operator can see exactly how
/// far it got before deciding to retry.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryReport {
    /// Correlation id for this run's log lines
    pub run_id: String,
    /// Name of the selected snapshot, if one was found
    pub snapshot: Option<String>,
    pub snapshot_restored: bool,
    /// Incremental files fully applied
    pub files_applied: usize,
    /// Incremental files the plan selected
    pub files_total: usize,
    /// Change-log entries applied across all files
    pub applied: u64,
    /// Recoverable errors accumulated across all files
    pub errors: Vec<ReplayError>,
    pub outcome: RunOutcome,
}

impl RecoveryReport {
    fn started(run_id: String) -> Self {
        Self {
            run_id,
            snapshot: None,
            snapshot_restored: false,
            files_applied: 0,
            files_total: 0,
            applied: 0,
            errors: Vec::new(),
            outcome: RunOutcome::Completed,
        }
    }

    fn abort(mut self, reason: AbortReason) -> Self {
        self.outcome = RunOutcome::Aborted(reason);
        self
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.outcome, RunOutcome::Aborted(_))
    }
}

/// Orchestrates recovery runs and retention cleanup over the store ports.
///
/// Recovery is strictly sequential: store calls are awaited one at a time
/// and file N+1 never starts before file N has fully completed, because
/// later files may reference rows mutated by earlier files. Cleanup is
/// serialized against recovery behind the same run lock so it can never
/// delete an artifact a run is about to select.
pub struct RecoveryEngine<A, R>
where
    A: ArtifactStore,
    R: RowStore,
{
    artifacts: A,
    rows: R,
    folder: String,
    work_dir: PathBuf,
    run_lock: Mutex<()>,
}

impl<A, R> RecoveryEngine<A, R>
where
    A: ArtifactStore,
    R: RowStore,
{
    /// Create an engine over the given store adapters.
    ///
    /// `folder` is the backup folder within the artifact store; `work_dir`
    /// is the local scratch directory artifacts are downloaded into.
    pub fn new(
        artifacts: A,
        rows: R,
        folder: impl Into<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            artifacts,
            rows,
            folder: folder.into(),
            work_dir: work_dir.into(),
            run_lock: Mutex::new(()),
        }
    }

    /// Run a full recovery: the latest snapshot, then every newer
    /// incremental in creation order.
    ///
    /// `target_hint` records operator intent in the run log; snapshot
    /// selection always uses the latest full snapshot.
    pub async fn recover(&self, target_hint: Option<DateTime<Utc>>) -> RecoveryReport {
        let _guard = self.run_lock.lock().await;
        let run_id = Uuid::new_v4().to_string();
        let mut report = RecoveryReport::started(run_id.clone());

        info!(run_id = %run_id, folder = %self.folder, "starting recovery run");
        if let Some(target) = target_hint {
            info!(
                run_id = %run_id,
                target = %target,
                "operator requested a point-in-time target; the latest snapshot is always used"
            );
        }

        let artifacts = match self.artifacts.list(&self.folder, None).await {
            Ok(artifacts) => artifacts,
            Err(e) => {
                error!(run_id = %run_id, error = %e, "artifact listing failed");
                return report.abort(AbortReason::List {
                    message: e.to_string(),
                });
            }
        };

        let Some(plan) = classify::plan_recovery(&artifacts) else {
            error!(run_id = %run_id, folder = %self.folder, "no full snapshot found, nothing modified");
            return report.abort(AbortReason::NoSnapshot {
                folder: self.folder.clone(),
            });
        };

        report.snapshot = Some(plan.snapshot.name.clone());
        report.files_total = plan.incrementals.len();
        info!(
            run_id = %run_id,
            snapshot = %plan.snapshot.name,
            incrementals = plan.incrementals.len(),
            "recovery plan selected"
        );

        let restorer = SnapshotRestorer::new(&self.artifacts, &self.rows, &self.work_dir);
        match restorer.restore(&plan.snapshot).await {
            Ok(_) => report.snapshot_restored = true,
            Err(RestoreError::Fetch(e)) => {
                error!(run_id = %run_id, snapshot = %plan.snapshot.name, error = %e, "snapshot fetch failed");
                return report.abort(AbortReason::SnapshotFetch {
                    name: plan.snapshot.name.clone(),
                    message: e.to_string(),
                });
            }
            Err(RestoreError::Load(e)) => {
                error!(
                    run_id = %run_id,
                    snapshot = %plan.snapshot.name,
                    error = %e,
                    "bulk restore failed, store needs operator attention"
                );
                return report.abort(AbortReason::Restore {
                    name: plan.snapshot.name.clone(),
                    message: e.to_string(),
                });
            }
        }

        if plan.incrementals.is_empty() {
            info!(run_id = %run_id, "no incrementals newer than the snapshot, replay skipped");
            return report;
        }

        let replayer = ReplayEngine::new(&self.rows);
        for incremental in &plan.incrementals {
            let dest = self.work_dir.join(&incremental.name);
            let fetched = with_backoff("download_incremental", download_policy(), || {
                self.artifacts.download(&incremental.id, &dest)
            })
            .await;

            if let Err(e) = fetched {
                error!(
                    run_id = %run_id,
                    file = %incremental.name,
                    files_applied = report.files_applied,
                    error = %e,
                    "incremental fetch failed, stopping before this file"
                );
                return report.abort(AbortReason::IncrementalFetch {
                    name: incremental.name.clone(),
                    message: e.to_string(),
                });
            }

            match replayer.apply_log(&dest) {
                Ok(log) => {
                    info!(
                        run_id = %run_id,
                        file = %incremental.name,
                        applied = log.applied,
                        errors = log.errors.len(),
                        "incremental applied"
                    );
                    report.applied += log.applied;
                    report.errors.extend(log.errors);
                    report.files_applied += 1;
                }
                Err(e) => {
                    error!(
                        run_id = %run_id,
                        file = %incremental.name,
                        error = %e,
                        "incremental unreadable after download"
                    );
                    return report.abort(AbortReason::IncrementalRead {
                        name: incremental.name.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            run_id = %run_id,
            files = report.files_applied,
            applied = report.applied,
            errors = report.errors.len(),
            "recovery run completed"
        );
        report
    }

    /// Retention cleanup, serialized against recovery runs.
    pub async fn cleanup(&self, retention_days: i64) -> Result<CleanupReport> {
        let _guard = self.run_lock.lock().await;
        cleanup::prune_expired(&self.artifacts, &self.folder, retention_days).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::json::JsonRowStore;
    use crate::rows::RowKey;
    use crate::store::memory::MemoryStore;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn entry_line(entry_id: &str, row_id: &str, operation: &str, after: serde_json::Value) -> String {
        json!({
            "entryId": entry_id,
            "table": "items",
            "rowId": row_id,
            "operation": operation,
            "before": null,
            "after": after,
            "timestamp": "2024-05-01T10:00:00Z",
        })
        .to_string()
    }

    fn engine_over(
        store: MemoryStore,
        rows: JsonRowStore,
        work_dir: &TempDir,
    ) -> RecoveryEngine<MemoryStore, JsonRowStore> {
        RecoveryEngine::new(store, rows, "backups", work_dir.path().join("work"))
    }

    #[tokio::test]
    async fn test_no_snapshot_aborts_without_modifying_anything() {
        let work = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store.put("backups", "audit_1.jsonl", at(100), b"");

        let rows = JsonRowStore::with_tables(["items"]);
        let engine = engine_over(store, rows.clone(), &work);

        let report = engine.recover(None).await;

        assert!(report.is_fatal());
        assert!(matches!(
            report.outcome,
            RunOutcome::Aborted(AbortReason::NoSnapshot { .. })
        ));
        assert!(report.snapshot.is_none());
        assert!(!report.snapshot_restored);
        assert_eq!(rows.row_count("items"), 0);
    }

    #[tokio::test]
    async fn test_full_run_applies_incrementals_in_order() {
        let work = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store.put(
            "backups",
            "base.json",
            at(100),
            br#"{"items":[{"id":1,"name":"A"}]}"#,
        );
        store.put(
            "backups",
            "audit_1.jsonl",
            at(200),
            entry_line("e1", "1", "UPDATE", json!({"id": 1, "name": "B"})).as_bytes(),
        );
        store.put(
            "backups",
            "audit_2.jsonl",
            at(300),
            entry_line("e2", "1", "DELETE", json!(null)).as_bytes(),
        );
        // older than the snapshot: must not be selected
        store.put(
            "backups",
            "audit_0.jsonl",
            at(50),
            entry_line("e0", "1", "UPDATE", json!({"id": 1, "name": "stale"})).as_bytes(),
        );

        let rows = JsonRowStore::new();
        let engine = engine_over(store, rows.clone(), &work);

        let report = engine.recover(None).await;

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert!(report.snapshot_restored);
        assert_eq!(report.snapshot.as_deref(), Some("base.json"));
        assert_eq!(report.files_total, 2);
        assert_eq!(report.files_applied, 2);
        assert_eq!(report.applied, 2);
        assert!(report.errors.is_empty());
        // UPDATE then DELETE leaves the row absent
        assert!(rows.row("items", &RowKey::Int(1)).is_none());
    }

    #[tokio::test]
    async fn test_zero_incrementals_skips_replay() {
        let work = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store.put(
            "backups",
            "base.json",
            at(100),
            br#"{"items":[{"id":1,"name":"A"}]}"#,
        );

        let rows = JsonRowStore::new();
        let engine = engine_over(store, rows.clone(), &work);

        let report = engine.recover(None).await;

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert!(report.snapshot_restored);
        assert_eq!(report.files_total, 0);
        assert_eq!(report.applied, 0);
        assert_eq!(rows.row("items", &RowKey::Int(1)).unwrap()["name"], "A");
    }

    #[tokio::test]
    async fn test_poisoned_incremental_aborts_reporting_progress() {
        let work = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store.put(
            "backups",
            "base.json",
            at(100),
            br#"{"items":[{"id":1,"name":"A"}]}"#,
        );
        store.put(
            "backups",
            "audit_1.jsonl",
            at(200),
            entry_line("e1", "1", "UPDATE", json!({"id": 1, "name": "B"})).as_bytes(),
        );
        let bad = store.put(
            "backups",
            "audit_2.jsonl",
            at(300),
            entry_line("e2", "1", "DELETE", json!(null)).as_bytes(),
        );
        store.poison(&bad);

        let rows = JsonRowStore::new();
        let engine = engine_over(store, rows.clone(), &work);

        let report = engine.recover(None).await;

        assert!(report.is_fatal());
        assert!(matches!(
            report.outcome,
            RunOutcome::Aborted(AbortReason::IncrementalFetch { ref name, .. }) if name == "audit_2.jsonl"
        ));
        // the first file was fully applied before the abort
        assert_eq!(report.files_applied, 1);
        assert_eq!(report.applied, 1);
        assert_eq!(rows.row("items", &RowKey::Int(1)).unwrap()["name"], "B");
    }

    #[tokio::test]
    async fn test_poisoned_snapshot_aborts_before_replay() {
        let work = TempDir::new().unwrap();
        let store = MemoryStore::new();
        let snap = store.put("backups", "base.json", at(100), br#"{"items":[]}"#);
        store.poison(&snap);

        let rows = JsonRowStore::new();
        let engine = engine_over(store, rows, &work);

        let report = engine.recover(None).await;

        assert!(matches!(
            report.outcome,
            RunOutcome::Aborted(AbortReason::SnapshotFetch { .. })
        ));
        assert!(!report.snapshot_restored);
        assert_eq!(report.files_applied, 0);
    }

    #[tokio::test]
    async fn test_unparseable_snapshot_is_a_restore_abort() {
        let work = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store.put("backups", "base.json", at(100), b"not json");

        let rows = JsonRowStore::new();
        let engine = engine_over(store, rows, &work);

        let report = engine.recover(None).await;

        assert!(matches!(
            report.outcome,
            RunOutcome::Aborted(AbortReason::Restore { .. })
        ));
        assert!(!report.snapshot_restored);
    }

    #[tokio::test]
    async fn test_rerunning_recovery_is_idempotent() {
        let work = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store.put(
            "backups",
            "base.json",
            at(100),
            br#"{"items":[{"id":1,"name":"A"}]}"#,
        );
        store.put(
            "backups",
            "audit_1.jsonl",
            at(200),
            entry_line("e1", "1", "UPDATE", json!({"id": 1, "name": "B"})).as_bytes(),
        );

        let rows = JsonRowStore::new();
        let engine = engine_over(store, rows.clone(), &work);

        let first = engine.recover(None).await;
        let second = engine.recover(None).await;

        assert_eq!(first.outcome, RunOutcome::Completed);
        assert_eq!(second.outcome, RunOutcome::Completed);
        assert_eq!(first.applied, second.applied);
        assert_eq!(rows.row("items", &RowKey::Int(1)).unwrap()["name"], "B");
    }

    #[tokio::test]
    async fn test_cleanup_through_engine_deletes_expired() {
        let work = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store.put("backups", "audit_old.jsonl", Utc::now() - chrono::Duration::days(40), b"");
        store.put("backups", "audit_new.jsonl", Utc::now() - chrono::Duration::days(10), b"");

        let rows = JsonRowStore::new();
        let engine = engine_over(store, rows, &work);

        let report = engine.cleanup(30).await.unwrap();

        assert_eq!(report.deleted_count, 1);
        assert_eq!(report.deleted_names, vec!["audit_old.jsonl".to_string()]);
        assert!(report.errors.is_empty());
    }
}

/*!
Retention-based artifact cleanup.

Deletes backup artifacts older than the retention window. Deletions are
independent of each other: one failure is recorded and the rest proceed.
Cleanup must never overlap a recovery run that is selecting or fetching
artifacts; `RecoveryEngine` serializes the two behind its run lock.
*/

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::store::ArtifactStore;
use crate::Result;

/// Upper bound on in-flight delete calls during one cleanup pass.
const DELETE_CONCURRENCY: usize = 4;

/// Outcome of one retention cleanup pass.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct CleanupReport {
    pub deleted_count: usize,
    /// Names of the deleted artifacts, sorted
    pub deleted_names: Vec<String>,
    /// Per-artifact delete failures, formatted as `name: cause`
    pub errors: Vec<String>,
}

/// Delete artifacts in the folder older than `retention_days`.
pub async fn prune_expired<A: ArtifactStore>(
    store: &A,
    folder: &str,
    retention_days: i64,
) -> Result<CleanupReport> {
    let cutoff = Utc::now() - Duration::days(retention_days);
    prune_older_than(store, folder, cutoff).await
}

/// Delete artifacts in the folder created before `cutoff`.
///
/// Listing failure is fatal for the pass; individual delete failures are
/// recorded in the report and do not block the remaining deletions.
pub async fn prune_older_than<A: ArtifactStore>(
    store: &A,
    folder: &str,
    cutoff: DateTime<Utc>,
) -> Result<CleanupReport> {
    let artifacts = store.list(folder, None).await?;
    let expired: Vec<_> = artifacts
        .into_iter()
        .filter(|a| a.created_at < cutoff)
        .collect();

    info!(
        folder = %folder,
        cutoff = %cutoff,
        expired = expired.len(),
        "pruning expired artifacts"
    );

    let results: Vec<(String, Result<()>)> = stream::iter(expired)
        .map(|artifact| async move {
            let outcome = store.delete(&artifact.id).await;
            (artifact.name, outcome)
        })
        .buffer_unordered(DELETE_CONCURRENCY)
        .collect()
        .await;

    let mut report = CleanupReport::default();
    for (name, outcome) in results {
        match outcome {
            Ok(()) => {
                report.deleted_count += 1;
                report.deleted_names.push(name);
            }
            Err(e) => {
                warn!(name = %name, error = %e, "failed to delete expired artifact");
                report.errors.push(format!("{name}: {e}"));
            }
        }
    }
    report.deleted_names.sort();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_only_artifacts_older_than_cutoff_are_deleted() {
        let store = MemoryStore::new();
        let old = store.put("backups", "audit_old.jsonl", at(100), b"a");
        let new = store.put("backups", "base_new.json", at(900), b"b");

        let report = prune_older_than(&store, "backups", at(500)).await.unwrap();

        assert_eq!(report.deleted_count, 1);
        assert_eq!(report.deleted_names, vec!["audit_old.jsonl".to_string()]);
        assert!(report.errors.is_empty());
        assert!(!store.contains(&old));
        assert!(store.contains(&new));
    }

    #[tokio::test]
    async fn test_retention_window_in_days() {
        let store = MemoryStore::new();
        let forty = store.put(
            "backups",
            "audit_40d.jsonl",
            Utc::now() - Duration::days(40),
            b"a",
        );
        let ten = store.put(
            "backups",
            "audit_10d.jsonl",
            Utc::now() - Duration::days(10),
            b"b",
        );

        let report = prune_expired(&store, "backups", 30).await.unwrap();

        assert_eq!(report.deleted_count, 1);
        assert_eq!(report.deleted_names, vec!["audit_40d.jsonl".to_string()]);
        assert!(!store.contains(&forty));
        assert!(store.contains(&ten));
    }

    #[tokio::test]
    async fn test_one_failed_delete_does_not_block_the_rest() {
        let store = MemoryStore::new();
        let poisoned = store.put("backups", "audit_a.jsonl", at(100), b"a");
        let other = store.put("backups", "audit_b.jsonl", at(100), b"b");
        store.poison(&poisoned);

        let report = prune_older_than(&store, "backups", at(500)).await.unwrap();

        assert_eq!(report.deleted_count, 1);
        assert_eq!(report.deleted_names, vec!["audit_b.jsonl".to_string()]);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("audit_a.jsonl:"));
        assert!(!store.contains(&other));
        assert!(store.contains(&poisoned));
    }

    #[tokio::test]
    async fn test_nothing_expired_is_a_clean_noop() {
        let store = MemoryStore::new();
        store.put("backups", "base.json", at(900), b"a");

        let report = prune_older_than(&store, "backups", at(500)).await.unwrap();

        assert_eq!(report.deleted_count, 0);
        assert!(report.deleted_names.is_empty());
        assert!(report.errors.is_empty());
    }
}

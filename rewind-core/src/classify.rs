/*!
Artifact classification and recovery-plan selection.

Pure selection logic: distinguishes full snapshots from incremental change
logs by naming convention and picks the artifacts one recovery run will
consume. Nothing here touches the store.
*/

use chrono::{DateTime, Utc};

use crate::artifact::Artifact;

/// The artifacts one recovery run will consume.
///
/// `incrementals` is strictly increasing by creation time and every entry
/// is newer than the snapshot. Applying them in any other order can
/// resurrect deleted rows or clobber newer state with older state.
#[derive(Debug, Clone)]
pub struct RecoveryPlan {
    /// The full snapshot that establishes the baseline
    pub snapshot: Artifact,
    /// Change logs to replay after the baseline, oldest first
    pub incrementals: Vec<Artifact>,
}

/// Select the most recent full snapshot, if any exists.
///
/// Artifacts named as incremental logs are never candidates. Two snapshots
/// with the same creation time are resolved in favor of the
/// lexicographically greatest name, so selection does not depend on store
/// return order.
pub fn select_latest_snapshot(artifacts: &[Artifact]) -> Option<&Artifact> {
    artifacts
        .iter()
        .filter(|a| !a.is_incremental())
        .max_by(|a, b| (a.created_at, &a.name).cmp(&(b.created_at, &b.name)))
}

/// Select the incremental logs to replay after the given cutoff.
///
/// Returns only incremental-named artifacts created strictly after
/// `cutoff`, sorted ascending by creation time (oldest first), with
/// creation-time ties ordered by name.
pub fn select_incrementals_since(artifacts: &[Artifact], cutoff: DateTime<Utc>) -> Vec<Artifact> {
    let mut logs: Vec<Artifact> = artifacts
        .iter()
        .filter(|a| a.is_incremental() && a.created_at > cutoff)
        .cloned()
        .collect();
    logs.sort_by(|a, b| (a.created_at, &a.name).cmp(&(b.created_at, &b.name)));
    logs
}

/// Build the plan for one recovery run from a store listing.
///
/// Returns None when the listing holds no full snapshot; the caller
/// decides whether that is fatal.
pub fn plan_recovery(artifacts: &[Artifact]) -> Option<RecoveryPlan> {
    let snapshot = select_latest_snapshot(artifacts)?.clone();
    let incrementals = select_incrementals_since(artifacts, snapshot.created_at);
    Some(RecoveryPlan {
        snapshot,
        incrementals,
    })
}

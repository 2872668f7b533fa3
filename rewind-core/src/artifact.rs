/*!
Backup artifact records and naming conventions.
*/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Filename prefix marking an artifact as an incremental change log.
///
/// Anything without the prefix is treated as a full snapshot.
pub const INCREMENTAL_PREFIX: &str = "audit_";

/// One object in the backup folder of the artifact store.
///
/// Created by the (external) backup producer; read-only to this subsystem
/// except for deletion during retention cleanup.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Artifact {
    /// Store-assigned identifier, opaque to this subsystem
    pub id: String,
    /// Object name; carries the incremental-log prefix for change logs
    pub name: String,
    /// Creation timestamp assigned by the store
    pub created_at: DateTime<Utc>,
    /// Object size in bytes, informational only
    pub size_bytes: u64,
}

impl Artifact {
    /// True if this artifact is an incremental change log by naming convention
    pub fn is_incremental(&self) -> bool {
        is_incremental_name(&self.name)
    }
}

/// True if the given object name follows the incremental-log naming convention
pub fn is_incremental_name(name: &str) -> bool {
    name.starts_with(INCREMENTAL_PREFIX)
}

/// Receipt returned by the artifact store after an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    /// Store-assigned identifier of the new artifact
    pub id: String,
    /// Browser link to the object, for backends that have one
    pub web_view_link: Option<String>,
    /// Hex SHA-256 of the uploaded bytes
    pub content_hash: String,
}

/// Compute the hex SHA-256 hash of the provided data
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

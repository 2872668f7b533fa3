/*!
Relational store ports.

The replay engine and snapshot restorer talk to the live data store
through these traits: a per-table handle for row mutations, plus a
registry lookup and bulk restore on the store itself. Expected row absence
is a typed error variant so callers can tell "already gone" from a real
failure without exception-style control flow.
*/

pub mod json;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::Result;

/// Errors from per-row operations on a table handle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    /// The keyed row does not exist. An expected steady-state outcome
    /// during replay; callers decide whether it matters.
    #[error("row not found")]
    NotFound,

    /// Any other store-side failure
    #[error("{0}")]
    Other(String),
}

/// Primary-key form accepted by the relational store.
///
/// Change-log row ids arrive as strings; all-digit ids address
/// integer-keyed tables, everything else is used as-is.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowKey {
    Int(i64),
    Text(String),
}

impl RowKey {
    /// Normalize a change-log row id into a key
    pub fn normalize(raw: &str) -> Self {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = raw.parse::<i64>() {
                return RowKey::Int(n);
            }
        }
        RowKey::Text(raw.to_string())
    }

    /// Key for a stored row, derived from its `id` field
    pub fn from_id_value(id: &Value) -> Option<Self> {
        match id {
            Value::Number(n) => n.as_i64().map(RowKey::Int),
            Value::String(s) => Some(RowKey::normalize(s)),
            _ => None,
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Int(n) => write!(f, "{n}"),
            RowKey::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Mutating operations on one table of the relational store.
pub trait TableHandle: Send + Sync {
    /// Create the row or overwrite it if it already exists
    fn upsert(&self, key: &RowKey, row: &Value) -> std::result::Result<(), TableError>;

    /// Replace an existing row; `TableError::NotFound` if the key is absent
    fn update(&self, key: &RowKey, row: &Value) -> std::result::Result<(), TableError>;

    /// Remove a row; `TableError::NotFound` if the key is absent
    fn delete(&self, key: &RowKey) -> std::result::Result<(), TableError>;
}

/// The relational data store consumed by recovery.
pub trait RowStore: Send + Sync {
    /// Resolve a table handle by name from the registry; None if unknown
    fn table(&self, name: &str) -> Option<Arc<dyn TableHandle>>;

    /// Replace the store's contents wholesale from a snapshot document
    fn bulk_restore(&self, snapshot_path: &Path) -> Result<()>;
}

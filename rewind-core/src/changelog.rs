/*!
Change-log wire format.

The change-capture producer appends one JSON object per row mutation to
append-only log files. This subsystem only consumes the format; entries
within a file are already in producer append order and are never re-sorted.
*/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mutation verb recorded by the change-capture producer.
///
/// Verbs this subsystem does not recognize deserialize as `Unrecognized`
/// so the replay engine can report them without rejecting the whole line.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(other)]
    Unrecognized,
}

/// One line of a change-log file.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLogEntry {
    /// Producer-assigned identifier; not used for ordering
    pub entry_id: String,
    /// Name of the target table/collection
    pub table: String,
    /// String form of the affected row's primary key
    pub row_id: String,
    pub operation: Operation,
    /// Full row state before the change; null for INSERT
    #[serde(default)]
    pub before: Option<Value>,
    /// Full row state after the change; null for DELETE
    #[serde(default)]
    pub after: Option<Value>,
    /// When the producer captured the mutation
    pub timestamp: DateTime<Utc>,
}

impl ChangeLogEntry {
    /// Parse one log line
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_update_entry() {
        let line = r#"{"entryId":"e42","table":"items","rowId":"7","operation":"UPDATE","before":{"id":7,"name":"old"},"after":{"id":7,"name":"new"},"timestamp":"2024-05-01T10:00:00Z"}"#;

        let entry = ChangeLogEntry::parse(line).unwrap();
        assert_eq!(entry.entry_id, "e42");
        assert_eq!(entry.table, "items");
        assert_eq!(entry.row_id, "7");
        assert_eq!(entry.operation, Operation::Update);
        assert_eq!(entry.before.unwrap()["name"], "old");
        assert_eq!(entry.after.unwrap()["name"], "new");
    }

    #[test]
    fn test_parse_delete_without_after() {
        let line = r#"{"entryId":"e1","table":"items","rowId":"3","operation":"DELETE","before":{"id":3},"timestamp":"2024-05-01T10:00:00Z"}"#;

        let entry = ChangeLogEntry::parse(line).unwrap();
        assert_eq!(entry.operation, Operation::Delete);
        assert!(entry.after.is_none());
    }

    #[test]
    fn test_unknown_verb_is_unrecognized_not_parse_error() {
        let line = r#"{"entryId":"e1","table":"items","rowId":"3","operation":"TRUNCATE","timestamp":"2024-05-01T10:00:00Z"}"#;

        let entry = ChangeLogEntry::parse(line).unwrap();
        assert_eq!(entry.operation, Operation::Unrecognized);
    }

    #[test]
    fn test_malformed_line_is_parse_error() {
        assert!(ChangeLogEntry::parse("not json at all").is_err());
        assert!(ChangeLogEntry::parse(r#"{"table":"items"}"#).is_err());
    }
}

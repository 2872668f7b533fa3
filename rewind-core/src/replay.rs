/*!
Incremental replay engine.

Applies one downloaded change-log file to the relational store, line by
line, in producer order. Each line is handled independently: structural
problems (bad JSON, unknown table, unrecognized operation) are recorded as
recoverable errors and the replay continues, while a row that is already
absent on UPDATE or DELETE is the desired end state and counts as applied.
The engine has no cross-file view, so re-applying an already-applied
prefix must succeed; INSERT is an upsert for that reason.
*/

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, warn};

use crate::changelog::{ChangeLogEntry, Operation};
use crate::rows::{RowKey, RowStore, TableError};
use crate::Result;

/// One recoverable problem encountered while replaying a log file.
///
/// Accumulated for post-hoc audit; never stops a run.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ReplayError {
    pub table: String,
    pub row_id: String,
    pub message: String,
}

impl ReplayError {
    fn structural(message: String) -> Self {
        Self {
            table: "unknown".to_string(),
            row_id: String::new(),
            message,
        }
    }
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.table, self.row_id, self.message)
    }
}

/// Outcome of replaying a single log file.
#[derive(Debug, Default, Clone)]
pub struct LogReport {
    /// Entries that reached dispatch and were applied (or swallowed)
    pub applied: u64,
    /// Recoverable errors, in encounter order
    pub errors: Vec<ReplayError>,
}

/// Replays change-log files against a relational store.
pub struct ReplayEngine<'a, R: RowStore> {
    rows: &'a R,
}

impl<'a, R: RowStore> ReplayEngine<'a, R> {
    pub fn new(rows: &'a R) -> Self {
        Self { rows }
    }

    /// Apply one change-log file.
    ///
    /// Fails only if the file itself cannot be opened or read; individual
    /// lines never abort the replay. Entries are applied in file order,
    /// which is producer append order.
    pub fn apply_log(&self, path: &Path) -> Result<LogReport> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut report = LogReport::default();

        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    report
                        .errors
                        .push(ReplayError::structural(format!("unreadable line: {e}")));
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            self.apply_line(&line, &mut report);
        }

        debug!(
            file = %path.display(),
            applied = report.applied,
            errors = report.errors.len(),
            "log file replayed"
        );
        Ok(report)
    }

    fn apply_line(&self, line: &str, report: &mut LogReport) {
        let entry = match ChangeLogEntry::parse(line) {
            Ok(entry) => entry,
            Err(e) => {
                report
                    .errors
                    .push(ReplayError::structural(format!("malformed log line: {e}")));
                return;
            }
        };

        let Some(table) = self.rows.table(&entry.table) else {
            report.errors.push(ReplayError {
                table: entry.table.clone(),
                row_id: entry.row_id,
                message: format!("unknown table '{}'", entry.table),
            });
            return;
        };

        let key = RowKey::normalize(&entry.row_id);

        let outcome = match entry.operation {
            Operation::Insert => match &entry.after {
                Some(after) => table.upsert(&key, after),
                None => {
                    report.errors.push(ReplayError {
                        table: entry.table,
                        row_id: entry.row_id,
                        message: "INSERT without after payload".to_string(),
                    });
                    return;
                }
            },
            Operation::Update => match &entry.after {
                Some(after) => match table.update(&key, after) {
                    // absent target on UPDATE is a steady-state outcome
                    Err(TableError::NotFound) => Ok(()),
                    other => other,
                },
                None => {
                    report.errors.push(ReplayError {
                        table: entry.table,
                        row_id: entry.row_id,
                        message: "UPDATE without after payload".to_string(),
                    });
                    return;
                }
            },
            Operation::Delete => match table.delete(&key) {
                // already absent is the desired end state
                Err(TableError::NotFound) => Ok(()),
                other => other,
            },
            Operation::Unrecognized => {
                report.errors.push(ReplayError {
                    table: entry.table,
                    row_id: entry.row_id,
                    message: "unrecognized operation".to_string(),
                });
                return;
            }
        };

        match outcome {
            Ok(()) => report.applied += 1,
            Err(e) => {
                warn!(
                    table = %entry.table,
                    row_id = %entry.row_id,
                    error = %e,
                    "row mutation failed"
                );
                report.errors.push(ReplayError {
                    table: entry.table,
                    row_id: entry.row_id,
                    message: e.to_string(),
                });
            }
        }
    }
}

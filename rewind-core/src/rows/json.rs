/*!
JSON-document relational store adapter.

Holds every table as an ordered map of row key to row value, optionally
persisting the whole state to a single JSON document after each mutation.
The snapshot document consumed by `bulk_restore` has the same shape as the
persisted state: one top-level object with an array of row objects per
table, each row keyed by its `id` field.
*/

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};
use tracing::{info, warn};

use super::{RowKey, RowStore, TableError, TableHandle};
use crate::{Result, RewindError};

type Table = BTreeMap<RowKey, Value>;

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, Table>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

fn write_state(state: &State, path: &Path) -> Result<()> {
    let mut doc = Map::new();
    for (name, table) in &state.tables {
        doc.insert(
            name.clone(),
            Value::Array(table.values().cloned().collect()),
        );
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(&Value::Object(doc))?)?;
    Ok(())
}

fn key_for_row(table: &str, row: &Value) -> Result<RowKey> {
    row.get("id")
        .and_then(RowKey::from_id_value)
        .ok_or_else(|| {
            RewindError::invalid_snapshot(format!("row in table '{table}' has no usable id field"))
        })
}

/// Relational store holding rows as JSON documents.
///
/// The table registry is explicit: handles resolve only for tables
/// declared at construction or established by the restored snapshot.
#[derive(Clone)]
pub struct JsonRowStore {
    state: Arc<Mutex<State>>,
    persist_path: Option<PathBuf>,
}

impl JsonRowStore {
    /// Create an empty store with no registered tables
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            persist_path: None,
        }
    }

    /// Create a store with the given tables registered (and empty)
    pub fn with_tables<'a, I>(tables: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let store = Self::new();
        {
            let mut state = lock(&store.state);
            for table in tables {
                state.tables.entry(table.to_string()).or_default();
            }
        }
        store
    }

    /// Persist the whole state to the given file after every mutation
    pub fn with_persist_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.persist_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Look up one row, for inspection and tests
    pub fn row(&self, table: &str, key: &RowKey) -> Option<Value> {
        lock(&self.state)
            .tables
            .get(table)
            .and_then(|t| t.get(key))
            .cloned()
    }

    /// Number of rows currently held by a table (0 if unregistered)
    pub fn row_count(&self, table: &str) -> usize {
        lock(&self.state).tables.get(table).map_or(0, Table::len)
    }

    /// Names of all registered tables
    pub fn table_names(&self) -> Vec<String> {
        lock(&self.state).tables.keys().cloned().collect()
    }

    fn flush(&self, state: &State) -> Result<()> {
        match &self.persist_path {
            Some(path) => write_state(state, path),
            None => Ok(()),
        }
    }
}

impl Default for JsonRowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RowStore for JsonRowStore {
    fn table(&self, name: &str) -> Option<Arc<dyn TableHandle>> {
        if !lock(&self.state).tables.contains_key(name) {
            return None;
        }
        Some(Arc::new(JsonTableHandle {
            table: name.to_string(),
            state: Arc::clone(&self.state),
            persist_path: self.persist_path.clone(),
        }))
    }

    fn bulk_restore(&self, snapshot_path: &Path) -> Result<()> {
        let raw = fs::read_to_string(snapshot_path)?;
        let doc: Value = serde_json::from_str(&raw)?;
        let Value::Object(snapshot_tables) = doc else {
            return Err(RewindError::invalid_snapshot(
                "snapshot root must be an object of tables",
            ));
        };

        let mut state = lock(&self.state);

        // wholesale replacement: the snapshot is the new baseline, declared
        // tables stay registered but empty unless the snapshot fills them
        for table in state.tables.values_mut() {
            table.clear();
        }

        for (name, rows) in snapshot_tables {
            let Value::Array(rows) = rows else {
                return Err(RewindError::invalid_snapshot(format!(
                    "table '{name}' in snapshot is not an array of rows"
                )));
            };
            let table = state.tables.entry(name.clone()).or_default();
            for row in rows {
                let key = key_for_row(&name, &row)?;
                if table.insert(key.clone(), row).is_some() {
                    warn!(table = %name, key = %key, "duplicate row id in snapshot, keeping the later row");
                }
            }
        }

        info!(
            tables = state.tables.len(),
            "bulk restore replaced store contents"
        );
        self.flush(&state)
    }
}

struct JsonTableHandle {
    table: String,
    state: Arc<Mutex<State>>,
    persist_path: Option<PathBuf>,
}

impl JsonTableHandle {
    fn flush(&self, state: &State) -> std::result::Result<(), TableError> {
        if let Some(path) = &self.persist_path {
            write_state(state, path).map_err(|e| TableError::Other(e.to_string()))?;
        }
        Ok(())
    }

    fn with_table<F>(&self, f: F) -> std::result::Result<(), TableError>
    where
        F: FnOnce(&mut Table) -> std::result::Result<(), TableError>,
    {
        let mut state = lock(&self.state);
        let table = state
            .tables
            .get_mut(&self.table)
            .ok_or_else(|| TableError::Other(format!("table '{}' is not registered", self.table)))?;
        f(table)?;
        self.flush(&state)
    }
}

impl TableHandle for JsonTableHandle {
    fn upsert(&self, key: &RowKey, row: &Value) -> std::result::Result<(), TableError> {
        self.with_table(|table| {
            table.insert(key.clone(), row.clone());
            Ok(())
        })
    }

    fn update(&self, key: &RowKey, row: &Value) -> std::result::Result<(), TableError> {
        self.with_table(|table| {
            if !table.contains_key(key) {
                return Err(TableError::NotFound);
            }
            table.insert(key.clone(), row.clone());
            Ok(())
        })
    }

    fn delete(&self, key: &RowKey) -> std::result::Result<(), TableError> {
        self.with_table(|table| match table.remove(key) {
            Some(_) => Ok(()),
            None => Err(TableError::NotFound),
        })
    }
}

// src/persistence/persistor.rs
//! Rotating embedded log of flow units and their summary trees.
//!
//! - One SQLite file per rotation window; one table per graph node (and
//!   per summary kind) encountered in that window.
//! - Every public operation holds the same mutex: the underlying engine
//!   is single-writer, and file-handle swaps during rotation must be
//!   atomic with respect to any in-flight read or write. Write volume is
//!   bounded by evaluation cadence, so serializing here is cheap.
//! - A failed write gets exactly one forced-rotation retry; a second
//!   failure surfaces the original error to the caller.

use rusqlite::types::{Value as DbValue, ValueRef};
use rusqlite::Connection;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use crate::config::StoreConfig;
use crate::graph::flow_unit::FlowUnit;
use crate::graph::summary::{ColumnSpec, SqlValue, Summary};
use crate::persistence::gc::FileGC;
use crate::persistence::response::{RcaResponse, RcaRow, SummaryNode};
use crate::persistence::rotate::FileRotate;
use crate::util::now_millis;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem-level failure (rotation rename, directory creation).
    #[error("store I/O failure")]
    Io(#[from] std::io::Error),
    /// The store cannot open a new file/connection. Fatal: the component
    /// cannot self-heal past a non-writable filesystem.
    #[error("cannot open store file '{path}'")]
    OpenFailed {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    /// A write kept failing after the forced-rotation retry. The graph
    /// keeps running, but this cycle's durability is lost.
    #[error("write to table '{table}' failed after a forced-rotation retry")]
    WriteFailed {
        table: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("store read failed")]
    ReadFailed(#[source] rusqlite::Error),
    #[error("failed to close store connection")]
    CloseFailed(#[source] rusqlite::Error),
}

enum RotationType {
    TryRotate,
    ForceRotate,
}

struct Inner {
    conn: Connection,
    /// Tables known to exist in the current file. Reset on rotation: a
    /// new file starts with no tables.
    table_names: HashSet<String>,
    file_rotate: FileRotate,
    file_gc: FileGC,
    db_protocol: String,
}

pub struct Persistor {
    inner: Mutex<Inner>,
}

impl Persistor {
    /// Open the store under the configured directory: rotate away any
    /// live file left by a previous run, sweep old rotated files into the
    /// retention window, and open a fresh connection.
    pub fn open(cfg: &StoreConfig) -> Result<Self, StoreError> {
        fs::create_dir_all(&cfg.storage_dir)?;

        let retention = cfg.parsed_retention_count();
        let live_path = cfg.storage_dir.join(&cfg.base_filename);
        let now = now_millis();

        let mut file_rotate = FileRotate::new(live_path.clone(), cfg.rotation_period(), now);
        file_rotate.force_rotate(now)?;
        // The sweep picks up the file rotated just above along with
        // anything older.
        let file_gc = FileGC::new(cfg.storage_dir.clone(), &cfg.base_filename, retention)?;

        let conn = open_connection(&cfg.db_protocol, &live_path)?;
        Ok(Self {
            inner: Mutex::new(Inner {
                conn,
                table_names: HashSet::new(),
                file_rotate,
                file_gc,
                db_protocol: cfg.db_protocol.clone(),
            }),
        })
    }

    /// Append one non-empty flow unit (and its summary tree) under the
    /// node's table. Empty units are skipped: they carry no information
    /// and would bloat storage.
    pub fn write(&self, node_name: &str, unit: &FlowUnit) -> Result<(), StoreError> {
        if unit.is_empty() {
            tracing::debug!(node = node_name, "flow unit is empty; nothing to persist");
            return Ok(());
        }

        let mut inner = self.lock();
        rotate_register_garbage_then_reopen(&mut inner, RotationType::TryRotate)?;

        if let Err(first) = try_write_flow_unit(&mut inner, node_name, unit) {
            tracing::info!(
                table = node_name,
                "failed to write flow unit; forcing a new store file and retrying"
            );
            rotate_register_garbage_then_reopen(&mut inner, RotationType::ForceRotate)?;
            if try_write_flow_unit(&mut inner, node_name, unit).is_err() {
                tracing::error!(
                    table = node_name,
                    "multiple attempts to write flow unit failed"
                );
                return Err(StoreError::WriteFailed {
                    table: node_name.to_string(),
                    source: first,
                });
            }
        }
        Ok(())
    }

    /// Serialize every table of the current file: one JSON array of row
    /// objects per table, keyed by table name.
    pub fn read(&self) -> Result<JsonValue, StoreError> {
        let inner = self.lock();
        let mut tables: Vec<String> = inner.table_names.iter().cloned().collect();
        tables.sort();

        let mut out = Map::new();
        for table in tables {
            let rows = read_table_rows(&inner.conn, &table).map_err(StoreError::ReadFailed)?;
            out.insert(table, JsonValue::Array(rows.into_iter().map(JsonValue::Object).collect()));
        }
        Ok(JsonValue::Object(out))
    }

    /// Rows persisted for one graph node in the current file, with each
    /// row's summary tree rebuilt from foreign-key references.
    pub fn read_rca(&self, rca_name: &str) -> Result<RcaResponse, StoreError> {
        let inner = self.lock();
        if !inner.table_names.contains(rca_name) {
            return Ok(RcaResponse {
                rca_name: rca_name.to_string(),
                rows: Vec::new(),
            });
        }

        let mut tables: Vec<String> = inner.table_names.iter().cloned().collect();
        tables.sort();

        let pk = primary_key_column(rca_name);
        let raw_rows = read_table_rows(&inner.conn, rca_name).map_err(StoreError::ReadFailed)?;
        let mut rows = Vec::with_capacity(raw_rows.len());
        for columns in raw_rows {
            let row_id = columns.get(&pk).and_then(JsonValue::as_i64).unwrap_or(0);
            let summaries = collect_summary_children(&inner.conn, &tables, rca_name, row_id)
                .map_err(StoreError::ReadFailed)?;
            rows.push(RcaRow {
                row_id,
                columns,
                summaries,
            });
        }
        Ok(RcaResponse {
            rca_name: rca_name.to_string(),
            rows,
        })
    }

    /// Tables known to exist in the current file, sorted.
    pub fn known_tables(&self) -> Vec<String> {
        let inner = self.lock();
        let mut tables: Vec<String> = inner.table_names.iter().cloned().collect();
        tables.sort();
        tables
    }

    /// Path of the live store file.
    pub fn store_file(&self) -> PathBuf {
        self.lock().file_rotate.live_path().to_path_buf()
    }

    /// Close the connection, consuming the store.
    pub fn close(self) -> Result<(), StoreError> {
        let inner = self
            .inner
            .into_inner()
            .unwrap_or_else(|e| e.into_inner());
        inner
            .conn
            .close()
            .map_err(|(_, source)| StoreError::CloseFailed(source))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------- rotation plumbing ----------

fn rotate_register_garbage_then_reopen(
    inner: &mut Inner,
    rotation: RotationType,
) -> Result<(), StoreError> {
    let now = now_millis();
    let rotated = match rotation {
        RotationType::TryRotate => inner.file_rotate.try_rotate(now)?,
        RotationType::ForceRotate => inner.file_rotate.force_rotate(now)?,
    };

    // A forced rotation reopens even when there was nothing to rename:
    // that is exactly the missing/corrupted-file recovery path.
    let reopen = rotated.is_some() || matches!(rotation, RotationType::ForceRotate);

    if let Some(rotated) = rotated {
        if let Some(name) = rotated.file_name() {
            inner
                .file_gc
                .eligible_for_gc(name.to_string_lossy().into_owned());
        }
    }

    if reopen {
        inner.table_names.clear();
        inner.conn = open_connection(&inner.db_protocol, inner.file_rotate.live_path())?;
    }
    Ok(())
}

fn open_connection(protocol: &str, path: &Path) -> Result<Connection, StoreError> {
    let url = format!("{}{}", protocol, path.display());
    let conn = Connection::open(&url).map_err(|source| StoreError::OpenFailed {
        path: url.clone(),
        source,
    })?;
    tracing::info!(url = %url, "opened store connection");
    Ok(conn)
}

// ---------- write path ----------

fn try_write_flow_unit(
    inner: &mut Inner,
    table: &str,
    unit: &FlowUnit,
) -> rusqlite::Result<()> {
    if !inner.table_names.contains(table) {
        tracing::info!(
            table,
            "table does not exist in the current file; creating it"
        );
        create_table(&inner.conn, table, &FlowUnit::sql_schema(), None)?;
        inner.table_names.insert(table.to_string());
    }
    let row_id = insert_row(&inner.conn, table, &FlowUnit::sql_schema(), &unit.sql_values(), None)?;

    if let Some(summary) = unit.summary() {
        write_summary(inner, summary, table, row_id)?;
    }
    Ok(())
}

/// Recursively persist a summary tree: each node becomes a row in a table
/// named for its kind, carrying a foreign-key column that points at the
/// parent's just-inserted row id.
fn write_summary(
    inner: &mut Inner,
    summary: &Summary,
    reference_table: &str,
    reference_row_id: i64,
) -> rusqlite::Result<()> {
    let table = summary.kind().to_string();
    let fk_column = primary_key_column(reference_table);

    if !inner.table_names.contains(&table) {
        tracing::info!(
            table = %table,
            "summary table does not exist in the current file; creating it"
        );
        create_table(&inner.conn, &table, summary.schema(), Some(fk_column.as_str()))?;
        inner.table_names.insert(table.clone());
    }

    let row_id = insert_row(
        &inner.conn,
        &table,
        summary.schema(),
        summary.values(),
        Some((fk_column.as_str(), reference_row_id)),
    )?;

    for child in summary.children() {
        write_summary(inner, child, &table, row_id)?;
    }
    Ok(())
}

fn primary_key_column(table: &str) -> String {
    format!("{table}_ID")
}

fn create_table(
    conn: &Connection,
    table: &str,
    schema: &[ColumnSpec],
    fk_column: Option<&str>,
) -> rusqlite::Result<()> {
    let mut columns = vec![format!(
        "\"{}\" INTEGER PRIMARY KEY AUTOINCREMENT",
        primary_key_column(table)
    )];
    for spec in schema {
        columns.push(format!("\"{}\" {}", spec.name, spec.column_type.sql_type()));
    }
    if let Some(fk) = fk_column {
        columns.push(format!("\"{fk}\" INTEGER"));
    }
    let sql = format!("CREATE TABLE IF NOT EXISTS \"{table}\" ({})", columns.join(", "));
    conn.execute(&sql, [])?;
    Ok(())
}

fn insert_row(
    conn: &Connection,
    table: &str,
    schema: &[ColumnSpec],
    values: &[SqlValue],
    fk: Option<(&str, i64)>,
) -> rusqlite::Result<i64> {
    let mut columns: Vec<String> = schema.iter().map(|s| format!("\"{}\"", s.name)).collect();
    let mut params: Vec<DbValue> = values.iter().map(db_value).collect();
    if let Some((fk_column, fk_value)) = fk {
        columns.push(format!("\"{fk_column}\""));
        params.push(DbValue::Integer(fk_value));
    }

    let placeholders: Vec<String> = (1..=params.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO \"{table}\" ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );
    conn.execute(&sql, rusqlite::params_from_iter(params))?;
    Ok(conn.last_insert_rowid())
}

fn db_value(value: &SqlValue) -> DbValue {
    match value {
        SqlValue::Text(s) => DbValue::Text(s.clone()),
        SqlValue::Integer(i) => DbValue::Integer(*i),
        SqlValue::Real(f) => DbValue::Real(*f),
    }
}

// ---------- read path ----------

fn read_table_rows(conn: &Connection, table: &str) -> rusqlite::Result<Vec<Map<String, JsonValue>>> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM \"{table}\""))?;
    let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut obj = Map::new();
        for (i, name) in names.iter().enumerate() {
            obj.insert(name.clone(), json_cell(row.get_ref(i)?));
        }
        out.push(obj);
    }
    Ok(out)
}

/// Summary rows referencing `parent_table`/`parent_id`, recursively, in
/// table-name order. A table is a child table of `parent_table` when it
/// carries the `<parent_table>_ID` foreign-key column.
fn collect_summary_children(
    conn: &Connection,
    tables: &[String],
    parent_table: &str,
    parent_id: i64,
) -> rusqlite::Result<Vec<SummaryNode>> {
    let fk_column = primary_key_column(parent_table);
    let mut out = Vec::new();

    for table in tables {
        if table == parent_table {
            continue;
        }
        if !table_columns(conn, table)?.contains(&fk_column) {
            continue;
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM \"{table}\" WHERE \"{fk_column}\" = ?1"
        ))?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let pk = primary_key_column(table);

        let mut rows = stmt.query([parent_id])?;
        let mut found: Vec<(i64, Map<String, JsonValue>)> = Vec::new();
        while let Some(row) = rows.next()? {
            let mut obj = Map::new();
            for (i, name) in names.iter().enumerate() {
                obj.insert(name.clone(), json_cell(row.get_ref(i)?));
            }
            let row_id = obj.get(&pk).and_then(JsonValue::as_i64).unwrap_or(0);
            found.push((row_id, obj));
        }
        drop(rows);

        for (row_id, columns) in found {
            let children = collect_summary_children(conn, tables, table, row_id)?;
            out.push(SummaryNode {
                table: table.clone(),
                row_id,
                columns,
                children,
            });
        }
    }
    Ok(out)
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{table}\")"))?;
    let cols = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(cols)
}

fn json_cell(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(i) => json!(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ValueRef::Text(t) => JsonValue::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => JsonValue::Null,
    }
}

// ---------- failure injection ----------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RotationUnit, StoreConfig};
    use crate::graph::flow_unit::{FlowUnit, HealthContext};

    fn store_config(dir: &Path) -> StoreConfig {
        StoreConfig {
            storage_dir: dir.to_path_buf(),
            base_filename: "analysis.sqlite".to_string(),
            db_protocol: "file:".to_string(),
            rotation_unit: RotationUnit::Hours,
            rotation_period: 1,
            retention_count: "5".to_string(),
        }
    }

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn write_failure_forces_one_rotation_then_retry_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let store = Persistor::open(&store_config(dir.path())).unwrap();
        store
            .write("node_a", &FlowUnit::new(1, HealthContext::Unhealthy))
            .unwrap();
        let files_before = file_count(dir.path());

        // Make the open connection refuse writes, as a corrupted or
        // read-only file would.
        {
            let inner = store.lock();
            inner.conn.execute_batch("PRAGMA query_only = ON;").unwrap();
        }

        store
            .write("node_a", &FlowUnit::new(2, HealthContext::Unhealthy))
            .unwrap();

        // Exactly one forced rotation: the broken file was renamed away
        // and a fresh live file holds the retried row.
        assert_eq!(file_count(dir.path()), files_before + 1);
        let response = store.read_rca("node_a").unwrap();
        assert_eq!(response.rows.len(), 1);
        assert_eq!(response.rows[0].columns["timestamp"], 2);
    }

    #[test]
    fn second_failure_surfaces_original_error_without_partial_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = Persistor::open(&store_config(dir.path())).unwrap();

        // A table name that cannot appear in a SQL identifier fails on
        // the first attempt and again after the forced rotation.
        let err = store
            .write("bad\"node", &FlowUnit::new(1, HealthContext::Unhealthy))
            .unwrap_err();
        assert!(matches!(err, StoreError::WriteFailed { .. }));

        let contents = store.read().unwrap();
        assert_eq!(contents, serde_json::json!({}));
    }
}

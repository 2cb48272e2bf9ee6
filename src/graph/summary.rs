// src/graph/summary.rs
//! Hierarchical explanation payloads attached to interesting flow units.
//!
//! A summary is a tree: each node carries an explicit column schema and a
//! row of values, plus an ordered list of nested child summaries. The
//! schema descriptor is declared by the producer (no runtime type
//! introspection); persistence walks the tree depth-first, writing each
//! node as a row in a table named after its `kind`, with a foreign-key
//! column pointing at the parent's just-inserted row id.

use serde::{Deserialize, Serialize};

/// SQL column type for a declared summary/flow-unit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
}

impl ColumnType {
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
        }
    }
}

/// One declared column: field name plus its column type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// A single cell value matching a [`ColumnSpec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Real(f64),
}

/// One node of a summary tree. Owned exclusively by its flow unit;
/// acyclic by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    kind: String,
    schema: Vec<ColumnSpec>,
    values: Vec<SqlValue>,
    children: Vec<Summary>,
}

impl Summary {
    /// Build a leaf summary. `schema` and `values` must be parallel; a
    /// mismatch is a programming error in the producing node.
    pub fn new(kind: impl Into<String>, schema: Vec<ColumnSpec>, values: Vec<SqlValue>) -> Self {
        debug_assert_eq!(schema.len(), values.len(), "summary schema/values mismatch");
        Self {
            kind: kind.into(),
            schema,
            values,
            children: Vec::new(),
        }
    }

    /// Append a nested child summary, preserving insertion order.
    pub fn append_nested(&mut self, child: Summary) {
        self.children.push(child);
    }

    /// Table name this summary persists into.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn schema(&self) -> &[ColumnSpec] {
        &self.schema
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn children(&self) -> &[Summary] {
        &self.children
    }
}

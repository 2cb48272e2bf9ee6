// src/persistence/response.rs
//! Read-API response shapes: the current file's contents serialized for
//! an external reporting layer, one row per flow unit or summary with the
//! columns that entity declared.

use serde::Serialize;
use serde_json::{Map, Value};

/// Everything persisted for one graph node in the current file, with
/// summary rows reattached as trees via their foreign-key links.
#[derive(Debug, Clone, Serialize)]
pub struct RcaResponse {
    pub rca_name: String,
    pub rows: Vec<RcaRow>,
}

/// One flow-unit row plus the summary trees hanging off it.
#[derive(Debug, Clone, Serialize)]
pub struct RcaRow {
    pub row_id: i64,
    pub columns: Map<String, Value>,
    pub summaries: Vec<SummaryNode>,
}

/// One summary row, reconstructed without the in-memory object graph:
/// children are found by following `<parent>_ID` references.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryNode {
    pub table: String,
    pub row_id: i64,
    pub columns: Map<String, Value>,
    pub children: Vec<SummaryNode>,
}

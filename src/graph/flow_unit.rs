// src/graph/flow_unit.rs
//! The immutable per-cycle output of a graph node.

use serde::{Deserialize, Serialize};

use crate::graph::summary::{ColumnSpec, ColumnType, SqlValue, Summary};

/// Health classification attached to a non-empty flow unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthContext {
    Healthy,
    Unhealthy,
    Contended,
    Unknown,
}

impl HealthContext {
    pub fn is_unhealthy(self) -> bool {
        matches!(self, HealthContext::Unhealthy | HealthContext::Contended)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthContext::Healthy => "healthy",
            HealthContext::Unhealthy => "unhealthy",
            HealthContext::Contended => "contended",
            HealthContext::Unknown => "unknown",
        }
    }
}

/// Identity of the local cluster member, tagged onto node-level summaries
/// produced by combining evaluators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDetails {
    pub instance_id: String,
    pub instance_address: String,
}

impl InstanceDetails {
    pub fn new(instance_id: impl Into<String>, instance_address: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            instance_address: instance_address.into(),
        }
    }
}

/// One evaluation cycle's computed output. Constructed once, then only
/// queried: an empty unit means the node had insufficient input this
/// cycle and carries no information downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowUnit {
    timestamp_ms: i64,
    context: Option<HealthContext>,
    summary: Option<Summary>,
}

impl FlowUnit {
    /// The empty unit: produced when a node cannot compute a result.
    pub fn empty(timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms,
            context: None,
            summary: None,
        }
    }

    /// A non-empty unit with no explanation payload.
    pub fn new(timestamp_ms: i64, context: HealthContext) -> Self {
        Self {
            timestamp_ms,
            context: Some(context),
            summary: None,
        }
    }

    /// A non-empty unit carrying a summary tree explaining its context.
    pub fn with_summary(timestamp_ms: i64, context: HealthContext, summary: Summary) -> Self {
        Self {
            timestamp_ms,
            context: Some(context),
            summary: Some(summary),
        }
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    /// True when the node had no result this cycle. Empty units are never
    /// persisted and never drive action logic.
    pub fn is_empty(&self) -> bool {
        self.context.is_none()
    }

    pub fn context(&self) -> Option<HealthContext> {
        self.context
    }

    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    pub fn has_summary(&self) -> bool {
        self.summary.is_some()
    }

    // ---------- persistence schema ----------

    /// Columns every flow-unit table declares.
    pub fn sql_schema() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("timestamp", ColumnType::Integer),
            ColumnSpec::new("context", ColumnType::Text),
        ]
    }

    /// Row values matching [`FlowUnit::sql_schema`].
    pub fn sql_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Integer(self.timestamp_ms),
            SqlValue::Text(
                self.context
                    .map(HealthContext::as_str)
                    .unwrap_or("empty")
                    .to_string(),
            ),
        ]
    }
}

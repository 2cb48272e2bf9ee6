// src/wire.rs
//! Wire-side model for distributed graphs.
//!
//! On the cluster member that owns the data, a node computes its flow
//! units locally; on every other member the same node type runs as a
//! consumer, installing units decoded from the transport. The transport
//! itself (framing, retries, subscriptions) is an external collaborator
//! behind [`WireReader`]; it hands this crate already-decoded messages
//! keyed by the originating node's name.

use serde::{Deserialize, Serialize};

use crate::graph::flow_unit::{FlowUnit, HealthContext};
use crate::graph::summary::Summary;

/// A serialized flow unit as shipped between cluster members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowUnitMessage {
    pub node_name: String,
    pub timestamp_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<HealthContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

impl FlowUnitMessage {
    pub fn from_flow_unit(node_name: impl Into<String>, unit: &FlowUnit) -> Self {
        Self {
            node_name: node_name.into(),
            timestamp_ms: unit.timestamp_ms(),
            context: unit.context(),
            summary: unit.summary().cloned(),
        }
    }

    pub fn into_flow_unit(self) -> FlowUnit {
        match (self.context, self.summary) {
            (Some(context), Some(summary)) => {
                FlowUnit::with_summary(self.timestamp_ms, context, summary)
            }
            (Some(context), None) => FlowUnit::new(self.timestamp_ms, context),
            _ => FlowUnit::empty(self.timestamp_ms),
        }
    }
}

/// Supplies, per remote-fed node, the decode-ready messages received for
/// it this cycle. An empty vec means no update.
pub trait WireReader {
    fn read_from_wire(&self, node_name: &str) -> Vec<FlowUnitMessage>;
}

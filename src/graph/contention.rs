// src/graph/contention.rs
//! Composite evaluator: folds two upstream health signals into a
//! "contended" verdict.
//!
//! The combination pattern is the one used throughout the graph: read
//! exactly one flow unit from each upstream, abandon the cycle on any
//! other cardinality (all nodes in a cycle run at matching cadence), and
//! emit a derived verdict whose summary nests both upstream summaries
//! under the local member's identity.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::graph::flow_unit::{FlowUnit, HealthContext, InstanceDetails};
use crate::graph::node::{GraphNode, NodeBase, OutputSlot};
use crate::graph::summary::{ColumnSpec, ColumnType, SqlValue, Summary};
use crate::util::now_millis;

pub struct ResourceContentionRca {
    base: NodeBase,
    occupancy: Arc<OutputSlot>,
    reclamation: Arc<OutputSlot>,
    instance: InstanceDetails,
}

impl ResourceContentionRca {
    pub fn new(
        name: impl Into<String>,
        eval_interval: Duration,
        occupancy: Arc<OutputSlot>,
        reclamation: Arc<OutputSlot>,
        instance: InstanceDetails,
    ) -> Self {
        Self {
            base: NodeBase::new(name, eval_interval),
            occupancy,
            reclamation,
            instance,
        }
    }

    fn node_summary(&self) -> Summary {
        Summary::new(
            "ContendedNodeSummary",
            vec![
                ColumnSpec::new("instance_id", ColumnType::Text),
                ColumnSpec::new("instance_address", ColumnType::Text),
            ],
            vec![
                SqlValue::Text(self.instance.instance_id.clone()),
                SqlValue::Text(self.instance.instance_address.clone()),
            ],
        )
    }
}

impl GraphNode for ResourceContentionRca {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn operate(&mut self) -> Result<FlowUnit> {
        let occupancy_units = self.occupancy.snapshot();
        let reclamation_units = self.reclamation.snapshot();
        let now = now_millis();

        // Both upstreams run at this node's cadence, so each should have
        // produced exactly one unit this cycle.
        if occupancy_units.len() != 1 || reclamation_units.len() != 1 {
            tracing::warn!(
                node = self.name(),
                occupancy = occupancy_units.len(),
                reclamation = reclamation_units.len(),
                "expected exactly one flow unit from each upstream; abandoning combination"
            );
            return Ok(FlowUnit::empty(now));
        }

        let occupancy_unit = &occupancy_units[0];
        let reclamation_unit = &reclamation_units[0];

        if !occupancy_unit.is_empty() && !reclamation_unit.is_empty() {
            let occupancy_unhealthy = occupancy_unit
                .context()
                .is_some_and(HealthContext::is_unhealthy);
            let reclamation_unhealthy = reclamation_unit
                .context()
                .is_some_and(HealthContext::is_unhealthy);

            if occupancy_unhealthy && reclamation_unhealthy {
                let mut summary = self.node_summary();
                if let Some(nested) = occupancy_unit.summary() {
                    summary.append_nested(nested.clone());
                }
                if let Some(nested) = reclamation_unit.summary() {
                    summary.append_nested(nested.clone());
                }
                return Ok(FlowUnit::with_summary(
                    now,
                    HealthContext::Contended,
                    summary,
                ));
            }
        }

        Ok(FlowUnit::empty(now))
    }
}

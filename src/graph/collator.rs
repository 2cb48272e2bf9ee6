// src/graph/collator.rs
//! Aggregation node: folds upstream verdicts into one [`Decision`] per
//! cycle.
//!
//! Which remediation applies to which verdict is product logic; it plugs
//! in behind [`RemediationPolicy`]. The collator only fixes the
//! iteration order (upstream registration order) so dampening downstream
//! is deterministic.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::decider::action::Action;
use crate::decider::decision::{Decision, DecisionSlot};
use crate::graph::flow_unit::{FlowUnit, HealthContext};
use crate::graph::node::{GraphNode, NodeBase, OutputSlot};
use crate::util::now_millis;

/// Maps an unhealthy verdict to zero or more candidate actions.
pub trait RemediationPolicy: Send {
    fn actions_for(&self, node_name: &str, unit: &FlowUnit) -> Vec<Action>;
}

pub struct Collator {
    base: NodeBase,
    upstreams: Vec<(String, Arc<OutputSlot>)>,
    policy: Box<dyn RemediationPolicy>,
    decisions: Arc<DecisionSlot>,
}

impl Collator {
    pub fn new(
        name: impl Into<String>,
        eval_interval: Duration,
        upstreams: Vec<(String, Arc<OutputSlot>)>,
        policy: Box<dyn RemediationPolicy>,
    ) -> Self {
        Self {
            base: NodeBase::new(name, eval_interval),
            upstreams,
            policy,
            decisions: Arc::new(DecisionSlot::new()),
        }
    }

    /// Shared handle the publisher reads decisions from.
    pub fn decision_slot(&self) -> Arc<DecisionSlot> {
        Arc::clone(&self.decisions)
    }
}

impl GraphNode for Collator {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn operate(&mut self) -> Result<FlowUnit> {
        let now = now_millis();
        let mut actions = Vec::new();

        for (upstream_name, slot) in &self.upstreams {
            let units = slot.snapshot();
            // A verdict only contributes when its upstream produced the
            // expected single non-empty unhealthy unit this cycle.
            if units.len() != 1 {
                continue;
            }
            let unit = &units[0];
            if unit.is_empty() || !unit.context().is_some_and(HealthContext::is_unhealthy) {
                continue;
            }
            actions.extend(self.policy.actions_for(upstream_name, unit));
        }

        self.decisions.install(vec![Decision::new(now, actions)]);
        // The decision travels through its own slot; the graph output is
        // just the cycle marker.
        Ok(FlowUnit::empty(now))
    }
}

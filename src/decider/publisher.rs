// src/decider/publisher.rs
//! Terminal graph node: gates the collator's candidate actions through
//! cooldown and flip-flop checks, then notifies listeners.
//!
//! All dampening state (last-execution map, flip-flop history) is
//! process-local and resets on restart: cooldown windows are short-lived
//! protections, not durable audit state.

use anyhow::{ensure, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::decider::action::{Action, ActionListener};
use crate::decider::decision::DecisionSlot;
use crate::decider::flip_flop::{FlipFlopDetector, TimedFlipFlopDetector};
use crate::graph::flow_unit::FlowUnit;
use crate::graph::node::{GraphNode, NodeBase, OperationArgs};
use crate::util::now_millis;

pub struct Publisher {
    base: NodeBase,
    collator: Arc<DecisionSlot>,
    init_time_ms: i64,
    last_execution: HashMap<String, i64>,
    flip_flop: Box<dyn FlipFlopDetector>,
    listeners: Vec<Box<dyn ActionListener>>,
}

impl Publisher {
    pub fn new(eval_interval: Duration, collator: Arc<DecisionSlot>) -> Self {
        Self::with_detector(
            eval_interval,
            collator,
            Box::new(TimedFlipFlopDetector::default()),
        )
    }

    /// Construct with a specific flip-flop detection policy.
    pub fn with_detector(
        eval_interval: Duration,
        collator: Arc<DecisionSlot>,
        flip_flop: Box<dyn FlipFlopDetector>,
    ) -> Self {
        Self {
            base: NodeBase::new("publisher", eval_interval),
            collator,
            init_time_ms: now_millis(),
            last_execution: HashMap::new(),
            flip_flop,
            listeners: Vec::new(),
        }
    }

    /// Register a listener to be notified whenever an action is
    /// published.
    pub fn add_action_listener(&mut self, listener: Box<dyn ActionListener>) {
        self.listeners.push(listener);
    }

    /// The construction instant, used as the last-execution baseline for
    /// actions that have never run: after a fresh start every action is
    /// eligible as soon as its cool-off has elapsed since construction.
    pub fn init_time_ms(&self) -> i64 {
        self.init_time_ms
    }

    /// Last time an action of this name was published, if ever.
    pub fn last_execution_ms(&self, action_name: &str) -> Option<i64> {
        self.last_execution.get(action_name).copied()
    }

    /// True iff the action's cool-off period has fully elapsed
    /// (boundary inclusive: `elapsed >= cool_off`).
    pub fn is_cooled_off(&self, action: &Action) -> bool {
        self.is_cooled_off_at(action, now_millis())
    }

    /// Deterministic variant of [`Publisher::is_cooled_off`] against a
    /// caller-supplied clock reading.
    pub fn is_cooled_off_at(&self, action: &Action, now_ms: i64) -> bool {
        let last = self
            .last_execution
            .get(action.name())
            .copied()
            .unwrap_or(self.init_time_ms);
        let elapsed = now_ms - last;
        if elapsed >= action.cool_off_period_ms() {
            true
        } else {
            tracing::debug!(
                action = action.name(),
                remaining_ms = action.cool_off_period_ms() - elapsed,
                "action still inside its cool-off period"
            );
            false
        }
    }
}

impl GraphNode for Publisher {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn operate(&mut self) -> Result<FlowUnit> {
        let decisions = self.collator.snapshot();
        ensure!(
            decisions.len() == 1,
            "expected exactly one decision from the collator, found {}",
            decisions.len()
        );

        let now = now_millis();
        for action in decisions[0].actions() {
            if self.is_cooled_off_at(action, now) && !self.flip_flop.is_flip_flop(action, now) {
                self.flip_flop.record_action(action, now);
                self.last_execution.insert(action.name().to_string(), now);
                tracing::info!(action = action.name(), "publishing action");
                for listener in &self.listeners {
                    listener.action_published(action);
                }
            } else {
                tracing::debug!(action = action.name(), "action dropped by dampening");
            }
        }

        // Terminal node: the side effect is the notifications, the return
        // value is just the cycle marker.
        Ok(FlowUnit::empty(now_millis()))
    }

    /// No downstream graph consumers and no durable output.
    fn persist_flow_unit(&self, _args: &mut OperationArgs<'_>) -> Result<()> {
        Ok(())
    }

    /// The publisher is never fed from the wire.
    fn generate_flow_unit_from_wire(&mut self, _args: &mut OperationArgs<'_>) {}
}

// src/decider/decision.rs

use std::sync::Mutex;

use crate::decider::action::Action;

/// The collator's per-cycle product: an ordered list of candidate
/// actions. The order fixes dampening iteration downstream; it does not
/// imply priority.
#[derive(Debug, Clone)]
pub struct Decision {
    timestamp_ms: i64,
    actions: Vec<Action>,
}

impl Decision {
    pub fn new(timestamp_ms: i64, actions: Vec<Action>) -> Self {
        Self {
            timestamp_ms,
            actions,
        }
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Shared slot the collator publishes into and the publisher reads from,
/// mirroring the flow-unit output slots of ordinary graph edges.
#[derive(Debug, Default)]
pub struct DecisionSlot {
    decisions: Mutex<Vec<Decision>>,
}

impl DecisionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, decisions: Vec<Decision>) {
        let mut guard = self.decisions.lock().unwrap_or_else(|e| e.into_inner());
        *guard = decisions;
    }

    pub fn snapshot(&self) -> Vec<Decision> {
        self.decisions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

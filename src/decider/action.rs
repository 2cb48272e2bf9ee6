// src/decider/action.rs
//! Remediation candidates and the seam to whatever executes them.

use std::time::Duration;

/// A named, idempotent remediation descriptor. For dampening purposes two
/// actions with the same name are the same action, whatever else differs.
#[derive(Debug, Clone)]
pub struct Action {
    name: String,
    summary: String,
    cool_off_period: Duration,
}

impl Action {
    pub fn new(name: impl Into<String>, cool_off_period: Duration) -> Self {
        Self {
            name: name.into(),
            summary: String::new(),
            cool_off_period,
        }
    }

    /// Human-readable impact description, for logs and operator surfaces.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Minimum time between successive executions of this action.
    pub fn cool_off_period(&self) -> Duration {
        self.cool_off_period
    }

    pub fn cool_off_period_ms(&self) -> i64 {
        self.cool_off_period.as_millis() as i64
    }
}

/// Notified synchronously for every published action. Listeners are the
/// action-execution layer's problem: they must not fail.
pub trait ActionListener: Send {
    fn action_published(&self, action: &Action);
}

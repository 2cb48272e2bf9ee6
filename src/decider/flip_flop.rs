// src/decider/flip_flop.rs
//! Oscillation suppression, orthogonal to cooldown: cooldown limits how
//! *often* an action runs, flip-flop detection limits the oscillation
//! *pattern*. The exact toggle condition is a policy choice, so the
//! detector is a trait with a timed default.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::config::DampeningConfig;
use crate::decider::action::Action;

/// Detection strategy over the history of executed actions. Methods take
/// the caller's clock reading so hosts (and tests) control time.
pub trait FlipFlopDetector: Send {
    /// Record that `action` was executed at `now_ms`.
    fn record_action(&mut self, action: &Action, now_ms: i64);

    /// True when executing `action` now would continue an oscillation.
    fn is_flip_flop(&self, action: &Action, now_ms: i64) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct FlipFlopConfig {
    /// Sliding lookback window over recorded executions.
    pub window: Duration,
    /// An action with more than this many executions inside the window is
    /// a flip-flop.
    pub threshold: usize,
}

impl Default for FlipFlopConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(3600),
            threshold: 4,
        }
    }
}

impl From<&DampeningConfig> for FlipFlopConfig {
    fn from(cfg: &DampeningConfig) -> Self {
        Self {
            window: Duration::from_secs(cfg.flip_flop_window_secs),
            threshold: cfg.flip_flop_threshold,
        }
    }
}

/// Default policy: a bounded, time-ordered execution history per action
/// name; entries older than the window are pruned as new ones arrive.
#[derive(Debug, Default)]
pub struct TimedFlipFlopDetector {
    config: FlipFlopConfig,
    history: HashMap<String, VecDeque<i64>>,
}

impl TimedFlipFlopDetector {
    pub fn new(config: FlipFlopConfig) -> Self {
        Self {
            config,
            history: HashMap::new(),
        }
    }

    fn window_ms(&self) -> i64 {
        self.config.window.as_millis() as i64
    }
}

impl FlipFlopDetector for TimedFlipFlopDetector {
    fn record_action(&mut self, action: &Action, now_ms: i64) {
        let window_ms = self.window_ms();
        let entries = self.history.entry(action.name().to_string()).or_default();
        entries.push_back(now_ms);
        while let Some(&oldest) = entries.front() {
            if now_ms - oldest > window_ms {
                entries.pop_front();
            } else {
                break;
            }
        }
    }

    fn is_flip_flop(&self, action: &Action, now_ms: i64) -> bool {
        let window_ms = self.window_ms();
        let in_window = self
            .history
            .get(action.name())
            .map(|entries| {
                entries
                    .iter()
                    .filter(|&&at| now_ms - at <= window_ms)
                    .count()
            })
            .unwrap_or(0);
        if in_window > self.config.threshold {
            tracing::debug!(
                action = action.name(),
                executions = in_window,
                threshold = self.config.threshold,
                "action is flip-flopping inside the lookback window"
            );
            true
        } else {
            false
        }
    }
}

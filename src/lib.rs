//! rcaflow: the decision/remediation core of a cluster health-analysis
//! engine.
//!
//! A directed acyclic graph of evaluator nodes recomputes health signals
//! once per evaluation cycle. Each node emits one immutable [`FlowUnit`];
//! combining nodes fold upstream units into higher-level verdicts; a
//! collator turns verdicts into a [`Decision`] (an ordered list of
//! candidate [`Action`]s); the terminal [`Publisher`] dampens those
//! actions (cooldown + flip-flop suppression) before notifying listeners.
//! Every non-empty flow unit is appended to a rotating, garbage-collected
//! SQLite log via the [`Persistor`].
//!
//! The scheduler that drives node evaluation, the wire transport, and the
//! action executors are external collaborators; this crate exposes the
//! seams they plug into (`WireReader`, `ActionListener`,
//! `RemediationPolicy`).

pub mod config;
pub mod decider;
pub mod graph;
pub mod persistence;
pub mod stats;
pub mod util;
pub mod wire;

pub use config::{DampeningConfig, EngineConfig, StoreConfig};
pub use decider::{
    Action, ActionListener, Decision, DecisionSlot, FlipFlopConfig, FlipFlopDetector, Publisher,
    TimedFlipFlopDetector,
};
pub use graph::{
    AnalysisGraph, Collator, FlowUnit, GaugeThresholdNode, GraphNode, HealthContext,
    InstanceDetails, MetricSource, NodeBase, NodeId, OperationArgs, OutputSlot, RemediationPolicy,
    ResourceContentionRca, Summary,
};
pub use persistence::{Persistor, RcaResponse, StoreError};
pub use stats::StatsCollector;
pub use wire::{FlowUnitMessage, WireReader};

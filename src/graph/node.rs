// src/graph/node.rs
//! The graph-node execution contract.
//!
//! Every evaluator implements [`GraphNode`]: `operate()` computes one
//! flow unit per cycle, and the default `generate_*` methods wrap it in
//! the fault boundary and the local-vs-wire data-generation dichotomy.
//! The scheduler is external; it must never re-enter `operate()` on the
//! same node concurrently (single writer per node), but distinct nodes
//! may run in parallel.

use anyhow::Result;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::graph::flow_unit::FlowUnit;
use crate::persistence::Persistor;
use crate::stats::StatsCollector;
use crate::util::now_millis;
use crate::wire::WireReader;

/// A node's published output for the current cycle. Downstream nodes hold
/// non-owning `Arc` clones of their upstreams' slots: a node observes its
/// upstream, it does not own it.
#[derive(Debug, Default)]
pub struct OutputSlot {
    units: Mutex<Vec<FlowUnit>>,
}

impl OutputSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot's contents with this cycle's units.
    pub fn install(&self, units: Vec<FlowUnit>) {
        let mut guard = self.units.lock().unwrap_or_else(|e| e.into_inner());
        *guard = units;
    }

    /// Clone out the current units.
    pub fn snapshot(&self) -> Vec<FlowUnit> {
        self.units
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// State every graph node carries: identity, cadence, the externally
/// settable muted flag, and the shared output slot.
#[derive(Debug)]
pub struct NodeBase {
    name: String,
    eval_interval: Duration,
    muted: AtomicBool,
    output: Arc<OutputSlot>,
}

impl NodeBase {
    pub fn new(name: impl Into<String>, eval_interval: Duration) -> Self {
        Self {
            name: name.into(),
            eval_interval,
            muted: AtomicBool::new(false),
            output: Arc::new(OutputSlot::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn eval_interval(&self) -> Duration {
        self.eval_interval
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    /// Set externally when the scheduler decides this node must stop
    /// producing (e.g. upstream data went stale).
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Release);
    }

    /// Shared handle to this node's output, for wiring downstream nodes.
    pub fn output(&self) -> Arc<OutputSlot> {
        Arc::clone(&self.output)
    }

    pub fn install(&self, units: Vec<FlowUnit>) {
        self.output.install(units);
    }

    pub fn output_snapshot(&self) -> Vec<FlowUnit> {
        self.output.snapshot()
    }
}

/// Collaborators handed to a node for one scheduled invocation. All of
/// them are passed explicitly; nodes keep no ambient global state.
pub struct OperationArgs<'a> {
    pub persistor: Option<&'a Persistor>,
    pub wire: Option<&'a dyn WireReader>,
    pub stats: &'a StatsCollector,
}

impl<'a> OperationArgs<'a> {
    pub fn new(stats: &'a StatsCollector) -> Self {
        Self {
            persistor: None,
            wire: None,
            stats,
        }
    }

    pub fn with_persistor(mut self, persistor: &'a Persistor) -> Self {
        self.persistor = Some(persistor);
        self
    }

    pub fn with_wire(mut self, wire: &'a dyn WireReader) -> Self {
        self.wire = Some(wire);
        self
    }
}

/// The execution contract shared by every vertex of the analysis graph.
pub trait GraphNode: Send {
    /// Accessor for the node's common state; the default methods below
    /// are written against it.
    fn base(&self) -> &NodeBase;

    /// Compute exactly one flow unit for this cycle from upstream slots
    /// and/or externally supplied metrics. Must not be called
    /// re-entrantly on the same node.
    fn operate(&mut self) -> Result<FlowUnit>;

    fn name(&self) -> &str {
        self.base().name()
    }

    fn eval_interval(&self) -> Duration {
        self.base().eval_interval()
    }

    /// Entry point when this node's data originates locally. Runs
    /// `operate()` under the fault boundary: a failing node yields an
    /// empty unit for the cycle, logs, and bumps the fault counter; it
    /// never halts the scheduler. Call duration is recorded for
    /// observability.
    fn generate_flow_unit_from_local(&mut self, args: &mut OperationArgs<'_>) {
        if self.base().is_muted() {
            self.handle_node_muted();
            self.base().install(Vec::new());
            return;
        }

        let started = Instant::now();
        let unit = match self.operate() {
            Ok(unit) => unit,
            Err(err) => {
                tracing::error!(node = self.name(), error = %err, "operate failed");
                args.stats.record_operate_fault(self.name());
                FlowUnit::empty(now_millis())
            }
        };
        args.stats
            .record_operate_call(self.name(), started.elapsed().as_millis() as u64);
        self.base().install(vec![unit]);
    }

    /// Entry point when this node's data arrives serialized from a remote
    /// peer: decode whatever the wire has for this node and install it as
    /// the current output, bypassing `operate()`. Zero messages simply
    /// mean no update this cycle.
    fn generate_flow_unit_from_wire(&mut self, args: &mut OperationArgs<'_>) {
        let units = match args.wire {
            Some(wire) => wire
                .read_from_wire(self.name())
                .into_iter()
                .map(|msg| msg.into_flow_unit())
                .collect(),
            None => Vec::new(),
        };
        self.base().install(units);
    }

    /// Durably record this cycle's output. Terminal nodes with nothing
    /// durable override this to a no-op.
    fn persist_flow_unit(&self, args: &mut OperationArgs<'_>) -> Result<()> {
        if let Some(persistor) = args.persistor {
            for unit in self.base().output_snapshot() {
                persistor.write(self.name(), &unit)?;
            }
        }
        Ok(())
    }

    /// Hook invoked when the scheduler mutes this node. Most nodes have
    /// no special teardown.
    fn handle_node_muted(&mut self) {}
}

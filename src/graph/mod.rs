// src/graph/mod.rs
//! The analysis graph: a registry that owns every node, records edges,
//! and guarantees acyclicity at construction time.
//!
//! Nodes reference their upstreams through shared output slots, so the
//! registry's edge list exists purely for validation and for handing an
//! external scheduler a safe evaluation order.

pub mod collator;
pub mod contention;
pub mod flow_unit;
pub mod gauge;
pub mod node;
pub mod summary;

pub use collator::{Collator, RemediationPolicy};
pub use contention::ResourceContentionRca;
pub use flow_unit::{FlowUnit, HealthContext, InstanceDetails};
pub use gauge::{GaugeThresholdNode, MetricSource};
pub use node::{GraphNode, NodeBase, OperationArgs, OutputSlot};
pub use summary::{ColumnSpec, ColumnType, SqlValue, Summary};

use anyhow::{bail, Result};
use std::collections::HashMap;

/// Handle to a node owned by an [`AnalysisGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

pub struct AnalysisGraph {
    nodes: Vec<Box<dyn GraphNode>>,
    // upstream edges per node, by index
    upstream: Vec<Vec<usize>>,
    names: HashMap<String, usize>,
}

impl AnalysisGraph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            upstream: Vec::new(),
            names: HashMap::new(),
        }
    }

    /// Register a node with its upstream dependencies. Names must be
    /// unique (they double as table names in the store) and the edge set
    /// must stay acyclic; both are validated here rather than trusted to
    /// runtime behavior.
    pub fn add_node(
        &mut self,
        node: Box<dyn GraphNode>,
        upstream: &[NodeId],
    ) -> Result<NodeId> {
        let name = node.name().to_string();
        if self.names.contains_key(&name) {
            bail!("duplicate graph node name '{name}'");
        }
        for dep in upstream {
            if dep.0 >= self.nodes.len() {
                bail!("unknown upstream node id {} for '{name}'", dep.0);
            }
        }

        let id = self.nodes.len();
        self.nodes.push(node);
        self.upstream.push(upstream.iter().map(|d| d.0).collect());
        self.names.insert(name, id);
        self.validate_acyclic()?;
        Ok(NodeId(id))
    }

    /// Kahn's algorithm over the upstream edges; returns the evaluation
    /// order (every upstream before its consumers) or fails on a cycle.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (node, deps) in self.upstream.iter().enumerate() {
            indegree[node] = deps.len();
            for &dep in deps {
                downstream[dep].push(node);
            }
        }

        let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(next) = ready.pop() {
            order.push(NodeId(next));
            for &consumer in &downstream[next] {
                indegree[consumer] -= 1;
                if indegree[consumer] == 0 {
                    ready.push(consumer);
                }
            }
        }

        if order.len() != n {
            bail!("analysis graph contains a cycle");
        }
        Ok(order)
    }

    fn validate_acyclic(&self) -> Result<()> {
        self.topological_order().map(|_| ())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &dyn GraphNode {
        self.nodes[id.0].as_ref()
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut dyn GraphNode {
        self.nodes[id.0].as_mut()
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied().map(NodeId)
    }

    /// Mute or unmute a node by handle.
    pub fn set_muted(&self, id: NodeId, muted: bool) {
        self.nodes[id.0].base().set_muted(muted);
    }

    /// Drive one full evaluation cycle in topological order: local
    /// generation followed by persistence for each node. Persistence
    /// failures are logged and counted but never stop the cycle; lost
    /// durability must be visible to operators, not fatal to analysis.
    pub fn evaluate_cycle(&mut self, args: &mut OperationArgs<'_>) -> Result<()> {
        let order = self.topological_order()?;
        for id in order {
            let node = self.nodes[id.0].as_mut();
            node.generate_flow_unit_from_local(args);
            if let Err(err) = node.persist_flow_unit(args) {
                tracing::error!(node = node.name(), error = %err, "failed to persist flow unit");
                args.stats.record_persist_fault(node.name());
            }
        }
        Ok(())
    }
}

impl Default for AnalysisGraph {
    fn default() -> Self {
        Self::new()
    }
}

use std::sync::Arc;
use std::time::Duration;

use rcaflow::graph::{
    AnalysisGraph, Collator, FlowUnit, GaugeThresholdNode, GraphNode, HealthContext,
    InstanceDetails, MetricSource, NodeBase, OperationArgs, OutputSlot, RemediationPolicy,
    ResourceContentionRca,
};
use rcaflow::decider::{Action, ActionListener, Publisher};
use rcaflow::stats::StatsCollector;
use rcaflow::util::now_millis;
use rcaflow::wire::{FlowUnitMessage, WireReader};

// ----------------------- Test stubs -----------------------

struct FixedGauge {
    value: Option<f64>,
}

impl MetricSource for FixedGauge {
    fn sample(&mut self) -> anyhow::Result<Option<f64>> {
        Ok(self.value)
    }
}

/// Fails on the first cycle, recovers afterwards.
struct FlakyNode {
    base: NodeBase,
    calls: usize,
}

impl FlakyNode {
    fn new(name: &str) -> Self {
        Self {
            base: NodeBase::new(name, Duration::from_secs(5)),
            calls: 0,
        }
    }
}

impl GraphNode for FlakyNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn operate(&mut self) -> anyhow::Result<FlowUnit> {
        self.calls += 1;
        if self.calls == 1 {
            anyhow::bail!("transient computation fault");
        }
        Ok(FlowUnit::new(now_millis(), HealthContext::Healthy))
    }
}

struct OneActionPerVerdict;

impl RemediationPolicy for OneActionPerVerdict {
    fn actions_for(&self, node_name: &str, _unit: &FlowUnit) -> Vec<Action> {
        vec![Action::new(format!("remediate_{node_name}"), Duration::ZERO)]
    }
}

struct ChannelListener {
    tx: crossbeam_channel::Sender<String>,
}

impl ActionListener for ChannelListener {
    fn action_published(&self, action: &Action) {
        self.tx.send(action.name().to_string()).unwrap();
    }
}

struct StubWire {
    messages: Vec<FlowUnitMessage>,
}

impl WireReader for StubWire {
    fn read_from_wire(&self, node_name: &str) -> Vec<FlowUnitMessage> {
        self.messages
            .iter()
            .filter(|m| m.node_name == node_name)
            .cloned()
            .collect()
    }
}

fn breach_summary() -> rcaflow::graph::Summary {
    use rcaflow::graph::{ColumnSpec, ColumnType, SqlValue, Summary};
    Summary::new(
        "GaugeBreachSummary",
        vec![
            ColumnSpec::new("metric", ColumnType::Text),
            ColumnSpec::new("value", ColumnType::Real),
            ColumnSpec::new("threshold", ColumnType::Real),
        ],
        vec![
            SqlValue::Text("heap_occupancy".into()),
            SqlValue::Real(0.95),
            SqlValue::Real(0.9),
        ],
    )
}

fn contention_node(occupancy: Arc<OutputSlot>, reclamation: Arc<OutputSlot>) -> ResourceContentionRca {
    ResourceContentionRca::new(
        "resource_contention",
        Duration::from_secs(5),
        occupancy,
        reclamation,
        InstanceDetails::new("node-1", "10.0.0.1"),
    )
}

// ----------------------- Tests ----------------------------

#[test]
fn combining_node_abandons_on_upstream_cardinality_mismatch() {
    let occupancy = Arc::new(OutputSlot::new());
    let reclamation = Arc::new(OutputSlot::new());
    let mut node = contention_node(Arc::clone(&occupancy), Arc::clone(&reclamation));

    // One upstream has no units this cycle.
    occupancy.install(vec![FlowUnit::new(1, HealthContext::Unhealthy)]);
    reclamation.install(vec![]);
    let unit = node.operate().expect("cardinality mismatch must not fail");
    assert!(unit.is_empty());

    // More units than expected is abandoned the same way.
    reclamation.install(vec![
        FlowUnit::new(1, HealthContext::Unhealthy),
        FlowUnit::new(2, HealthContext::Unhealthy),
    ]);
    let unit = node.operate().expect("cardinality mismatch must not fail");
    assert!(unit.is_empty());
}

#[test]
fn combining_node_emits_contended_verdict_with_nested_summaries() {
    let occupancy = Arc::new(OutputSlot::new());
    let reclamation = Arc::new(OutputSlot::new());
    let mut node = contention_node(Arc::clone(&occupancy), Arc::clone(&reclamation));

    occupancy.install(vec![FlowUnit::with_summary(
        1,
        HealthContext::Unhealthy,
        breach_summary(),
    )]);
    reclamation.install(vec![FlowUnit::with_summary(
        1,
        HealthContext::Unhealthy,
        breach_summary(),
    )]);

    let unit = node.operate().unwrap();
    assert_eq!(unit.context(), Some(HealthContext::Contended));
    let summary = unit.summary().expect("contended verdict carries a summary");
    assert_eq!(summary.kind(), "ContendedNodeSummary");
    assert_eq!(summary.children().len(), 2);
}

#[test]
fn combining_node_stays_empty_when_one_signal_is_healthy() {
    let occupancy = Arc::new(OutputSlot::new());
    let reclamation = Arc::new(OutputSlot::new());
    let mut node = contention_node(Arc::clone(&occupancy), Arc::clone(&reclamation));

    occupancy.install(vec![FlowUnit::new(1, HealthContext::Unhealthy)]);
    reclamation.install(vec![FlowUnit::new(1, HealthContext::Healthy)]);

    let unit = node.operate().unwrap();
    assert!(unit.is_empty());
}

#[test]
fn fault_in_one_cycle_does_not_break_the_next() {
    let stats = StatsCollector::new();
    let mut node = FlakyNode::new("flaky");

    let mut args = OperationArgs::new(&stats);
    node.generate_flow_unit_from_local(&mut args);
    let output = node.base().output_snapshot();
    assert_eq!(output.len(), 1);
    assert!(output[0].is_empty(), "failing cycle yields an empty unit");
    assert_eq!(stats.operate_fault_count("flaky"), 1);

    node.generate_flow_unit_from_local(&mut args);
    let output = node.base().output_snapshot();
    assert_eq!(output.len(), 1);
    assert!(!output[0].is_empty(), "next cycle runs normally");
    assert_eq!(stats.operate_fault_count("flaky"), 1);
    assert_eq!(stats.operate_call_count("flaky"), 2);
}

#[test]
fn muted_node_produces_no_output() {
    let stats = StatsCollector::new();
    let mut node = FlakyNode::new("muted");
    node.base().set_muted(true);

    let mut args = OperationArgs::new(&stats);
    node.generate_flow_unit_from_local(&mut args);
    assert!(node.base().output_snapshot().is_empty());
    assert_eq!(stats.operate_call_count("muted"), 0, "operate is skipped");
}

#[test]
fn wire_fed_node_installs_decoded_units() {
    let stats = StatsCollector::new();
    let mut node = FlakyNode::new("remote_verdict");

    let wire = StubWire {
        messages: vec![
            FlowUnitMessage {
                node_name: "remote_verdict".into(),
                timestamp_ms: 42,
                context: Some(HealthContext::Contended),
                summary: Some(breach_summary()),
            },
            FlowUnitMessage {
                node_name: "someone_else".into(),
                timestamp_ms: 43,
                context: Some(HealthContext::Healthy),
                summary: None,
            },
        ],
    };

    let mut args = OperationArgs::new(&stats).with_wire(&wire);
    node.generate_flow_unit_from_wire(&mut args);

    let output = node.base().output_snapshot();
    assert_eq!(output.len(), 1, "only messages keyed by this node's name");
    assert_eq!(output[0].timestamp_ms(), 42);
    assert_eq!(output[0].context(), Some(HealthContext::Contended));
    assert!(output[0].has_summary());
}

#[test]
fn wire_fed_node_tolerates_zero_messages() {
    let stats = StatsCollector::new();
    let mut node = FlakyNode::new("remote_verdict");
    let wire = StubWire { messages: vec![] };

    let mut args = OperationArgs::new(&stats).with_wire(&wire);
    node.generate_flow_unit_from_wire(&mut args);
    assert!(node.base().output_snapshot().is_empty());
}

#[test]
fn wire_message_round_trips_through_json() {
    let msg = FlowUnitMessage {
        node_name: "remote_verdict".into(),
        timestamp_ms: 7,
        context: Some(HealthContext::Unhealthy),
        summary: Some(breach_summary()),
    };
    let encoded = serde_json::to_string(&msg).unwrap();
    let decoded: FlowUnitMessage = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, msg);
}

#[test]
fn graph_rejects_duplicate_node_names() {
    let mut graph = AnalysisGraph::new();
    graph
        .add_node(Box::new(FlakyNode::new("dup")), &[])
        .unwrap();
    assert!(graph.add_node(Box::new(FlakyNode::new("dup")), &[]).is_err());
}

#[test]
fn graph_orders_upstreams_before_consumers() {
    let mut graph = AnalysisGraph::new();
    let a = graph.add_node(Box::new(FlakyNode::new("a")), &[]).unwrap();
    let b = graph.add_node(Box::new(FlakyNode::new("b")), &[a]).unwrap();
    let c = graph.add_node(Box::new(FlakyNode::new("c")), &[a, b]).unwrap();

    let order = graph.topological_order().unwrap();
    let pos = |id| order.iter().position(|&x| x == id).unwrap();
    assert!(pos(a) < pos(b));
    assert!(pos(b) < pos(c));
}

#[test]
fn full_cycle_publishes_remediation_for_unhealthy_gauge() {
    let mut graph = AnalysisGraph::new();

    let gauge = GaugeThresholdNode::new(
        "heap_gauge",
        Duration::from_secs(5),
        "heap_occupancy",
        0.9,
        Box::new(FixedGauge { value: Some(0.95) }),
    );
    let gauge_slot = gauge.base().output();
    let gauge_id = graph.add_node(Box::new(gauge), &[]).unwrap();

    let collator = Collator::new(
        "collator",
        Duration::from_secs(5),
        vec![("heap_gauge".to_string(), gauge_slot)],
        Box::new(OneActionPerVerdict),
    );
    let decisions = collator.decision_slot();
    let collator_id = graph.add_node(Box::new(collator), &[gauge_id]).unwrap();

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut publisher = Publisher::new(Duration::from_secs(5), decisions);
    publisher.add_action_listener(Box::new(ChannelListener { tx }));
    graph
        .add_node(Box::new(publisher), &[collator_id])
        .unwrap();

    let stats = StatsCollector::new();
    let mut args = OperationArgs::new(&stats);
    graph.evaluate_cycle(&mut args).unwrap();

    let published: Vec<String> = rx.try_iter().collect();
    assert_eq!(published, vec!["remediate_heap_gauge".to_string()]);
}

#[test]
fn full_cycle_publishes_nothing_for_healthy_gauge() {
    let mut graph = AnalysisGraph::new();

    let gauge = GaugeThresholdNode::new(
        "heap_gauge",
        Duration::from_secs(5),
        "heap_occupancy",
        0.9,
        Box::new(FixedGauge { value: Some(0.2) }),
    );
    let gauge_slot = gauge.base().output();
    let gauge_id = graph.add_node(Box::new(gauge), &[]).unwrap();

    let collator = Collator::new(
        "collator",
        Duration::from_secs(5),
        vec![("heap_gauge".to_string(), gauge_slot)],
        Box::new(OneActionPerVerdict),
    );
    let decisions = collator.decision_slot();
    let collator_id = graph.add_node(Box::new(collator), &[gauge_id]).unwrap();

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut publisher = Publisher::new(Duration::from_secs(5), decisions);
    publisher.add_action_listener(Box::new(ChannelListener { tx }));
    graph
        .add_node(Box::new(publisher), &[collator_id])
        .unwrap();

    let stats = StatsCollector::new();
    let mut args = OperationArgs::new(&stats);
    graph.evaluate_cycle(&mut args).unwrap();

    assert!(rx.try_iter().next().is_none());
}

#[test]
fn gauge_without_sample_yields_empty_unit() {
    let mut gauge = GaugeThresholdNode::new(
        "heap_gauge",
        Duration::from_secs(5),
        "heap_occupancy",
        0.9,
        Box::new(FixedGauge { value: None }),
    );
    let unit = gauge.operate().unwrap();
    assert!(unit.is_empty());
}

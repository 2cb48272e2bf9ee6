use std::sync::Arc;
use std::time::Duration;

use rcaflow::decider::{
    Action, ActionListener, Decision, DecisionSlot, FlipFlopConfig, FlipFlopDetector, Publisher,
    TimedFlipFlopDetector,
};
use rcaflow::graph::{GraphNode, OperationArgs};
use rcaflow::stats::StatsCollector;
use rcaflow::util::now_millis;

// ----------------------- Test stubs -----------------------

struct ChannelListener {
    tag: &'static str,
    tx: crossbeam_channel::Sender<String>,
}

impl ActionListener for ChannelListener {
    fn action_published(&self, action: &Action) {
        self.tx.send(format!("{}:{}", self.tag, action.name())).unwrap();
    }
}

fn single_decision_slot(actions: Vec<Action>) -> Arc<DecisionSlot> {
    let slot = Arc::new(DecisionSlot::new());
    slot.install(vec![Decision::new(now_millis(), actions)]);
    slot
}

fn listening_publisher(
    slot: Arc<DecisionSlot>,
    detector: Box<dyn FlipFlopDetector>,
) -> (Publisher, crossbeam_channel::Receiver<String>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut publisher = Publisher::with_detector(Duration::from_secs(5), slot, detector);
    publisher.add_action_listener(Box::new(ChannelListener { tag: "l", tx }));
    (publisher, rx)
}

// ----------------------- Cooldown -------------------------

#[test]
fn cooldown_boundary_is_inclusive() {
    let cool_off = Duration::from_secs(60);
    let slot = single_decision_slot(vec![Action::new("expand_cache", Duration::ZERO)]);
    let (mut publisher, rx) = listening_publisher(
        slot,
        Box::new(TimedFlipFlopDetector::new(FlipFlopConfig::default())),
    );

    // Publish once to stamp a real last-execution time.
    publisher.operate().unwrap();
    assert_eq!(rx.try_iter().count(), 1);
    let executed_at = publisher.last_execution_ms("expand_cache").unwrap();

    // Same action name, now with a cool-off: equality is by name alone.
    let candidate = Action::new("expand_cache", cool_off);
    let period_ms = cool_off.as_millis() as i64;
    assert!(!publisher.is_cooled_off_at(&candidate, executed_at + period_ms - 1));
    assert!(publisher.is_cooled_off_at(&candidate, executed_at + period_ms));
}

#[test]
fn never_published_action_uses_construction_time_as_baseline() {
    let slot = Arc::new(DecisionSlot::new());
    let publisher = Publisher::new(Duration::from_secs(5), slot);
    let init = publisher.init_time_ms();

    let candidate = Action::new("expand_cache", Duration::from_secs(5));
    assert!(!publisher.is_cooled_off_at(&candidate, init + 4_999));
    assert!(publisher.is_cooled_off_at(&candidate, init + 5_000));

    // With no cool-off, a fresh start blocks nothing.
    let immediate = Action::new("restart_shard", Duration::ZERO);
    assert!(publisher.is_cooled_off_at(&immediate, init));
}

#[test]
fn cooled_down_action_is_dropped_for_the_cycle() {
    // An action still inside a one-hour cool-off since construction is
    // silently dropped, not an error.
    let slot = single_decision_slot(vec![Action::new("expand_cache", Duration::from_secs(3600))]);
    let (mut publisher, rx) = listening_publisher(
        slot,
        Box::new(TimedFlipFlopDetector::new(FlipFlopConfig::default())),
    );

    publisher.operate().unwrap();
    assert_eq!(rx.try_iter().count(), 0);
    assert!(publisher.last_execution_ms("expand_cache").is_none());
}

// ----------------------- Flip-flop ------------------------

#[test]
fn flip_flop_detector_blocks_inside_window_and_recovers_after() {
    let config = FlipFlopConfig {
        window: Duration::from_secs(60),
        threshold: 2,
    };
    let mut detector = TimedFlipFlopDetector::new(config);
    let action = Action::new("expand_cache", Duration::ZERO);
    let t0 = 1_000_000;

    detector.record_action(&action, t0);
    detector.record_action(&action, t0 + 1_000);
    assert!(!detector.is_flip_flop(&action, t0 + 2_000));

    detector.record_action(&action, t0 + 2_000);
    assert!(
        detector.is_flip_flop(&action, t0 + 3_000),
        "more than the threshold inside the window"
    );

    // Once the window slides past the old entries, eligibility returns.
    assert!(!detector.is_flip_flop(&action, t0 + 100_000));
}

#[test]
fn flip_flop_history_is_independent_per_action_name() {
    let config = FlipFlopConfig {
        window: Duration::from_secs(60),
        threshold: 0,
    };
    let mut detector = TimedFlipFlopDetector::new(config);
    let a = Action::new("expand_cache", Duration::ZERO);
    let b = Action::new("restart_shard", Duration::ZERO);

    detector.record_action(&a, 1_000);
    assert!(detector.is_flip_flop(&a, 1_500));
    assert!(!detector.is_flip_flop(&b, 1_500));
}

#[test]
fn oscillating_action_is_suppressed_even_when_cooled_off() {
    let slot = single_decision_slot(vec![Action::new("expand_cache", Duration::ZERO)]);
    let detector = TimedFlipFlopDetector::new(FlipFlopConfig {
        window: Duration::from_secs(3600),
        threshold: 1,
    });
    let (mut publisher, rx) = listening_publisher(slot, Box::new(detector));

    publisher.operate().unwrap();
    publisher.operate().unwrap();
    publisher.operate().unwrap();

    // Cooldown is zero so only the flip-flop check can drop the third.
    assert_eq!(rx.try_iter().count(), 2);
}

// ----------------------- Publishing -----------------------

#[test]
fn listeners_are_notified_in_registration_order() {
    let slot = single_decision_slot(vec![Action::new("expand_cache", Duration::ZERO)]);
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut publisher = Publisher::new(Duration::from_secs(5), slot);
    publisher.add_action_listener(Box::new(ChannelListener {
        tag: "first",
        tx: tx.clone(),
    }));
    publisher.add_action_listener(Box::new(ChannelListener { tag: "second", tx }));

    publisher.operate().unwrap();
    let seen: Vec<String> = rx.try_iter().collect();
    assert_eq!(
        seen,
        vec!["first:expand_cache".to_string(), "second:expand_cache".to_string()]
    );
}

#[test]
fn actions_are_considered_in_decision_order() {
    let slot = single_decision_slot(vec![
        Action::new("first_action", Duration::ZERO),
        Action::new("second_action", Duration::ZERO),
        Action::new("third_action", Duration::ZERO),
    ]);
    let (mut publisher, rx) = listening_publisher(
        slot,
        Box::new(TimedFlipFlopDetector::new(FlipFlopConfig::default())),
    );

    publisher.operate().unwrap();
    let seen: Vec<String> = rx.try_iter().collect();
    assert_eq!(
        seen,
        vec![
            "l:first_action".to_string(),
            "l:second_action".to_string(),
            "l:third_action".to_string()
        ]
    );
}

#[test]
fn malformed_decision_is_contained_by_the_execution_boundary() {
    // No decision installed at all: operate() fails, the boundary
    // records the fault and the cycle yields no publications.
    let slot = Arc::new(DecisionSlot::new());
    let (mut publisher, rx) = listening_publisher(
        Arc::clone(&slot),
        Box::new(TimedFlipFlopDetector::new(FlipFlopConfig::default())),
    );

    let stats = StatsCollector::new();
    let mut args = OperationArgs::new(&stats);
    publisher.generate_flow_unit_from_local(&mut args);

    assert_eq!(stats.operate_fault_count("publisher"), 1);
    assert!(rx.try_iter().next().is_none());

    // The next cycle is unaffected once a decision arrives.
    slot.install(vec![Decision::new(
        now_millis(),
        vec![Action::new("expand_cache", Duration::ZERO)],
    )]);
    publisher.generate_flow_unit_from_local(&mut args);
    assert_eq!(stats.operate_fault_count("publisher"), 1);
    assert_eq!(rx.try_iter().count(), 1);
}

#[test]
fn publisher_emits_marker_unit_and_persists_nothing() {
    let slot = single_decision_slot(vec![]);
    let mut publisher = Publisher::new(Duration::from_secs(5), slot);

    let unit = publisher.operate().unwrap();
    assert!(unit.is_empty(), "terminal node output is just a marker");

    let stats = StatsCollector::new();
    let mut args = OperationArgs::new(&stats);
    assert!(publisher.persist_flow_unit(&mut args).is_ok());
}

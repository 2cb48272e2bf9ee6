// src/stats.rs
//! Per-node fault and latency counters, passed explicitly into node
//! execution instead of living behind process-wide statics. The hosting
//! scheduler decides where the snapshot goes (logs, an exporter, a test
//! assertion).

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct StatsCollector {
    inner: Mutex<StatsInner>,
}

#[derive(Debug, Default, Clone)]
struct StatsInner {
    operate_faults: BTreeMap<String, u64>,
    persist_faults: BTreeMap<String, u64>,
    operate_calls: BTreeMap<String, CallStats>,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct CallStats {
    pub count: u64,
    pub total_ms: u64,
}

/// Point-in-time export of all counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub operate_faults: BTreeMap<String, u64>,
    pub persist_faults: BTreeMap<String, u64>,
    pub operate_calls: BTreeMap<String, CallStats>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one `operate()` failure for a node.
    pub fn record_operate_fault(&self, node: &str) {
        let mut inner = self.lock();
        *inner.operate_faults.entry(node.to_string()).or_default() += 1;
    }

    /// Count one persistence failure for a node. Persistence faults are
    /// kept separate so operators can tell lost durability from broken
    /// analysis.
    pub fn record_persist_fault(&self, node: &str) {
        let mut inner = self.lock();
        *inner.persist_faults.entry(node.to_string()).or_default() += 1;
    }

    /// Record the duration of one `operate()` call.
    pub fn record_operate_call(&self, node: &str, elapsed_ms: u64) {
        let mut inner = self.lock();
        let entry = inner.operate_calls.entry(node.to_string()).or_default();
        entry.count += 1;
        entry.total_ms += elapsed_ms;
    }

    pub fn operate_fault_count(&self, node: &str) -> u64 {
        self.lock().operate_faults.get(node).copied().unwrap_or(0)
    }

    pub fn persist_fault_count(&self, node: &str) -> u64 {
        self.lock().persist_faults.get(node).copied().unwrap_or(0)
    }

    pub fn operate_call_count(&self, node: &str) -> u64 {
        self.lock()
            .operate_calls
            .get(node)
            .map(|c| c.count)
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.lock();
        StatsSnapshot {
            operate_faults: inner.operate_faults.clone(),
            persist_faults: inner.persist_faults.clone(),
            operate_calls: inner.operate_calls.clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StatsInner> {
        // A poisoned counter map is still usable; counters are monotonic.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

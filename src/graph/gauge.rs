// src/graph/gauge.rs
//! Leaf evaluator: classifies an externally supplied gauge reading
//! against a threshold. The metric schema and the analytics that decide
//! what a gauge *means* live upstream of this crate; this node only
//! demonstrates the leaf end of the execution contract.

use anyhow::Result;
use std::time::Duration;

use crate::graph::flow_unit::{FlowUnit, HealthContext};
use crate::graph::node::{GraphNode, NodeBase};
use crate::graph::summary::{ColumnSpec, ColumnType, SqlValue, Summary};
use crate::util::now_millis;

/// Source of raw gauge samples, already collected by the metrics layer.
/// `None` means no sample was available this cycle.
pub trait MetricSource: Send {
    fn sample(&mut self) -> Result<Option<f64>>;
}

pub struct GaugeThresholdNode {
    base: NodeBase,
    metric_name: String,
    threshold: f64,
    source: Box<dyn MetricSource>,
}

impl GaugeThresholdNode {
    pub fn new(
        name: impl Into<String>,
        eval_interval: Duration,
        metric_name: impl Into<String>,
        threshold: f64,
        source: Box<dyn MetricSource>,
    ) -> Self {
        Self {
            base: NodeBase::new(name, eval_interval),
            metric_name: metric_name.into(),
            threshold,
            source,
        }
    }
}

impl GraphNode for GaugeThresholdNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn operate(&mut self) -> Result<FlowUnit> {
        let now = now_millis();
        let value = match self.source.sample()? {
            Some(value) => value,
            None => return Ok(FlowUnit::empty(now)),
        };

        if value >= self.threshold {
            // Only breaches are interesting enough to carry an explanation.
            let summary = Summary::new(
                "GaugeBreachSummary",
                vec![
                    ColumnSpec::new("metric", ColumnType::Text),
                    ColumnSpec::new("value", ColumnType::Real),
                    ColumnSpec::new("threshold", ColumnType::Real),
                ],
                vec![
                    SqlValue::Text(self.metric_name.clone()),
                    SqlValue::Real(value),
                    SqlValue::Real(self.threshold),
                ],
            );
            Ok(FlowUnit::with_summary(
                now,
                HealthContext::Unhealthy,
                summary,
            ))
        } else {
            Ok(FlowUnit::new(now, HealthContext::Healthy))
        }
    }
}

//! # Prometheus Metrics
//!
//! Counters and gauges for hold activity. All metrics live in a dedicated
//! [`prometheus::Registry`] prefixed with the `holdfast` namespace, so an
//! embedding service can merge them into its own exposition without
//! collisions.
//!
//! A [`HoldMetrics`] is optional on a token; attach one with
//! [`crate::token::HoldableToken::with_metrics`].

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use holdfast_protocol::config::METRICS_NAMESPACE;
use holdfast_protocol::Amount;

use crate::hold::HoldStatus;

/// Metric handles for one token.
///
/// Cloning is cheap; every handle is reference-counted by prometheus.
#[derive(Clone)]
pub struct HoldMetrics {
    registry: Registry,
    /// Holds successfully placed.
    pub holds_created_total: IntCounter,
    /// Holds executed.
    pub holds_executed_total: IntCounter,
    /// Holds released, labelled by `released_by` ("notary" or "expiration").
    pub holds_released_total: IntCounterVec,
    /// Rejected hold operations, labelled by `operation`.
    pub holds_rejected_total: IntCounterVec,
    /// Number of holds currently `Held`.
    pub active_holds: IntGauge,
    /// Total value currently on hold.
    pub value_on_hold: IntGauge,
}

impl HoldMetrics {
    /// Creates and registers all metrics.
    ///
    /// # Errors
    ///
    /// Fails only if a metric definition is rejected by prometheus.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some(METRICS_NAMESPACE.into()), None)?;

        let holds_created_total =
            IntCounter::new("holds_created_total", "Total number of holds placed")?;
        registry.register(Box::new(holds_created_total.clone()))?;

        let holds_executed_total =
            IntCounter::new("holds_executed_total", "Total number of holds executed")?;
        registry.register(Box::new(holds_executed_total.clone()))?;

        let holds_released_total = IntCounterVec::new(
            Opts::new("holds_released_total", "Total number of holds released"),
            &["released_by"],
        )?;
        registry.register(Box::new(holds_released_total.clone()))?;

        let holds_rejected_total = IntCounterVec::new(
            Opts::new(
                "holds_rejected_total",
                "Total number of rejected hold operations",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(holds_rejected_total.clone()))?;

        let active_holds = IntGauge::new("active_holds", "Number of holds currently held")?;
        registry.register(Box::new(active_holds.clone()))?;

        let value_on_hold = IntGauge::new("value_on_hold", "Total value currently on hold")?;
        registry.register(Box::new(value_on_hold.clone()))?;

        Ok(Self {
            registry,
            holds_created_total,
            holds_executed_total,
            holds_released_total,
            holds_rejected_total,
            active_holds,
            value_on_hold,
        })
    }

    /// Records a release with the resulting status.
    pub fn record_release(&self, status: HoldStatus) {
        let label = match status {
            HoldStatus::ReleasedOnExpiration => "expiration",
            _ => "notary",
        };
        self.holds_released_total.with_label_values(&[label]).inc();
    }

    /// Records a rejected `operation` ("hold", "release" or "execute").
    pub fn record_rejection(&self, operation: &str) {
        self.holds_rejected_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Refreshes the gauges from the current ledger state.
    pub fn observe_state(&self, active_holds: usize, value_on_hold: Amount) {
        self.active_holds.set(i64::try_from(active_holds).unwrap_or(i64::MAX));
        self.value_on_hold.set(i64::try_from(value_on_hold).unwrap_or(i64::MAX));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for HoldMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HoldMetrics")
            .field("holds_created_total", &self.holds_created_total.get())
            .field("holds_executed_total", &self.holds_executed_total.get())
            .field("active_holds", &self.active_holds.get())
            .field("value_on_hold", &self.value_on_hold.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_namespace() {
        let metrics = HoldMetrics::new().unwrap();
        metrics.holds_created_total.inc();
        metrics.record_release(HoldStatus::Released);
        metrics.record_rejection("execute");
        metrics.observe_state(1, 30);

        let text = metrics.encode().unwrap();
        assert!(text.contains("holdfast_holds_created_total 1"));
        assert!(text.contains("holdfast_holds_released_total{released_by=\"notary\"} 1"));
        assert!(text.contains("holdfast_holds_rejected_total{operation=\"execute\"} 1"));
        assert!(text.contains("holdfast_value_on_hold 30"));
    }

    #[test]
    fn gauges_saturate_at_i64_max() {
        let metrics = HoldMetrics::new().unwrap();
        metrics.observe_state(0, u64::MAX);
        assert_eq!(metrics.value_on_hold.get(), i64::MAX);
    }

    #[test]
    fn separate_instances_do_not_share_state() {
        let a = HoldMetrics::new().unwrap();
        let b = HoldMetrics::new().unwrap();
        a.holds_executed_total.inc();
        assert_eq!(b.holds_executed_total.get(), 0);
    }
}

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::domain::errors::DomainError;
use crate::domain::event::EventType;

/// Metrics handle passed into the service. Owns its registry.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub order_events_total: IntCounterVec,
    pub order_failures_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let order_events_total = IntCounterVec::new(
            Opts::new("pvz_order_events_total", "Committed order events by type"),
            &["event_type"],
        )
        .expect("valid pvz_order_events_total metric");

        let order_failures_total = IntCounterVec::new(
            Opts::new("pvz_order_failures_total", "Rejected order operations by error code"),
            &["code"],
        )
        .expect("valid pvz_order_failures_total metric");

        registry
            .register(Box::new(order_events_total.clone()))
            .expect("register pvz_order_events_total");
        registry
            .register(Box::new(order_failures_total.clone()))
            .expect("register pvz_order_failures_total");

        Self {
            registry,
            order_events_total,
            order_failures_total,
        }
    }

    pub fn record_event(&self, event_type: EventType) {
        self.order_events_total
            .with_label_values(&[event_type.as_str()])
            .inc();
    }

    pub fn record_failure(&self, err: &DomainError) {
        self.order_failures_total
            .with_label_values(&[err.code()])
            .inc();
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_recorded_counters() {
        let metrics = Metrics::new();
        metrics.record_event(EventType::OrderIssued);
        metrics.record_failure(&DomainError::WeightTooHeavy);

        let text = metrics.encode().unwrap();
        assert!(text.contains("pvz_order_events_total{event_type=\"order_issued\"} 1"));
        assert!(text.contains("pvz_order_failures_total{code=\"WEIGHT_TOO_HEAVY\"} 1"));
    }
}

mod server;

use std::time::Duration;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};

use crate::utils::CircuitState;

pub use server::start_metrics_server;

// ============================================================================
// Metrics - Prometheus instruments for the order service
// ============================================================================
//
// - Inbound RPC commands (count by outcome, latency)
// - Product validation calls to the product service
// - Product-service circuit breaker state
//
// Scraped via GET /metrics on the metrics server.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub rpc_requests_total: IntCounterVec,
    pub rpc_request_duration: HistogramVec,

    pub product_validation_total: IntCounterVec,
    pub product_validation_duration: HistogramVec,

    pub circuit_breaker_state: IntGauge,
}

const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let rpc_requests_total = IntCounterVec::new(
            Opts::new("rpc_requests_total", "Order commands handled, by outcome"),
            &["cmd", "outcome"],
        )?;
        registry.register(Box::new(rpc_requests_total.clone()))?;

        let rpc_request_duration = HistogramVec::new(
            HistogramOpts::new("rpc_request_duration_seconds", "Order command handling duration")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["cmd"],
        )?;
        registry.register(Box::new(rpc_request_duration.clone()))?;

        let product_validation_total = IntCounterVec::new(
            Opts::new("product_validation_total", "validateProducts calls, by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(product_validation_total.clone()))?;

        let product_validation_duration = HistogramVec::new(
            HistogramOpts::new(
                "product_validation_duration_seconds",
                "validateProducts round-trip duration",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["outcome"],
        )?;
        registry.register(Box::new(product_validation_duration.clone()))?;

        let circuit_breaker_state = IntGauge::new(
            "circuit_breaker_state",
            "Product service circuit breaker (0=Closed, 1=HalfOpen, 2=Open)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            rpc_requests_total,
            rpc_request_duration,
            product_validation_total,
            product_validation_duration,
            circuit_breaker_state,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_request(&self, cmd: &str, outcome: &str, elapsed: Duration) {
        self.rpc_requests_total.with_label_values(&[cmd, outcome]).inc();
        self.rpc_request_duration
            .with_label_values(&[cmd])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_product_validation(&self, outcome: &str, elapsed: Duration) {
        self.product_validation_total.with_label_values(&[outcome]).inc();
        self.product_validation_duration
            .with_label_values(&[outcome])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_circuit_state(&self, state: CircuitState) {
        self.circuit_breaker_state.set(state.as_gauge());
    }
}

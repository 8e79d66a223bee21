use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub status_transitions_total: IntCounterVec,
    pub transition_conflicts_total: IntCounter,
    pub dispatch_operations_total: IntCounterVec,
    pub proof_uploads_total: IntCounterVec,
    pub operation_latency_seconds: HistogramVec,
    pub orders_open: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let status_transitions_total = IntCounterVec::new(
            Opts::new("status_transitions_total", "Committed order status transitions"),
            &["status"],
        )
        .expect("valid status_transitions_total metric");

        let transition_conflicts_total = IntCounter::new(
            "transition_conflicts_total",
            "Transitions rejected because the order changed concurrently",
        )
        .expect("valid transition_conflicts_total metric");

        let dispatch_operations_total = IntCounterVec::new(
            Opts::new("dispatch_operations_total", "Dispatch operations by outcome"),
            &["operation", "outcome"],
        )
        .expect("valid dispatch_operations_total metric");

        let proof_uploads_total = IntCounterVec::new(
            Opts::new("proof_uploads_total", "Proof-of-pickup submissions by outcome"),
            &["outcome"],
        )
        .expect("valid proof_uploads_total metric");

        let operation_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "operation_latency_seconds",
                "Latency of core order operations in seconds",
            ),
            &["operation"],
        )
        .expect("valid operation_latency_seconds metric");

        let orders_open = IntGauge::new("orders_open", "Orders not yet completed or cancelled")
            .expect("valid orders_open metric");

        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(transition_conflicts_total.clone()))
            .expect("register transition_conflicts_total");
        registry
            .register(Box::new(dispatch_operations_total.clone()))
            .expect("register dispatch_operations_total");
        registry
            .register(Box::new(proof_uploads_total.clone()))
            .expect("register proof_uploads_total");
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .expect("register operation_latency_seconds");
        registry
            .register(Box::new(orders_open.clone()))
            .expect("register orders_open");

        Self {
            registry,
            status_transitions_total,
            transition_conflicts_total,
            dispatch_operations_total,
            proof_uploads_total,
            operation_latency_seconds,
            orders_open,
        }
    }

    pub fn record_dispatch(&self, operation: &str, outcome: &str) {
        self.dispatch_operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn observe_latency(&self, operation: &str, seconds: f64) {
        self.operation_latency_seconds
            .with_label_values(&[operation])
            .observe(seconds);
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

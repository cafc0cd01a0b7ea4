use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub claims_total: IntCounterVec,
    pub transitions_total: IntCounterVec,
    pub transition_latency_seconds: HistogramVec,
    pub connected_drivers: IntGauge,
    pub events_delivered_total: IntCounterVec,
    pub tracking_links_total: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let claims_total = IntCounterVec::new(
            Opts::new("claims_total", "Order claim attempts by outcome"),
            &["outcome"],
        )
        .expect("valid claims_total metric");

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Applied order lifecycle transitions"),
            &["transition"],
        )
        .expect("valid transitions_total metric");

        let transition_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "transition_latency_seconds",
                "Latency of lifecycle transitions in seconds",
            ),
            &["transition"],
        )
        .expect("valid transition_latency_seconds metric");

        let connected_drivers =
            IntGauge::new("connected_drivers", "Driver event streams currently open")
                .expect("valid connected_drivers metric");

        let events_delivered_total = IntCounterVec::new(
            Opts::new("events_delivered_total", "Driver events handed to live streams"),
            &["kind"],
        )
        .expect("valid events_delivered_total metric");

        let tracking_links_total = IntCounterVec::new(
            Opts::new("tracking_links_total", "Tracking link operations by outcome"),
            &["outcome"],
        )
        .expect("valid tracking_links_total metric");

        registry
            .register(Box::new(claims_total.clone()))
            .expect("register claims_total");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(transition_latency_seconds.clone()))
            .expect("register transition_latency_seconds");
        registry
            .register(Box::new(connected_drivers.clone()))
            .expect("register connected_drivers");
        registry
            .register(Box::new(events_delivered_total.clone()))
            .expect("register events_delivered_total");
        registry
            .register(Box::new(tracking_links_total.clone()))
            .expect("register tracking_links_total");

        Self {
            registry,
            claims_total,
            transitions_total,
            transition_latency_seconds,
            connected_drivers,
            events_delivered_total,
            tracking_links_total,
        }
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

use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub offers_total: IntCounterVec,
    pub accept_conflicts_total: IntCounter,
    pub match_requests_total: IntCounterVec,
    pub match_latency_seconds: HistogramVec,
    pub directory_failures_total: IntCounterVec,
    pub cache_errors_total: IntCounterVec,
    pub scheduled_auto_accepts: IntGauge,
    pub sweep_transitions_total: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let offers_total = IntCounterVec::new(
            Opts::new("offers_total", "Offer lifecycle transitions by outcome"),
            &["outcome"],
        )
        .expect("valid offers_total metric");

        let accept_conflicts_total = IntCounter::new(
            "accept_conflicts_total",
            "Accept attempts rejected because the offer or request changed state",
        )
        .expect("valid accept_conflicts_total metric");

        let match_requests_total = IntCounterVec::new(
            Opts::new("match_requests_total", "Match lookups by outcome"),
            &["outcome"],
        )
        .expect("valid match_requests_total metric");

        let match_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "match_latency_seconds",
                "Latency of match computation in seconds",
            ),
            &["outcome"],
        )
        .expect("valid match_latency_seconds metric");

        let directory_failures_total = IntCounterVec::new(
            Opts::new(
                "directory_failures_total",
                "Trip directory calls that timed out or failed",
            ),
            &["reason"],
        )
        .expect("valid directory_failures_total metric");

        let cache_errors_total = IntCounterVec::new(
            Opts::new("cache_errors_total", "Cache operations that failed"),
            &["op"],
        )
        .expect("valid cache_errors_total metric");

        let scheduled_auto_accepts = IntGauge::new(
            "scheduled_auto_accepts",
            "Auto-accept attempts waiting to fire",
        )
        .expect("valid scheduled_auto_accepts metric");

        let sweep_transitions_total = IntCounterVec::new(
            Opts::new(
                "sweep_transitions_total",
                "Records transitioned by the expiration sweep",
            ),
            &["kind"],
        )
        .expect("valid sweep_transitions_total metric");

        registry
            .register(Box::new(offers_total.clone()))
            .expect("register offers_total");
        registry
            .register(Box::new(accept_conflicts_total.clone()))
            .expect("register accept_conflicts_total");
        registry
            .register(Box::new(match_requests_total.clone()))
            .expect("register match_requests_total");
        registry
            .register(Box::new(match_latency_seconds.clone()))
            .expect("register match_latency_seconds");
        registry
            .register(Box::new(directory_failures_total.clone()))
            .expect("register directory_failures_total");
        registry
            .register(Box::new(cache_errors_total.clone()))
            .expect("register cache_errors_total");
        registry
            .register(Box::new(scheduled_auto_accepts.clone()))
            .expect("register scheduled_auto_accepts");
        registry
            .register(Box::new(sweep_transitions_total.clone()))
            .expect("register sweep_transitions_total");

        Self {
            registry,
            offers_total,
            accept_conflicts_total,
            match_requests_total,
            match_latency_seconds,
            directory_failures_total,
            cache_errors_total,
            scheduled_auto_accepts,
            sweep_transitions_total,
        }
    }

    pub fn offer_outcome(&self, outcome: &str) {
        self.offers_total.with_label_values(&[outcome]).inc();
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

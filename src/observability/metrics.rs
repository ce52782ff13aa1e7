use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub parcels_created_total: IntCounter,
    pub transitions_total: IntCounterVec,
    pub transition_latency_seconds: HistogramVec,
    pub geocode_requests_total: IntCounterVec,
    pub geocode_cache_hits_total: IntCounter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let parcels_created_total =
            IntCounter::new("parcels_created_total", "Total parcels created")
                .expect("valid parcels_created_total metric");

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Parcel transitions by action and outcome"),
            &["action", "outcome"],
        )
        .expect("valid transitions_total metric");

        let transition_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "transition_latency_seconds",
                "Latency of applying a parcel transition in seconds",
            ),
            &["action"],
        )
        .expect("valid transition_latency_seconds metric");

        let geocode_requests_total = IntCounterVec::new(
            Opts::new(
                "geocode_requests_total",
                "Geocoder lookups by operation and outcome",
            ),
            &["operation", "outcome"],
        )
        .expect("valid geocode_requests_total metric");

        let geocode_cache_hits_total =
            IntCounter::new("geocode_cache_hits_total", "Geocoder cache hits")
                .expect("valid geocode_cache_hits_total metric");

        registry
            .register(Box::new(parcels_created_total.clone()))
            .expect("register parcels_created_total");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(transition_latency_seconds.clone()))
            .expect("register transition_latency_seconds");
        registry
            .register(Box::new(geocode_requests_total.clone()))
            .expect("register geocode_requests_total");
        registry
            .register(Box::new(geocode_cache_hits_total.clone()))
            .expect("register geocode_cache_hits_total");

        Self {
            registry,
            parcels_created_total,
            transitions_total,
            transition_latency_seconds,
            geocode_requests_total,
            geocode_cache_hits_total,
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

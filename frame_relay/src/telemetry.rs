use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;
use std::collections::HashSet;

pub struct Metrics {
    frames_uploaded: Counter<u64>,
    dispatches: Counter<u64>,
    dispatch_duration: Histogram<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        // TODO: opentelemetry-prometheus is deprecated, move to an OTLP exporter
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build prometheus exporter: {}", e))?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("frame_relay");
        global::set_meter_provider(provider);

        let frames_uploaded = meter
            .u64_counter("frames_uploaded_total")
            .with_description("Total number of frames accepted from the camera")
            .build();

        let dispatches = meter
            .u64_counter("dispatches_total")
            .with_description("Total number of AI dispatches by source and outcome")
            .build();

        // The inference call is bounded by its timeout, so buckets stop at 30s.
        let boundaries = generate_boundaries((50, 500, 2_000, 10_000, 30_000));

        let dispatch_duration = meter
            .u64_histogram("dispatch_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Duration of AI dispatches in milliseconds")
            .build();

        Ok(Metrics {
            frames_uploaded,
            dispatches,
            dispatch_duration,
            registry,
        })
    }

    pub fn record_upload(&self) {
        self.frames_uploaded.add(1, &[]);
    }

    pub fn record_dispatch(&self, source: &str, outcome: &str, duration_ms: u64) {
        let attributes = vec![
            KeyValue::new("source", source.to_string()),
            KeyValue::new("outcome", outcome.to_string()),
        ];
        self.dispatches.add(1, &attributes);

        let attributes = vec![KeyValue::new("source", source.to_string())];
        self.dispatch_duration.record(duration_ms, &attributes);
    }
}

fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    let first_step: usize = 50;
    let middle_step: usize = 250;
    let end_step: usize = 2_000;
    let tail_step: usize = 5_000;
    let first_part = (parts.0..=parts.1).step_by(first_step);
    let middle_part = (parts.1..=parts.2).step_by(middle_step);
    let end_part = (parts.2..=parts.3).step_by(end_step);
    let tail_part = (parts.3..=parts.4).step_by(tail_step);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}

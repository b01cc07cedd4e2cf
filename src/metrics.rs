use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // Pre-register counters so they appear even before the first increment.
    counter!("events_normalized_total").absolute(0);
    counter!("events_applied_total").absolute(0);
    counter!("events_duplicate_total").absolute(0);
    counter!("events_parked_total").absolute(0);
    counter!("schema_rejections_total").absolute(0);
    counter!("terminal_conflicts_total").absolute(0);
    counter!("deadline_reads_exhausted_total").absolute(0);

    // Pre-register gauges at zero.
    gauge!("watched_wagers").set(0.0);

    // Histogram is lazily created on first record; force creation.
    histogram!("apply_latency_seconds").record(0.0);

    handle
}

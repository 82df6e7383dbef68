use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("crawler_runs_total", "Total source crawl attempts.");
        describe_counter!(
            "crawler_sources_crawled_total",
            "Sources handed to the orchestrator by bucket runs."
        );
        describe_counter!(
            "crawler_items_fetched_total",
            "Raw items returned by fetch adapters."
        );
        describe_counter!(
            "crawler_articles_found_total",
            "Items that entered dedup evaluation."
        );
        describe_counter!(
            "crawler_articles_new_total",
            "Items stored as new articles."
        );
        describe_counter!(
            "crawler_duplicates_total",
            "Items classified as duplicates, labeled by kind."
        );
        describe_counter!(
            "crawler_crawl_errors_total",
            "Crawls that ended in the error state."
        );
        describe_counter!(
            "crawler_bucket_skipped_total",
            "Bucket ticks skipped because the previous run was still in flight."
        );
        describe_histogram!(
            "crawler_fetch_parse_ms",
            "Adapter parse time in milliseconds."
        );
        describe_gauge!("crawler_last_run_ts", "Unix ts when a crawl last completed.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder.
    pub fn init() -> Self {
        // Use default buckets to avoid API differences across crate versions.
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        ensure_metrics_described();
        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

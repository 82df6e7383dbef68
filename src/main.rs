//! Newswire Crawler — Binary Entrypoint
//! Boots the Axum admin surface, wires the in-memory store, orchestrator,
//! and frequency scheduler, and spawns one background tick loop per bucket.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newswire_crawler::api::{self, AppState};
use newswire_crawler::crawl::adapters::AdapterSet;
use newswire_crawler::crawl::config::load_config_default;
use newswire_crawler::crawl::scheduler::FrequencyScheduler;
use newswire_crawler::crawl::CrawlOrchestrator;
use newswire_crawler::metrics::Metrics;
use newswire_crawler::store::{ContentStore, MemoryStore};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - CRAWLER_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("CRAWLER_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newswire_crawler=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments. This enables
    // CRAWLER_CONFIG_PATH / CRAWLER_DEV_LOG from .env.
    let _ = dotenvy::dotenv();

    // Initialize dev tracing early (no-op in production).
    enable_dev_tracing();

    let config = load_config_default().expect("Failed to load crawler config");

    let store: Arc<dyn ContentStore> = Arc::new(MemoryStore::new());
    let orchestrator = Arc::new(CrawlOrchestrator::new(
        store.clone(),
        Arc::new(AdapterSet::new()),
        config,
    ));
    let scheduler = Arc::new(FrequencyScheduler::new(store.clone(), orchestrator.clone()));

    // One tick loop per frequency bucket; handles live as long as the app.
    let _handles = scheduler.clone().spawn();

    let metrics = Metrics::init();
    let state = AppState {
        store,
        orchestrator,
        scheduler,
    };
    let router = api::create_router(state).merge(metrics.router());

    Ok(router.into())
}

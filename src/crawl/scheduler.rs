//! # Frequency Scheduler
//! Five independent buckets (5/10/15/30/60 min). Each bucket ticks on its
//! own interval and crawls every due source; a tick that arrives while the
//! previous run of the SAME bucket is still executing is a deliberate skip
//! with a zero-count summary, not an error. Different buckets run freely in
//! parallel.

use metrics::counter;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::CrawlOrchestrator;
use crate::model::CrawlFrequency;
use crate::store::ContentStore;

/// Aggregate result of one bucket run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketSummary {
    pub total: u32,
    pub successful: u32,
    pub failed: u32,
    pub articles_new: u32,
}

/// Clears the bucket's busy flag when dropped, so every exit path of
/// `run_bucket` releases the bucket, early returns and panics included.
struct BucketGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BucketGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct FrequencyScheduler {
    store: Arc<dyn ContentStore>,
    orchestrator: Arc<CrawlOrchestrator>,
    busy: [AtomicBool; 5],
}

impl FrequencyScheduler {
    pub fn new(store: Arc<dyn ContentStore>, orchestrator: Arc<CrawlOrchestrator>) -> Self {
        Self {
            store,
            orchestrator,
            busy: std::array::from_fn(|_| AtomicBool::new(false)),
        }
    }

    fn try_acquire(&self, frequency: CrawlFrequency) -> Option<BucketGuard<'_>> {
        let flag = &self.busy[frequency.index()];
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| BucketGuard { flag })
    }

    /// Run every due source in one frequency bucket. Overlap with a still-
    /// running tick of the same bucket returns an immediate zero summary.
    pub async fn run_bucket(&self, frequency: CrawlFrequency) -> BucketSummary {
        let Some(_guard) = self.try_acquire(frequency) else {
            info!(
                minutes = frequency.minutes(),
                "bucket run already in progress, skipping"
            );
            counter!("crawler_bucket_skipped_total").increment(1);
            return BucketSummary::default();
        };

        let due = match self.store.find_sources_due_for_crawl(frequency).await {
            Ok(sources) => sources,
            Err(e) => {
                warn!(
                    minutes = frequency.minutes(),
                    error = %format!("{e:#}"),
                    "fetching due sources failed"
                );
                return BucketSummary::default();
            }
        };

        let mut summary = BucketSummary {
            total: due.len() as u32,
            ..BucketSummary::default()
        };
        for source in &due {
            match self.orchestrator.crawl_source(source).await {
                Ok(report) if report.success => {
                    summary.successful += 1;
                    summary.articles_new += report.articles_new;
                }
                Ok(_) => summary.failed += 1,
                Err(e) => {
                    warn!(source = %source.name, error = %format!("{e:#}"), "source crawl failed");
                    summary.failed += 1;
                }
            }
        }

        counter!("crawler_sources_crawled_total").increment(u64::from(summary.total));
        info!(
            minutes = frequency.minutes(),
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            articles_new = summary.articles_new,
            "bucket run complete"
        );
        summary
    }

    /// Start one interval loop per bucket. Sources that fail are retried at
    /// the next natural tick of their bucket; there is no internal backoff.
    pub fn spawn(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        CrawlFrequency::ALL
            .iter()
            .map(|&frequency| {
                let scheduler = Arc::clone(&self);
                tokio::spawn(async move {
                    let period =
                        std::time::Duration::from_secs(u64::from(frequency.minutes()) * 60);
                    let mut ticker = tokio::time::interval(period);
                    loop {
                        ticker.tick().await;
                        scheduler.run_bucket(frequency).await;
                    }
                })
            })
            .collect()
    }
}

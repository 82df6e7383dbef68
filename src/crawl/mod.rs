//! # Crawl Orchestrator
//! Runs one source end-to-end: fetch → per-item dedup → store → record
//! outcome. The outcome is deterministic no matter how the adapter or
//! individual items fail: adapter errors end the crawl as `error` with zero
//! items processed, per-item errors are collected and never abort the batch.

pub mod adapters;
pub mod config;
pub mod scheduler;

use anyhow::Result;
use chrono::Utc;
use metrics::{counter, gauge};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dedup::{
    extract_key_phrases, fingerprint_hash, item_content_hash, normalize_title, DedupConfig,
    DedupEngine,
};
use crate::metrics::ensure_metrics_described;
use crate::model::{Article, DuplicateCounts, DuplicateKind, NewArticle, Source};
use crate::store::{ContentStore, CrawlMetrics};
use adapters::{FetchDispatch, FetchError, FetchedItem};
use config::CrawlerConfig;

/// Summary of one `crawl_source` run.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub crawl_id: Uuid,
    pub source_id: Uuid,
    pub success: bool,
    pub articles_found: u32,
    pub articles_new: u32,
    pub duplicates: DuplicateCounts,
    /// Per-item failures; the crawl itself can still be a success.
    pub errors: Vec<String>,
    /// Fatal adapter or aggregation error.
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl CrawlReport {
    fn failed(crawl_id: Uuid, source_id: Uuid, message: String, duration_ms: u64) -> Self {
        Self {
            crawl_id,
            source_id,
            success: false,
            articles_found: 0,
            articles_new: 0,
            duplicates: DuplicateCounts::default(),
            errors: Vec::new(),
            error: Some(message),
            duration_ms,
        }
    }
}

/// Response shape for the ad-hoc single-source trigger. Internal errors are
/// captured, not propagated, so a caller driving many sources in a loop is
/// never interrupted by one bad source.
#[derive(Debug, Clone, Serialize)]
pub struct ManualCrawlResult {
    pub success: bool,
    pub articles_new: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

enum ItemOutcome {
    New(Box<Article>),
    Duplicate(DuplicateKind),
}

pub struct CrawlOrchestrator {
    store: Arc<dyn ContentStore>,
    fetcher: Arc<dyn FetchDispatch>,
    dedup: DedupEngine,
    config: CrawlerConfig,
}

impl CrawlOrchestrator {
    pub fn new(
        store: Arc<dyn ContentStore>,
        fetcher: Arc<dyn FetchDispatch>,
        config: CrawlerConfig,
    ) -> Self {
        let dedup = DedupEngine::new(store.clone());
        Self {
            store,
            fetcher,
            dedup,
            config,
        }
    }

    /// Crawl one source. The initial `record_crawl_start` is the single
    /// store call allowed to propagate: a store that cannot create the
    /// execution record is a data-integrity failure and should be loud.
    pub async fn crawl_source(&self, source: &Source) -> Result<CrawlReport> {
        ensure_metrics_described();
        let t0 = Instant::now();
        let crawl = self.store.record_crawl_start(source.id).await?;
        counter!("crawler_runs_total").increment(1);

        let deadline = std::time::Duration::from_secs(self.config.fetch_timeout_secs);
        let fetched = match tokio::time::timeout(deadline, self.fetcher.fetch(source)).await {
            Ok(res) => res,
            Err(_) => Err(FetchError::TimedOut(self.config.fetch_timeout_secs)),
        };

        let items = match fetched {
            Ok(items) => items,
            Err(e) => {
                let message = e.to_string();
                let duration_ms = elapsed_ms(t0);
                warn!(source = %source.name, error = %message, "adapter fetch failed");
                counter!("crawler_crawl_errors_total").increment(1);
                self.finish_error(crawl.id, source, &message, duration_ms).await;
                return Ok(CrawlReport::failed(crawl.id, source.id, message, duration_ms));
            }
        };

        let mut new_articles: Vec<Article> = Vec::new();
        let mut duplicates = DuplicateCounts::default();
        let mut errors = Vec::new();
        for item in &items {
            match self.process_item(source, item).await {
                Ok(ItemOutcome::New(article)) => new_articles.push(*article),
                Ok(ItemOutcome::Duplicate(kind)) => {
                    duplicates.bump(kind);
                    counter!("crawler_duplicates_total", "kind" => kind.as_str()).increment(1);
                }
                // One bad item never aborts the batch.
                Err(e) => errors.push(format!("Failed to process item {}: {e:#}", item.url)),
            }
        }

        let metrics = CrawlMetrics {
            articles_found: items.len() as u32,
            articles_new: new_articles.len() as u32,
            duplicates,
            duration_ms: elapsed_ms(t0),
        };

        // Writing the aggregate outcome is the systemic failure point: every
        // per-item failure is already captured above.
        if let Err(e) = self.store.record_crawl_success(crawl.id, metrics).await {
            let message = format!("recording crawl outcome: {e:#}");
            let duration_ms = elapsed_ms(t0);
            warn!(source = %source.name, error = %message, "crawl aggregation failed");
            counter!("crawler_crawl_errors_total").increment(1);
            self.finish_error(crawl.id, source, &message, duration_ms).await;
            return Ok(CrawlReport::failed(crawl.id, source.id, message, duration_ms));
        }
        if let Err(e) = self.store.mark_source_success(source.id, Utc::now()).await {
            warn!(source = %source.name, error = %format!("{e:#}"), "source bookkeeping failed");
        }

        counter!("crawler_articles_found_total").increment(u64::from(metrics.articles_found));
        counter!("crawler_articles_new_total").increment(u64::from(metrics.articles_new));
        gauge!("crawler_last_run_ts").set(Utc::now().timestamp() as f64);
        info!(
            source = %source.name,
            found = metrics.articles_found,
            new = metrics.articles_new,
            duplicates = duplicates.total(),
            item_errors = errors.len(),
            duration_ms = metrics.duration_ms,
            "crawl finished"
        );

        Ok(CrawlReport {
            crawl_id: crawl.id,
            source_id: source.id,
            success: true,
            articles_found: metrics.articles_found,
            articles_new: metrics.articles_new,
            duplicates,
            errors,
            error: None,
            duration_ms: metrics.duration_ms,
        })
    }

    /// Same path as `crawl_source`, with every failure folded into the
    /// response object. Bypasses the scheduler's bucket guard by design.
    pub async fn crawl_source_manual(&self, source: &Source) -> ManualCrawlResult {
        match self.crawl_source(source).await {
            Ok(report) => ManualCrawlResult {
                success: report.success,
                articles_new: report.articles_new,
                error: report.error,
            },
            Err(e) => ManualCrawlResult {
                success: false,
                articles_new: 0,
                error: Some(format!("{e:#}")),
            },
        }
    }

    async fn process_item(&self, source: &Source, item: &FetchedItem) -> Result<ItemOutcome> {
        let hash = item_content_hash(item.title.as_deref(), item.content.as_deref(), &item.url);
        let dedup_cfg = self.dedup_config_for(source);
        let verdict = self
            .dedup
            .check_duplicate(
                source.org_id,
                source.id,
                &hash,
                item.title.as_deref(),
                item.content.as_deref(),
                &dedup_cfg,
            )
            .await?;

        if let Some(kind) = verdict.duplicate_type {
            return Ok(ItemOutcome::Duplicate(kind));
        }

        let title = item.title.as_deref().unwrap_or_default();
        let content = item.content.as_deref().unwrap_or_default();
        let key_phrases = extract_key_phrases(title, content);
        let article = self
            .store
            .insert_article(NewArticle {
                org_id: source.org_id,
                source_id: source.id,
                url: item.url.clone(),
                title: item.title.clone(),
                content: item.content.clone(),
                summary: item.summary.clone(),
                author: item.author.clone(),
                published_at: item.published_at,
                content_hash: hash,
                title_normalized: normalize_title(title),
                fingerprint_hash: fingerprint_hash(&key_phrases),
                key_phrases,
                raw_data: item.raw_data.clone(),
            })
            .await?;
        Ok(ItemOutcome::New(Box::new(article)))
    }

    /// A source may override the dedup knobs via a `dedup` object in its
    /// crawl_config; otherwise the service-wide config applies.
    fn dedup_config_for(&self, source: &Source) -> DedupConfig {
        source
            .crawl_config
            .get("dedup")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or(self.config.dedup)
    }

    async fn finish_error(&self, crawl_id: Uuid, source: &Source, message: &str, duration_ms: u64) {
        if let Err(e) = self
            .store
            .record_crawl_error(crawl_id, message, duration_ms)
            .await
        {
            warn!(source = %source.name, error = %format!("{e:#}"), "recording crawl error failed");
        }
        if let Err(e) = self.store.mark_source_error(source.id, message).await {
            warn!(source = %source.name, error = %format!("{e:#}"), "source bookkeeping failed");
        }
    }
}

fn elapsed_ms(t0: Instant) -> u64 {
    t0.elapsed().as_millis() as u64
}

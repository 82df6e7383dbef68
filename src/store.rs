//! # Content Store
//! Accessor contract consumed by the dedup engine, the orchestrator, and the
//! scheduler, plus the in-memory reference implementation used for local
//! runs and tests. A hosted-database client would implement the same trait.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::model::{
    Article, CrawlFrequency, CrawlStatus, DuplicateCounts, NewArticle, Source, SourceCrawl,
    SourceSpec,
};

/// Candidate row for the fuzzy-title layer.
#[derive(Debug, Clone)]
pub struct FingerprintRow {
    pub article_id: Uuid,
    pub title_normalized: String,
    pub key_phrases: Vec<String>,
}

/// Candidate row for the phrase-overlap layer.
#[derive(Debug, Clone)]
pub struct PhraseRow {
    pub article_id: Uuid,
    pub key_phrases: Vec<String>,
}

/// Aggregate outcome written when a crawl completes successfully.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrawlMetrics {
    pub articles_found: u32,
    pub articles_new: u32,
    pub duplicates: DuplicateCounts,
    pub duration_ms: u64,
}

#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    // --- article lookups (dedup layers) ---
    async fn find_article_by_content_hash(
        &self,
        org_id: Uuid,
        content_hash: &str,
    ) -> Result<Option<Article>>;

    async fn check_content_hash_exists_elsewhere(
        &self,
        org_id: Uuid,
        content_hash: &str,
        exclude_source_id: Uuid,
    ) -> Result<bool>;

    /// Recent fingerprints, newest first.
    async fn find_recent_fingerprints(
        &self,
        org_id: Uuid,
        hours_back: u32,
        limit: usize,
    ) -> Result<Vec<FingerprintRow>>;

    /// Articles sharing at least one key phrase with the candidate, newest first.
    async fn find_articles_by_phrase_overlap(
        &self,
        org_id: Uuid,
        phrases: &[String],
        hours_back: u32,
        limit: usize,
    ) -> Result<Vec<PhraseRow>>;

    // --- article writes ---
    /// Insert-or-fetch: a conflict on the per-org `content_hash` unique key
    /// resolves to the pre-existing row instead of raising.
    async fn insert_article(&self, article: NewArticle) -> Result<Article>;

    async fn count_articles_for_source(&self, org_id: Uuid, source_id: Uuid) -> Result<u64>;

    // --- sources ---
    async fn find_or_create_source(&self, spec: SourceSpec) -> Result<Source>;

    async fn get_source(&self, id: Uuid) -> Result<Option<Source>>;

    async fn find_sources_due_for_crawl(&self, frequency: CrawlFrequency) -> Result<Vec<Source>>;

    async fn mark_source_success(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;

    async fn mark_source_error(&self, id: Uuid, message: &str) -> Result<()>;

    // --- crawl execution records ---
    async fn record_crawl_start(&self, source_id: Uuid) -> Result<SourceCrawl>;

    async fn record_crawl_success(&self, crawl_id: Uuid, metrics: CrawlMetrics) -> Result<()>;

    async fn record_crawl_error(
        &self,
        crawl_id: Uuid,
        message: &str,
        duration_ms: u64,
    ) -> Result<()>;

    /// External-watchdog contract: same shape as the error transition with a
    /// fixed message. Never called by the orchestrator itself.
    async fn record_crawl_timeout(&self, crawl_id: Uuid, duration_ms: u64) -> Result<()>;

    async fn recent_crawls(&self, limit: usize) -> Result<Vec<SourceCrawl>>;
}

/// In-memory store. All durable state behind one mutex; no await points
/// while the lock is held.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    sources: HashMap<Uuid, Source>,
    articles: Vec<Article>,
    crawls: Vec<SourceCrawl>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("store mutex poisoned")
    }
}

fn window_start(hours_back: u32) -> DateTime<Utc> {
    Utc::now() - Duration::hours(i64::from(hours_back))
}

#[async_trait::async_trait]
impl ContentStore for MemoryStore {
    async fn find_article_by_content_hash(
        &self,
        org_id: Uuid,
        content_hash: &str,
    ) -> Result<Option<Article>> {
        let inner = self.lock();
        Ok(inner
            .articles
            .iter()
            .find(|a| a.org_id == org_id && a.content_hash == content_hash)
            .cloned())
    }

    async fn check_content_hash_exists_elsewhere(
        &self,
        org_id: Uuid,
        content_hash: &str,
        exclude_source_id: Uuid,
    ) -> Result<bool> {
        let inner = self.lock();
        Ok(inner.articles.iter().any(|a| {
            a.org_id == org_id && a.content_hash == content_hash && a.source_id != exclude_source_id
        }))
    }

    async fn find_recent_fingerprints(
        &self,
        org_id: Uuid,
        hours_back: u32,
        limit: usize,
    ) -> Result<Vec<FingerprintRow>> {
        let cutoff = window_start(hours_back);
        let inner = self.lock();
        let mut rows: Vec<&Article> = inner
            .articles
            .iter()
            .filter(|a| a.org_id == org_id && a.first_seen_at >= cutoff)
            .collect();
        rows.sort_by(|a, b| b.first_seen_at.cmp(&a.first_seen_at));
        Ok(rows
            .into_iter()
            .take(limit)
            .map(|a| FingerprintRow {
                article_id: a.id,
                title_normalized: a.title_normalized.clone(),
                key_phrases: a.key_phrases.clone(),
            })
            .collect())
    }

    async fn find_articles_by_phrase_overlap(
        &self,
        org_id: Uuid,
        phrases: &[String],
        hours_back: u32,
        limit: usize,
    ) -> Result<Vec<PhraseRow>> {
        let cutoff = window_start(hours_back);
        let inner = self.lock();
        let mut rows: Vec<&Article> = inner
            .articles
            .iter()
            .filter(|a| {
                a.org_id == org_id
                    && a.first_seen_at >= cutoff
                    && a.key_phrases.iter().any(|p| phrases.contains(p))
            })
            .collect();
        rows.sort_by(|a, b| b.first_seen_at.cmp(&a.first_seen_at));
        Ok(rows
            .into_iter()
            .take(limit)
            .map(|a| PhraseRow {
                article_id: a.id,
                key_phrases: a.key_phrases.clone(),
            })
            .collect())
    }

    async fn insert_article(&self, article: NewArticle) -> Result<Article> {
        let mut inner = self.lock();
        // Unique key: (org_id, content_hash). Conflict resolves to the
        // pre-existing row.
        if let Some(existing) = inner
            .articles
            .iter()
            .find(|a| a.org_id == article.org_id && a.content_hash == article.content_hash)
        {
            return Ok(existing.clone());
        }
        let stored = Article {
            id: Uuid::new_v4(),
            org_id: article.org_id,
            source_id: article.source_id,
            url: article.url,
            title: article.title,
            content: article.content,
            summary: article.summary,
            author: article.author,
            published_at: article.published_at,
            content_hash: article.content_hash,
            title_normalized: article.title_normalized,
            key_phrases: article.key_phrases,
            fingerprint_hash: article.fingerprint_hash,
            raw_data: article.raw_data,
            first_seen_at: Utc::now(),
        };
        inner.articles.push(stored.clone());
        Ok(stored)
    }

    async fn count_articles_for_source(&self, org_id: Uuid, source_id: Uuid) -> Result<u64> {
        let inner = self.lock();
        Ok(inner
            .articles
            .iter()
            .filter(|a| a.org_id == org_id && a.source_id == source_id)
            .count() as u64)
    }

    async fn find_or_create_source(&self, spec: SourceSpec) -> Result<Source> {
        let mut inner = self.lock();
        if let Some(existing) = inner
            .sources
            .values()
            .find(|s| s.org_id == spec.org_id && s.url == spec.url)
        {
            return Ok(existing.clone());
        }
        let source = Source {
            id: Uuid::new_v4(),
            org_id: spec.org_id,
            name: spec.name,
            source_type: spec.source_type,
            url: spec.url,
            crawl_config: spec.crawl_config,
            frequency: spec.frequency,
            active: true,
            consecutive_errors: 0,
            last_crawled_at: None,
            last_status: None,
            last_error: None,
            created_at: Utc::now(),
        };
        inner.sources.insert(source.id, source.clone());
        Ok(source)
    }

    async fn get_source(&self, id: Uuid) -> Result<Option<Source>> {
        let inner = self.lock();
        Ok(inner.sources.get(&id).cloned())
    }

    async fn find_sources_due_for_crawl(&self, frequency: CrawlFrequency) -> Result<Vec<Source>> {
        let now = Utc::now();
        let interval = Duration::minutes(i64::from(frequency.minutes()));
        let inner = self.lock();
        Ok(inner
            .sources
            .values()
            .filter(|s| s.active && s.frequency == frequency)
            .filter(|s| match s.last_crawled_at {
                None => true,
                Some(last) => now - last >= interval,
            })
            .cloned()
            .collect())
    }

    async fn mark_source_success(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.lock();
        if let Some(s) = inner.sources.get_mut(&id) {
            s.last_crawled_at = Some(at);
            s.last_status = Some(CrawlStatus::Success);
            s.last_error = None;
            s.consecutive_errors = 0;
        }
        Ok(())
    }

    async fn mark_source_error(&self, id: Uuid, message: &str) -> Result<()> {
        let mut inner = self.lock();
        if let Some(s) = inner.sources.get_mut(&id) {
            s.last_crawled_at = Some(Utc::now());
            s.last_status = Some(CrawlStatus::Error);
            s.last_error = Some(message.to_string());
            s.consecutive_errors += 1;
        }
        Ok(())
    }

    async fn record_crawl_start(&self, source_id: Uuid) -> Result<SourceCrawl> {
        let crawl = SourceCrawl {
            id: Uuid::new_v4(),
            source_id,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            status: CrawlStatus::Running,
            articles_found: 0,
            articles_new: 0,
            duplicates: DuplicateCounts::default(),
            error_message: None,
            retry_count: 0,
        };
        let mut inner = self.lock();
        inner.crawls.push(crawl.clone());
        Ok(crawl)
    }

    async fn record_crawl_success(&self, crawl_id: Uuid, metrics: CrawlMetrics) -> Result<()> {
        let mut inner = self.lock();
        if let Some(c) = inner.crawls.iter_mut().find(|c| c.id == crawl_id) {
            c.status = CrawlStatus::Success;
            c.completed_at = Some(Utc::now());
            c.duration_ms = Some(metrics.duration_ms);
            c.articles_found = metrics.articles_found;
            c.articles_new = metrics.articles_new;
            c.duplicates = metrics.duplicates;
        }
        Ok(())
    }

    async fn record_crawl_error(
        &self,
        crawl_id: Uuid,
        message: &str,
        duration_ms: u64,
    ) -> Result<()> {
        let mut inner = self.lock();
        if let Some(c) = inner.crawls.iter_mut().find(|c| c.id == crawl_id) {
            c.status = CrawlStatus::Error;
            c.completed_at = Some(Utc::now());
            c.duration_ms = Some(duration_ms);
            c.error_message = Some(message.to_string());
        }
        Ok(())
    }

    async fn record_crawl_timeout(&self, crawl_id: Uuid, duration_ms: u64) -> Result<()> {
        let mut inner = self.lock();
        if let Some(c) = inner.crawls.iter_mut().find(|c| c.id == crawl_id) {
            c.status = CrawlStatus::Timeout;
            c.completed_at = Some(Utc::now());
            c.duration_ms = Some(duration_ms);
            c.error_message = Some("Crawl timed out".to_string());
        }
        Ok(())
    }

    async fn recent_crawls(&self, limit: usize) -> Result<Vec<SourceCrawl>> {
        let inner = self.lock();
        let mut rows = inner.crawls.clone();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        rows.truncate(limit);
        Ok(rows)
    }
}

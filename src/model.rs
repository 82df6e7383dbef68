//! # Data Model
//! Sources, stored articles, crawl execution records, and the dedup
//! classification result shared by the engine and the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The five supported crawl intervals. Sources can only be registered into
/// one of these buckets; anything else is rejected at the serde boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum CrawlFrequency {
    Every5Min,
    Every10Min,
    Every15Min,
    Every30Min,
    Every60Min,
}

impl CrawlFrequency {
    pub const ALL: [CrawlFrequency; 5] = [
        CrawlFrequency::Every5Min,
        CrawlFrequency::Every10Min,
        CrawlFrequency::Every15Min,
        CrawlFrequency::Every30Min,
        CrawlFrequency::Every60Min,
    ];

    pub fn minutes(self) -> u32 {
        match self {
            CrawlFrequency::Every5Min => 5,
            CrawlFrequency::Every10Min => 10,
            CrawlFrequency::Every15Min => 15,
            CrawlFrequency::Every30Min => 30,
            CrawlFrequency::Every60Min => 60,
        }
    }

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.minutes() == minutes)
    }

    /// Index into per-bucket state (busy flags, metrics labels).
    pub fn index(self) -> usize {
        match self {
            CrawlFrequency::Every5Min => 0,
            CrawlFrequency::Every10Min => 1,
            CrawlFrequency::Every15Min => 2,
            CrawlFrequency::Every30Min => 3,
            CrawlFrequency::Every60Min => 4,
        }
    }
}

impl TryFrom<u32> for CrawlFrequency {
    type Error = String;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        CrawlFrequency::from_minutes(minutes)
            .ok_or_else(|| format!("unsupported crawl frequency: {minutes} minutes"))
    }
}

impl From<CrawlFrequency> for u32 {
    fn from(f: CrawlFrequency) -> u32 {
        f.minutes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Feed,
    Page,
    Api,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Feed => "feed",
            SourceType::Page => "page",
            SourceType::Api => "api",
        }
    }
}

/// A registered content origin. Never hard-deleted; `active: false` retires
/// it from scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub source_type: SourceType,
    pub url: String,
    /// Adapter-specific options (selectors, item pointers, field mappings).
    #[serde(default)]
    pub crawl_config: serde_json::Value,
    pub frequency: CrawlFrequency,
    pub active: bool,
    pub consecutive_errors: u32,
    pub last_crawled_at: Option<DateTime<Utc>>,
    pub last_status: Option<CrawlStatus>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Registration payload for find-or-create-by-URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    pub org_id: Uuid,
    pub name: String,
    pub source_type: SourceType,
    pub url: String,
    #[serde(default)]
    pub crawl_config: serde_json::Value,
    pub frequency: CrawlFrequency,
}

/// A stored content item. `content_hash` is unique per organization;
/// fingerprint fields are populated at creation and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub org_id: Uuid,
    pub source_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub content_hash: String,
    pub title_normalized: String,
    pub key_phrases: Vec<String>,
    pub fingerprint_hash: String,
    pub raw_data: Option<serde_json::Value>,
    pub first_seen_at: DateTime<Utc>,
}

/// Insert payload for `ContentStore::insert_article`.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub org_id: Uuid,
    pub source_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub content_hash: String,
    pub title_normalized: String,
    pub key_phrases: Vec<String>,
    pub fingerprint_hash: String,
    pub raw_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStatus {
    Running,
    Success,
    Error,
    Timeout,
}

/// One execution record of a crawl attempt. Created `Running`, transitions
/// exactly once to a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCrawl {
    pub id: Uuid,
    pub source_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub status: CrawlStatus,
    pub articles_found: u32,
    pub articles_new: u32,
    pub duplicates: DuplicateCounts,
    pub error_message: Option<String>,
    pub retry_count: u32,
}

impl SourceCrawl {
    pub fn total_duplicates(&self) -> u32 {
        self.duplicates.total()
    }
}

/// Per-kind duplicate counters aggregated over one crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCounts {
    pub exact: u32,
    pub cross_source: u32,
    pub fuzzy_title: u32,
    pub phrase_overlap: u32,
}

impl DuplicateCounts {
    pub fn bump(&mut self, kind: DuplicateKind) {
        match kind {
            DuplicateKind::Exact => self.exact += 1,
            DuplicateKind::CrossSource => self.cross_source += 1,
            DuplicateKind::FuzzyTitle => self.fuzzy_title += 1,
            DuplicateKind::PhraseOverlap => self.phrase_overlap += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.exact + self.cross_source + self.fuzzy_title + self.phrase_overlap
    }
}

/// Classification of a match, in descending order of confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKind {
    Exact,
    CrossSource,
    FuzzyTitle,
    PhraseOverlap,
}

impl DuplicateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DuplicateKind::Exact => "exact",
            DuplicateKind::CrossSource => "cross_source",
            DuplicateKind::FuzzyTitle => "fuzzy_title",
            DuplicateKind::PhraseOverlap => "phrase_overlap",
        }
    }
}

/// Output of one dedup evaluation. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeduplicationResult {
    pub is_duplicate: bool,
    pub duplicate_type: Option<DuplicateKind>,
    pub existing_article_id: Option<Uuid>,
    pub similarity_score: Option<f64>,
}

impl DeduplicationResult {
    pub fn unique() -> Self {
        Self {
            is_duplicate: false,
            duplicate_type: None,
            existing_article_id: None,
            similarity_score: None,
        }
    }

    pub fn exact(existing: Uuid) -> Self {
        Self {
            is_duplicate: true,
            duplicate_type: Some(DuplicateKind::Exact),
            existing_article_id: Some(existing),
            similarity_score: None,
        }
    }

    /// Layer 1 knows the matched article; layer 2 only knows one exists.
    pub fn cross_source(existing: Option<Uuid>) -> Self {
        Self {
            is_duplicate: true,
            duplicate_type: Some(DuplicateKind::CrossSource),
            existing_article_id: existing,
            similarity_score: None,
        }
    }

    pub fn fuzzy_title(existing: Uuid, similarity: f64) -> Self {
        Self {
            is_duplicate: true,
            duplicate_type: Some(DuplicateKind::FuzzyTitle),
            existing_article_id: Some(existing),
            similarity_score: Some(similarity),
        }
    }

    pub fn phrase_overlap(existing: Uuid, overlap: f64) -> Self {
        Self {
            is_duplicate: true,
            duplicate_type: Some(DuplicateKind::PhraseOverlap),
            existing_article_id: Some(existing),
            similarity_score: Some(overlap),
        }
    }
}

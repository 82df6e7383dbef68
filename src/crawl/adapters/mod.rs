//! # Fetch Adapters
//! One adapter per `SourceType` variant behind a single dispatch point.
//! An adapter call either yields the whole item batch or fails with one
//! typed error for the source; partial results are never returned.

pub mod feed;
pub mod json_api;
pub mod page;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Source, SourceType};
use feed::FeedAdapter;
use json_api::JsonApiAdapter;
use page::PageAdapter;

/// One raw item as delivered by a source, before dedup and storage.
/// Everything except the URL is optional; consumers substitute empty
/// strings for absent fields rather than propagating the absence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedItem {
    pub url: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub raw_data: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Parse(String),
    #[error("fetch timed out after {0}s")]
    TimedOut(u64),
}

/// Object-safe fetch boundary so the orchestrator can be driven by stub
/// fetchers in tests.
#[async_trait::async_trait]
pub trait FetchDispatch: Send + Sync {
    async fn fetch(&self, source: &Source) -> Result<Vec<FetchedItem>, FetchError>;
}

/// The production dispatch: one concrete adapter per source type. Unknown
/// type strings never reach this point; `SourceType` rejects them at the
/// serde boundary with a typed error.
pub struct AdapterSet {
    feed: FeedAdapter,
    page: PageAdapter,
    api: JsonApiAdapter,
}

impl AdapterSet {
    pub fn new() -> Self {
        let client = reqwest::Client::new();
        Self {
            feed: FeedAdapter::new(client.clone()),
            page: PageAdapter::new(client.clone()),
            api: JsonApiAdapter::new(client),
        }
    }
}

impl Default for AdapterSet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FetchDispatch for AdapterSet {
    async fn fetch(&self, source: &Source) -> Result<Vec<FetchedItem>, FetchError> {
        match source.source_type {
            SourceType::Feed => self.feed.fetch(source).await,
            SourceType::Page => self.page.fetch(source).await,
            SourceType::Api => self.api.fetch(source).await,
        }
    }
}

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Deserialize;
use serde_json::Value;

use super::{FetchError, FetchedItem};
use crate::model::Source;

/// Field mapping read from `Source.crawl_config`. Defaults assume the
/// common `{"items": [{"url": ..., "title": ...}]}` response shape.
#[derive(Debug, Clone, Deserialize)]
struct ApiConfig {
    /// JSON pointer to the item array; empty means the response root.
    #[serde(default = "default_items_pointer")]
    items_pointer: String,
    #[serde(default = "default_url_field")]
    url_field: String,
    #[serde(default = "default_title_field")]
    title_field: String,
    #[serde(default = "default_content_field")]
    content_field: String,
    #[serde(default = "default_summary_field")]
    summary_field: String,
    #[serde(default = "default_author_field")]
    author_field: String,
    #[serde(default = "default_published_at_field")]
    published_at_field: String,
}

fn default_items_pointer() -> String {
    "/items".to_string()
}
fn default_url_field() -> String {
    "url".to_string()
}
fn default_title_field() -> String {
    "title".to_string()
}
fn default_content_field() -> String {
    "content".to_string()
}
fn default_summary_field() -> String {
    "summary".to_string()
}
fn default_author_field() -> String {
    "author".to_string()
}
fn default_published_at_field() -> String {
    "published_at".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            items_pointer: default_items_pointer(),
            url_field: default_url_field(),
            title_field: default_title_field(),
            content_field: default_content_field(),
            summary_field: default_summary_field(),
            author_field: default_author_field(),
            published_at_field: default_published_at_field(),
        }
    }
}

/// JSON-API adapter: GET the source URL, walk to the item array, map each
/// object through the configured field names. The full item object is kept
/// as `raw_data`.
pub struct JsonApiAdapter {
    client: reqwest::Client,
}

impl JsonApiAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn fetch(&self, source: &Source) -> Result<Vec<FetchedItem>, FetchError> {
        let body: Value = self
            .client
            .get(&source.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Self::parse_response(&body, &source.crawl_config)
    }

    pub fn parse_response(
        body: &Value,
        crawl_config: &Value,
    ) -> Result<Vec<FetchedItem>, FetchError> {
        let cfg: ApiConfig = serde_json::from_value(crawl_config.clone()).unwrap_or_default();

        let items = if cfg.items_pointer.is_empty() {
            Some(body)
        } else {
            body.pointer(&cfg.items_pointer)
        };
        let items = items.and_then(Value::as_array).ok_or_else(|| {
            FetchError::Parse(format!(
                "no item array at pointer {:?}",
                cfg.items_pointer
            ))
        })?;

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let Some(url) = str_field(item, &cfg.url_field) else {
                continue;
            };
            out.push(FetchedItem {
                url,
                title: str_field(item, &cfg.title_field),
                content: str_field(item, &cfg.content_field),
                summary: str_field(item, &cfg.summary_field),
                author: str_field(item, &cfg.author_field),
                published_at: str_field(item, &cfg.published_at_field)
                    .as_deref()
                    .and_then(parse_rfc3339),
                raw_data: Some(item.clone()),
            });
        }

        counter!("crawler_items_fetched_total", "adapter" => "api").increment(out.len() as u64);
        Ok(out)
    }
}

fn str_field(item: &Value, field: &str) -> Option<String> {
    item.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_rfc3339(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

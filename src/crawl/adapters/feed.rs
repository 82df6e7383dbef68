use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use super::{FetchError, FetchedItem};
use crate::model::Source;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    author: Option<String>,
    #[serde(rename = "content:encoded")]
    content_encoded: Option<String>,
}

fn parse_rfc2822(ts: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
}

/// RSS feed adapter. Scrubs common HTML entities before the XML parse so
/// feeds with loose escaping still deserialize.
pub struct FeedAdapter {
    client: reqwest::Client,
}

impl FeedAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn fetch(&self, source: &Source) -> Result<Vec<FetchedItem>, FetchError> {
        let body = self
            .client
            .get(&source.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Self::parse_feed(&body)
    }

    pub fn parse_feed(xml: &str) -> Result<Vec<FetchedItem>, FetchError> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean)
            .map_err(|e| FetchError::Parse(format!("parsing rss xml: {e}")))?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            // An item without a link has no identity; skip it.
            let Some(url) = it.link.clone().filter(|l| !l.trim().is_empty()) else {
                continue;
            };
            let raw = serde_json::json!({
                "title": &it.title,
                "link": &it.link,
                "pubDate": &it.pub_date,
                "description": &it.description,
                "author": &it.author,
            });
            out.push(FetchedItem {
                url,
                title: it.title,
                content: it.content_encoded.or_else(|| it.description.clone()),
                summary: it.description,
                author: it.author,
                published_at: it.pub_date.as_deref().and_then(parse_rfc2822),
                raw_data: Some(raw),
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("crawler_fetch_parse_ms").record(ms);
        counter!("crawler_items_fetched_total", "adapter" => "feed").increment(out.len() as u64);
        Ok(out)
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

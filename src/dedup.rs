//! # Deduplication Engine
//! Four ordered layers, increasingly approximate, each short-circuiting on
//! the first match:
//!   1. exact content-hash lookup (same source → exact, other → cross_source)
//!   2. cross-source hash existence check
//!   3. fuzzy title match (Jaccard over normalized title word sets)
//!   4. key-phrase overlap (intersection relative to the smaller set)
//!
//! The primitives below are also used to build the fingerprint stored with
//! every new article, so classification and storage stay in sync.

use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use uuid::Uuid;

use crate::model::DeduplicationResult;
use crate::store::ContentStore;

/// Candidate cap for the fuzzy-title layer (layer 3).
pub const FUZZY_CANDIDATE_LIMIT: usize = 100;
/// Candidate cap for the phrase-overlap layer (layer 4).
pub const PHRASE_CANDIDATE_LIMIT: usize = 50;
/// Phrases retained per article fingerprint.
const MAX_KEY_PHRASES: usize = 20;
/// Content prefix considered for phrase extraction, in chars.
const PHRASE_CONTENT_WINDOW: usize = 500;
/// Tokens this short carry no phrase signal.
const MIN_TOKEN_LEN: usize = 4;

/// SHA-256 of `text`, lowercase hex.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

/// Identity hash of one fetched item: `title|content|url`, absent fields as
/// empty strings.
pub fn item_content_hash(title: Option<&str>, content: Option<&str>, url: &str) -> String {
    content_hash(&format!(
        "{}|{}|{}",
        title.unwrap_or_default(),
        content.unwrap_or_default(),
        url
    ))
}

/// Lowercase, strip everything that is not alphanumeric or whitespace,
/// collapse whitespace runs, trim.
pub fn normalize_title(title: &str) -> String {
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());

    let lowered = title.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    re_ws.replace_all(&stripped, " ").trim().to_string()
}

/// All contiguous 2- and 3-word windows over `title + first 500 chars of
/// content`, after dropping tokens shorter than 4 chars. Deduplicated
/// preserving first occurrence, stable-sorted by descending word count
/// (the only ordering criterion), capped at 20.
///
/// Ranked truncation, not a quality filter: short or unrelated content
/// legitimately yields zero phrases.
pub fn extract_key_phrases(title: &str, content: &str) -> Vec<String> {
    let snippet: String = content.chars().take(PHRASE_CONTENT_WINDOW).collect();
    let text = format!("{title} {snippet}").to_lowercase();
    let tokens: Vec<&str> = text
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .collect();

    let mut seen = HashSet::new();
    let mut phrases = Vec::new();
    for window in tokens.windows(2).chain(tokens.windows(3)) {
        let phrase = window.join(" ");
        if seen.insert(phrase.clone()) {
            phrases.push(phrase);
        }
    }

    phrases.sort_by_key(|p| std::cmp::Reverse(p.split(' ').count()));
    phrases.truncate(MAX_KEY_PHRASES);
    phrases
}

/// Order-independent fingerprint: SHA-256 of the sorted phrase set joined
/// with `|`.
pub fn fingerprint_hash(phrases: &[String]) -> String {
    let mut sorted: Vec<&str> = phrases.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    content_hash(&sorted.join("|"))
}

/// Word set of an already-normalized title.
pub fn title_word_set(title_normalized: &str) -> HashSet<String> {
    title_normalized
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// |A ∩ B| / |A ∪ B|; 0 when the union is empty.
pub fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// |A ∩ B| / min(|A|, |B|); 0 when either set is empty.
pub fn phrase_overlap(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let set: HashSet<&str> = a.iter().map(String::as_str).collect();
    let intersection = b
        .iter()
        .filter(|p| set.contains(p.as_str()))
        .collect::<HashSet<_>>()
        .len();
    intersection as f64 / a.len().min(b.len()) as f64
}

/// Per-invocation dedup configuration. Every field is independently
/// overridable; partial config files deserialize against these defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_true")]
    pub fuzzy_dedup_enabled: bool,
    #[serde(default = "default_true")]
    pub cross_source_dedup: bool,
    #[serde(default = "default_title_similarity")]
    pub title_similarity_threshold: f64,
    #[serde(default = "default_phrase_overlap")]
    pub phrase_overlap_threshold: f64,
    #[serde(default = "default_hours_back")]
    pub dedup_hours_back: u32,
}

fn default_true() -> bool {
    true
}
fn default_title_similarity() -> f64 {
    0.85
}
fn default_phrase_overlap() -> f64 {
    0.7
}
fn default_hours_back() -> u32 {
    72
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            fuzzy_dedup_enabled: true,
            cross_source_dedup: true,
            title_similarity_threshold: 0.85,
            phrase_overlap_threshold: 0.7,
            dedup_hours_back: 72,
        }
    }
}

/// Classifies candidate items against previously stored content. Pure logic
/// plus read-only store lookups; holds no mutable state.
pub struct DedupEngine {
    store: Arc<dyn ContentStore>,
}

impl DedupEngine {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub async fn check_duplicate(
        &self,
        org_id: Uuid,
        source_id: Uuid,
        content_hash: &str,
        title: Option<&str>,
        content: Option<&str>,
        cfg: &DedupConfig,
    ) -> Result<DeduplicationResult> {
        // Layer 1: exact hash anywhere in the organization.
        if let Some(existing) = self
            .store
            .find_article_by_content_hash(org_id, content_hash)
            .await?
        {
            return Ok(if existing.source_id == source_id {
                DeduplicationResult::exact(existing.id)
            } else {
                DeduplicationResult::cross_source(Some(existing.id))
            });
        }

        // Layer 2: hash exists under another source. Reports existence only,
        // no matched id.
        if cfg.cross_source_dedup
            && self
                .store
                .check_content_hash_exists_elsewhere(org_id, content_hash, source_id)
                .await?
        {
            return Ok(DeduplicationResult::cross_source(None));
        }

        // Layer 3: Jaccard over normalized title word sets. First candidate
        // meeting the threshold wins, in store order (newest first); an
        // early-exit policy, not a best-of-N search.
        let title = title.unwrap_or_default();
        if cfg.fuzzy_dedup_enabled && !title.is_empty() {
            let candidate_words = title_word_set(&normalize_title(title));
            let rows = self
                .store
                .find_recent_fingerprints(org_id, cfg.dedup_hours_back, FUZZY_CANDIDATE_LIMIT)
                .await?;
            for row in rows {
                let similarity =
                    jaccard_similarity(&candidate_words, &title_word_set(&row.title_normalized));
                if similarity >= cfg.title_similarity_threshold {
                    return Ok(DeduplicationResult::fuzzy_title(row.article_id, similarity));
                }
            }
        }

        // Layer 4: key-phrase overlap, same window, same first-match policy.
        let phrases = extract_key_phrases(title, content.unwrap_or_default());
        if !phrases.is_empty() {
            let rows = self
                .store
                .find_articles_by_phrase_overlap(
                    org_id,
                    &phrases,
                    cfg.dedup_hours_back,
                    PHRASE_CANDIDATE_LIMIT,
                )
                .await?;
            for row in rows {
                let overlap = phrase_overlap(&phrases, &row.key_phrases);
                if overlap >= cfg.phrase_overlap_threshold {
                    return Ok(DeduplicationResult::phrase_overlap(row.article_id, overlap));
                }
            }
        }

        Ok(DeduplicationResult::unique())
    }
}

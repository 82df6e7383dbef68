// tests/dedup_layers.rs
//
// Layered classification against a seeded MemoryStore: layer precedence,
// exact vs cross-source, fuzzy-title thresholds, and phrase overlap.

use std::sync::Arc;

use newswire_crawler::dedup::{
    extract_key_phrases, fingerprint_hash, item_content_hash, normalize_title, DedupConfig,
    DedupEngine,
};
use newswire_crawler::{ContentStore, DuplicateKind, MemoryStore, NewArticle};
use uuid::Uuid;

fn engine(store: &Arc<MemoryStore>) -> DedupEngine {
    DedupEngine::new(store.clone() as Arc<dyn ContentStore>)
}

/// Seed an article the way the orchestrator would: fingerprint fields
/// computed from title + content.
async fn seed(
    store: &Arc<MemoryStore>,
    org: Uuid,
    source: Uuid,
    url: &str,
    title: &str,
    content: &str,
) -> newswire_crawler::Article {
    let phrases = extract_key_phrases(title, content);
    store
        .insert_article(NewArticle {
            org_id: org,
            source_id: source,
            url: url.to_string(),
            title: Some(title.to_string()),
            content: Some(content.to_string()),
            summary: None,
            author: None,
            published_at: None,
            content_hash: item_content_hash(Some(title), Some(content), url),
            title_normalized: normalize_title(title),
            fingerprint_hash: fingerprint_hash(&phrases),
            key_phrases: phrases,
            raw_data: None,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn same_source_hash_match_is_exact() {
    let store = Arc::new(MemoryStore::new());
    let (org, source) = (Uuid::new_v4(), Uuid::new_v4());
    let seeded = seed(&store, org, source, "https://a/1", "Rates hold", "No change.").await;

    let result = engine(&store)
        .check_duplicate(
            org,
            source,
            &seeded.content_hash,
            Some("Rates hold"),
            Some("No change."),
            &DedupConfig::default(),
        )
        .await
        .unwrap();

    assert!(result.is_duplicate);
    assert_eq!(result.duplicate_type, Some(DuplicateKind::Exact));
    assert_eq!(result.existing_article_id, Some(seeded.id));
    assert!(result.similarity_score.is_none());
}

#[tokio::test]
async fn other_source_hash_match_is_cross_source() {
    let store = Arc::new(MemoryStore::new());
    let org = Uuid::new_v4();
    let (source_a, source_b) = (Uuid::new_v4(), Uuid::new_v4());
    let seeded = seed(&store, org, source_a, "https://a/1", "Rates hold", "No change.").await;

    let result = engine(&store)
        .check_duplicate(
            org,
            source_b,
            &seeded.content_hash,
            Some("Rates hold"),
            Some("No change."),
            &DedupConfig::default(),
        )
        .await
        .unwrap();

    assert_eq!(result.duplicate_type, Some(DuplicateKind::CrossSource));
    assert_eq!(result.existing_article_id, Some(seeded.id));
}

#[tokio::test]
async fn hash_match_in_another_org_is_invisible() {
    let store = Arc::new(MemoryStore::new());
    let source = Uuid::new_v4();
    let seeded = seed(
        &store,
        Uuid::new_v4(),
        source,
        "https://a/1",
        "Rates hold",
        "No change.",
    )
    .await;

    let result = engine(&store)
        .check_duplicate(
            Uuid::new_v4(),
            source,
            &seeded.content_hash,
            None,
            None,
            &DedupConfig::default(),
        )
        .await
        .unwrap();
    assert!(!result.is_duplicate);
}

#[tokio::test]
async fn exact_hash_wins_over_a_fuzzy_candidate() {
    let store = Arc::new(MemoryStore::new());
    let (org, source) = (Uuid::new_v4(), Uuid::new_v4());

    // An article whose title would also satisfy the fuzzy layer.
    seed(
        &store,
        org,
        source,
        "https://a/fuzzy",
        "Apple stock surges after earnings report today",
        "Shares climbed in early trading.",
    )
    .await;
    let exact = seed(
        &store,
        org,
        source,
        "https://a/exact",
        "Apple stock surges after earnings report",
        "Different body entirely.",
    )
    .await;

    let result = engine(&store)
        .check_duplicate(
            org,
            source,
            &exact.content_hash,
            Some("Apple stock surges after earnings report"),
            Some("Different body entirely."),
            &DedupConfig::default(),
        )
        .await
        .unwrap();

    // Layer 1 always wins, even though the other article's title is within
    // the fuzzy threshold.
    assert_eq!(result.duplicate_type, Some(DuplicateKind::Exact));
    assert_eq!(result.existing_article_id, Some(exact.id));
}

// Long enough that the seeded fingerprint keeps only 3-word phrases, so the
// phrase-overlap layer stays quiet in the threshold tests below.
const EARNINGS_BODY: &str = "Shares climbed sharply during early trading while \
analysts debated whether consumer demand would persist through the holiday \
quarter. Management raised full year guidance citing strong services growth, \
record upgrade rates, and improving supply conditions across assembly partners.";

#[tokio::test]
async fn near_identical_title_is_fuzzy_title() {
    let store = Arc::new(MemoryStore::new());
    let (org, source) = (Uuid::new_v4(), Uuid::new_v4());
    let seeded = seed(
        &store,
        org,
        source,
        "https://a/1",
        "Apple stock surges after earnings report today",
        EARNINGS_BODY,
    )
    .await;

    // Word set differs by one of seven words: Jaccard 6/7 ≈ 0.857.
    let result = engine(&store)
        .check_duplicate(
            org,
            source,
            "unrelated-hash",
            Some("Apple stock surges after earnings report"),
            None,
            &DedupConfig::default(),
        )
        .await
        .unwrap();

    assert_eq!(result.duplicate_type, Some(DuplicateKind::FuzzyTitle));
    assert_eq!(result.existing_article_id, Some(seeded.id));
    let score = result.similarity_score.unwrap();
    assert!((score - 6.0 / 7.0).abs() < 1e-9);
}

#[tokio::test]
async fn fuzzy_layer_respects_threshold_and_toggle() {
    let store = Arc::new(MemoryStore::new());
    let (org, source) = (Uuid::new_v4(), Uuid::new_v4());
    seed(
        &store,
        org,
        source,
        "https://a/1",
        "Apple stock surges after earnings report today",
        EARNINGS_BODY,
    )
    .await;

    // Below the default 0.85: Jaccard 5/7 ≈ 0.714 for a two-word cut.
    let below = engine(&store)
        .check_duplicate(
            org,
            source,
            "unrelated-hash",
            Some("Apple stock surges after earnings"),
            None,
            &DedupConfig::default(),
        )
        .await
        .unwrap();
    assert!(!below.is_duplicate);

    // The same candidate matches once the threshold is lowered.
    let lowered = DedupConfig {
        title_similarity_threshold: 0.7,
        ..DedupConfig::default()
    };
    let result = engine(&store)
        .check_duplicate(
            org,
            source,
            "unrelated-hash",
            Some("Apple stock surges after earnings"),
            None,
            &lowered,
        )
        .await
        .unwrap();
    assert_eq!(result.duplicate_type, Some(DuplicateKind::FuzzyTitle));

    // Disabling the layer suppresses the match entirely.
    let disabled = DedupConfig {
        fuzzy_dedup_enabled: false,
        title_similarity_threshold: 0.7,
        ..DedupConfig::default()
    };
    let result = engine(&store)
        .check_duplicate(
            org,
            source,
            "unrelated-hash",
            Some("Apple stock surges after earnings"),
            None,
            &disabled,
        )
        .await
        .unwrap();
    assert!(!result.is_duplicate);
}

#[tokio::test]
async fn shared_phrases_with_unrelated_title_is_phrase_overlap() {
    let store = Arc::new(MemoryStore::new());
    let (org, source) = (Uuid::new_v4(), Uuid::new_v4());
    let seeded = seed(
        &store,
        org,
        source,
        "https://a/1",
        "Federal reserve raises interest rates",
        "",
    )
    .await;

    // Title is far outside the fuzzy threshold, but the extracted phrase
    // sets are identical.
    let result = engine(&store)
        .check_duplicate(
            org,
            source,
            "unrelated-hash",
            Some("Federal reserve raises interest rates"),
            None,
            &DedupConfig {
                fuzzy_dedup_enabled: false,
                ..DedupConfig::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(result.duplicate_type, Some(DuplicateKind::PhraseOverlap));
    assert_eq!(result.existing_article_id, Some(seeded.id));
    assert_eq!(result.similarity_score, Some(1.0));
}

#[tokio::test]
async fn candidate_without_phrases_skips_layer_four() {
    let store = Arc::new(MemoryStore::new());
    let (org, source) = (Uuid::new_v4(), Uuid::new_v4());
    seed(
        &store,
        org,
        source,
        "https://a/1",
        "Federal reserve raises interest rates",
        "",
    )
    .await;

    // Tokens of <= 3 chars yield zero phrases, so nothing to compare.
    let result = engine(&store)
        .check_duplicate(
            org,
            source,
            "unrelated-hash",
            Some("was it so"),
            Some("oh my"),
            &DedupConfig::default(),
        )
        .await
        .unwrap();
    assert!(!result.is_duplicate);
}

#[tokio::test]
async fn fresh_content_is_unique() {
    let store = Arc::new(MemoryStore::new());
    let (org, source) = (Uuid::new_v4(), Uuid::new_v4());
    seed(
        &store,
        org,
        source,
        "https://a/1",
        "Central bank holds rates steady",
        "The benchmark rate is unchanged.",
    )
    .await;

    let result = engine(&store)
        .check_duplicate(
            org,
            source,
            "unrelated-hash",
            Some("Football season opens with record attendance"),
            Some("Crowds filled the stadium on Saturday."),
            &DedupConfig::default(),
        )
        .await
        .unwrap();
    assert!(!result.is_duplicate);
    assert!(result.duplicate_type.is_none());
}

// tests/scheduler_overlap.rs
//
// The one shared-state invariant of this crate: at most one in-flight run
// per frequency bucket, with the busy flag released on every exit path.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use uuid::Uuid;

use newswire_crawler::{
    BucketSummary, ContentStore, CrawlFrequency, CrawlOrchestrator, CrawlerConfig, FetchDispatch,
    FetchError, FetchedItem, FrequencyScheduler, MemoryStore, Source, SourceSpec, SourceType,
};

/// Holds every fetch until `release` fires, so a bucket run can be kept
/// in flight deterministically.
struct GatedFetcher {
    release: tokio::sync::Semaphore,
}

#[async_trait::async_trait]
impl FetchDispatch for GatedFetcher {
    async fn fetch(&self, _source: &Source) -> Result<Vec<FetchedItem>, FetchError> {
        // Consume the permit so each fetch needs its own release.
        self.release
            .acquire()
            .await
            .expect("semaphore closed")
            .forget();
        Ok(vec![FetchedItem {
            url: format!("https://gated.example/{}", Uuid::new_v4()),
            title: Some("Gated headline".into()),
            content: None,
            summary: None,
            author: None,
            published_at: None,
            raw_data: None,
        }])
    }
}

struct Fixture {
    store: Arc<dyn ContentStore>,
    scheduler: Arc<FrequencyScheduler>,
    fetcher: Arc<GatedFetcher>,
}

async fn fixture() -> Fixture {
    let store: Arc<dyn ContentStore> = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(GatedFetcher {
        release: tokio::sync::Semaphore::new(0),
    });
    let orchestrator = Arc::new(CrawlOrchestrator::new(
        store.clone(),
        fetcher.clone(),
        CrawlerConfig::default(),
    ));
    let scheduler = Arc::new(FrequencyScheduler::new(store.clone(), orchestrator));
    Fixture {
        store,
        scheduler,
        fetcher,
    }
}

async fn register_due(store: &Arc<dyn ContentStore>, frequency: CrawlFrequency) -> Source {
    store
        .find_or_create_source(SourceSpec {
            org_id: Uuid::new_v4(),
            name: "Gated".into(),
            source_type: SourceType::Feed,
            url: format!("https://gated.example/rss/{}", Uuid::new_v4()),
            crawl_config: serde_json::Value::Null,
            frequency,
        })
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_run_is_a_zero_count_skip() {
    let fx = fixture().await;
    let source = register_due(&fx.store, CrawlFrequency::Every15Min).await;

    // First run blocks inside the gated fetch.
    let scheduler = fx.scheduler.clone();
    let first = tokio::spawn(async move { scheduler.run_bucket(CrawlFrequency::Every15Min).await });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // Second run of the SAME bucket: immediate zero summary, not an error.
    let skipped = fx.scheduler.run_bucket(CrawlFrequency::Every15Min).await;
    assert_eq!(skipped, BucketSummary::default());

    // A DIFFERENT bucket is unaffected by the busy 15-minute bucket.
    let other = fx.scheduler.run_bucket(CrawlFrequency::Every5Min).await;
    assert_eq!(other.total, 0);

    // Let the first run finish and verify it did the actual work.
    fx.fetcher.release.add_permits(1);
    let summary = first.await.unwrap();
    assert_eq!(summary.total, 1);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.articles_new, 1);

    // Guard released: a third run proceeds and crawls the re-aged source.
    fx.store
        .mark_source_success(source.id, Utc::now() - Duration::minutes(20))
        .await
        .unwrap();
    fx.fetcher.release.add_permits(1);
    let third = fx.scheduler.run_bucket(CrawlFrequency::Every15Min).await;
    assert_eq!(third.total, 1);
    assert_eq!(third.successful, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_sources_count_without_breaking_the_bucket() {
    struct FlakyFetcher;

    #[async_trait::async_trait]
    impl FetchDispatch for FlakyFetcher {
        async fn fetch(&self, source: &Source) -> Result<Vec<FetchedItem>, FetchError> {
            if source.name == "bad" {
                return Err(FetchError::Parse("malformed feed".into()));
            }
            // Distinct titles per source so the fuzzy layer does not fold
            // the second good source into the first.
            Ok(vec![FetchedItem {
                url: format!("https://ok.example/{}", source.id),
                title: Some(format!("Headline from {}", source.name)),
                content: None,
                summary: None,
                author: None,
                published_at: None,
                raw_data: None,
            }])
        }
    }

    let store: Arc<dyn ContentStore> = Arc::new(MemoryStore::new());
    let orchestrator = Arc::new(CrawlOrchestrator::new(
        store.clone(),
        Arc::new(FlakyFetcher),
        CrawlerConfig::default(),
    ));
    let scheduler = Arc::new(FrequencyScheduler::new(store.clone(), orchestrator));

    let org = Uuid::new_v4();
    for name in ["good-one", "bad", "good-two"] {
        store
            .find_or_create_source(SourceSpec {
                org_id: org,
                name: name.into(),
                source_type: SourceType::Feed,
                url: format!("https://flaky.example/{name}"),
                crawl_config: serde_json::Value::Null,
                frequency: CrawlFrequency::Every30Min,
            })
            .await
            .unwrap();
    }

    let summary = scheduler.run_bucket(CrawlFrequency::Every30Min).await;
    assert_eq!(summary.total, 3);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.articles_new, 2);

    // The guard was released despite the failure inside the run.
    let again = scheduler.run_bucket(CrawlFrequency::Every30Min).await;
    // Everything was just crawled, so nothing is due; the run still executes.
    assert_eq!(again.total, 0);
}

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use url::Url;

use pulse_aggregator::llm::{Embedder, InsightGenerator, Summarizer};
use pulse_aggregator::sources::SourceClient;
use pulse_aggregator::storage::Store;
use pulse_aggregator::types::{
    Comment, ContentItem, InsightRecord, PipelineError, Result, StructuredInsight,
    StructuredSummary, UpsertResult,
};
use pulse_aggregator::{Pipeline, PipelineConfig, RetryPolicy};

fn test_config() -> PipelineConfig {
    PipelineConfig {
        reddit_enabled: true,
        hackernews_enabled: false,
        producthunt_enabled: false,
        reddit_client_id: Some("id".to_string()),
        reddit_client_secret: Some("secret".to_string()),
        reddit_user_agent: "pulse-aggregator-tests/0.1".to_string(),
        subreddits: vec!["technology".to_string()],
        lookback_days: 30,
        min_comments: 0,
        top_n: 20,
        top_k_comments: 5,
        http_timeout_secs: 5,
        openai_api_key: Some("sk-test".to_string()),
        summarizer_model: "mock".to_string(),
        insight_model: "mock".to_string(),
        embedding_model: "mock".to_string(),
        embedding_dim: 8,
        producthunt_token: None,
        slack_webhook_url: None,
        database_url: "postgres://unused".to_string(),
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(
        2,
        std::time::Duration::from_millis(1),
        std::time::Duration::from_millis(2),
    )
}

fn item(id: &str, source: &str, score: i64, created_utc: DateTime<Utc>) -> ContentItem {
    ContentItem {
        id: id.to_string(),
        source: source.to_string(),
        title: format!("title {id}"),
        author: "user".to_string(),
        url: Url::parse("https://example.com/post").unwrap(),
        score,
        num_comments: 10,
        created_utc,
        topic: Some("technology".to_string()),
        text: Some("body".to_string()),
    }
}

struct MockSource {
    source_name: &'static str,
    items: Vec<ContentItem>,
    fail: bool,
}

#[async_trait]
impl SourceClient for MockSource {
    fn name(&self) -> &'static str {
        self.source_name
    }

    async fn fetch_top_items(
        &self,
        _topics: &[String],
        _since: DateTime<Utc>,
        _limit_per_topic: usize,
    ) -> Result<Vec<ContentItem>> {
        if self.fail {
            return Err(PipelineError::Api {
                status: 500,
                message: "source down".to_string(),
            });
        }
        Ok(self.items.clone())
    }

    async fn fetch_comments(&self, item_id: &str, _limit: usize) -> Result<Vec<Comment>> {
        Ok(vec![Comment {
            id: format!("c-{item_id}"),
            body: "a comment".to_string(),
            score: 3,
            author: "commenter".to_string(),
        }])
    }
}

struct MockSummarizer;

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(
        &self,
        item: &ContentItem,
        _top_comments: &[Comment],
    ) -> Result<StructuredSummary> {
        // An empty title yields an empty summary so tests can exercise the
        // blank-embedding path.
        let summary = if item.title.is_empty() {
            String::new()
        } else {
            format!("summary of {}", item.id)
        };
        Ok(StructuredSummary {
            summary,
            ..StructuredSummary::default()
        })
    }
}

struct MockInsightGenerator;

#[async_trait]
impl InsightGenerator for MockInsightGenerator {
    async fn derive_insights(&self, _summary: &StructuredSummary) -> Result<StructuredInsight> {
        Ok(StructuredInsight {
            confidence: 0.9,
            short_rationale: "mock rationale".to_string(),
            ..StructuredInsight::default()
        })
    }
}

/// Records every batch it receives and honours the blank-input contract.
#[derive(Clone, Default)]
struct MockEmbedder {
    dim: usize,
    batches: Arc<Mutex<Vec<Vec<String>>>>,
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        self.batches.lock().unwrap().push(texts.to_vec());
        Ok(texts
            .iter()
            .map(|t| {
                if t.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![1.0; self.dim]
                }
            })
            .collect())
    }
}

#[derive(Default)]
struct StoreInner {
    item_ids: Mutex<HashSet<String>>,
    insight_ids: Mutex<HashSet<String>>,
    embedding_keys: Mutex<HashSet<(String, String)>>,
    embedding_dims: Mutex<Vec<(String, usize)>>,
}

#[derive(Clone, Default)]
struct MockStore(Arc<StoreInner>);

#[async_trait]
impl Store for MockStore {
    async fn upsert_items(&self, items: &[ContentItem]) -> Result<UpsertResult> {
        let mut result = UpsertResult::default();
        let mut seen = self.0.item_ids.lock().unwrap();
        for item in items {
            if seen.insert(item.id.clone()) {
                result.inserted += 1;
            } else {
                result.updated += 1;
            }
        }
        Ok(result)
    }

    async fn upsert_insight(&self, record: &InsightRecord) -> Result<UpsertResult> {
        let inserted = self.0.insight_ids.lock().unwrap().insert(record.id.clone());
        Ok(UpsertResult {
            inserted: inserted as u64,
            updated: (!inserted) as u64,
        })
    }

    async fn upsert_embedding(
        &self,
        entity_type: &str,
        entity_id: &str,
        vector: &[f64],
    ) -> Result<UpsertResult> {
        let inserted = self
            .0
            .embedding_keys
            .lock()
            .unwrap()
            .insert((entity_type.to_string(), entity_id.to_string()));
        self.0
            .embedding_dims
            .lock()
            .unwrap()
            .push((entity_id.to_string(), vector.len()));
        Ok(UpsertResult {
            inserted: inserted as u64,
            updated: (!inserted) as u64,
        })
    }
}

fn build_pipeline(
    config: PipelineConfig,
    sources: Vec<Box<dyn SourceClient>>,
    embedder: MockEmbedder,
    store: MockStore,
) -> Pipeline {
    Pipeline::new(
        config,
        sources,
        Box::new(MockSummarizer),
        Box::new(MockInsightGenerator),
        Box::new(embedder),
        Box::new(store),
    )
    .with_retry_policy(fast_retry())
}

#[tokio::test]
async fn failing_source_does_not_abort_the_run() {
    let now = Utc::now();
    let sources: Vec<Box<dyn SourceClient>> = vec![
        Box::new(MockSource {
            source_name: "reddit",
            items: vec![item("r1", "reddit", 100, now), item("r2", "reddit", 50, now)],
            fail: false,
        }),
        Box::new(MockSource {
            source_name: "hackernews",
            items: Vec::new(),
            fail: true,
        }),
    ];
    let store = MockStore::default();
    let embedder = MockEmbedder {
        dim: 8,
        ..MockEmbedder::default()
    };
    let pipeline = build_pipeline(test_config(), sources, embedder, store.clone());

    let report = pipeline.run().await;

    assert_eq!(report.fetched, 2);
    assert_eq!(report.selected, 2);
    assert!(report.failures >= 1, "the failing source must be recorded");
    assert_eq!(store.0.item_ids.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn duplicates_collapse_and_top_n_bounds_selection() {
    let now = Utc::now();
    let sources: Vec<Box<dyn SourceClient>> = vec![
        Box::new(MockSource {
            source_name: "reddit",
            items: vec![
                item("a", "reddit", 500, now),
                item("b", "reddit", 100, now),
                item("c", "reddit", 10, now),
            ],
            fail: false,
        }),
        Box::new(MockSource {
            source_name: "hackernews",
            // "a" collides across sources and must collapse to one item.
            items: vec![item("a", "hackernews", 1, now)],
            fail: false,
        }),
    ];
    let mut config = test_config();
    config.top_n = 2;
    let store = MockStore::default();
    let embedder = MockEmbedder {
        dim: 8,
        ..MockEmbedder::default()
    };
    let pipeline = build_pipeline(config, sources, embedder, store.clone());

    let report = pipeline.run().await;

    assert_eq!(report.fetched, 4);
    assert_eq!(report.deduplicated, 3);
    assert_eq!(report.selected, 2);
    let stored = store.0.item_ids.lock().unwrap();
    assert!(stored.contains("a"));
    assert!(stored.contains("b"));
    assert!(!stored.contains("c"));
}

#[tokio::test]
async fn minimum_engagement_filter_drops_quiet_items() {
    let now = Utc::now();
    let mut quiet = item("quiet", "reddit", 100, now);
    quiet.num_comments = 2;
    let sources: Vec<Box<dyn SourceClient>> = vec![Box::new(MockSource {
        source_name: "reddit",
        items: vec![item("busy", "reddit", 100, now), quiet],
        fail: false,
    })];
    let mut config = test_config();
    config.min_comments = 5; // "busy" has 10 comments, "quiet" has 2
    let store = MockStore::default();
    let embedder = MockEmbedder {
        dim: 8,
        ..MockEmbedder::default()
    };
    let pipeline = build_pipeline(config, sources, embedder, store.clone());

    let report = pipeline.run().await;

    assert_eq!(report.fetched, 1);
    assert!(store.0.item_ids.lock().unwrap().contains("busy"));
    assert!(!store.0.item_ids.lock().unwrap().contains("quiet"));
}

#[tokio::test]
async fn embedding_batch_preserves_order_and_skips_blanks() {
    let now = Utc::now();
    let mut untitled = item("u1", "reddit", 10, now);
    untitled.title = String::new(); // blank title -> blank summary as well
    let sources: Vec<Box<dyn SourceClient>> = vec![Box::new(MockSource {
        source_name: "reddit",
        items: vec![item("a1", "reddit", 100, now), untitled],
        fail: false,
    })];
    let store = MockStore::default();
    let embedder = MockEmbedder {
        dim: 8,
        ..MockEmbedder::default()
    };
    let pipeline = build_pipeline(test_config(), sources, embedder.clone(), store.clone());

    let report = pipeline.run().await;

    // Batch order: title+summary per item in rank order, then insights.
    let batches = embedder.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    let texts = &batches[0];
    assert_eq!(texts.len(), 6);
    assert_eq!(texts[0], "title a1");
    assert_eq!(texts[1], "summary of a1");
    assert_eq!(texts[2], "");
    assert_eq!(texts[3], "");

    // Blank inputs produced empty vectors, which are never persisted.
    let keys = store.0.embedding_keys.lock().unwrap();
    assert!(keys.contains(&("item".to_string(), "a1".to_string())));
    assert!(keys.contains(&("item".to_string(), "a1#summary".to_string())));
    assert!(!keys.contains(&("item".to_string(), "u1".to_string())));
    assert!(!keys.contains(&("item".to_string(), "u1#summary".to_string())));

    // Every persisted vector has the configured dimension.
    for (_, dim) in store.0.embedding_dims.lock().unwrap().iter() {
        assert_eq!(*dim, 8);
    }
    assert_eq!(report.embedded, 4); // a1 title+summary, 2 insight payloads
}

#[tokio::test]
async fn second_run_updates_instead_of_duplicating() {
    let now = Utc::now();
    let make_sources = || -> Vec<Box<dyn SourceClient>> {
        vec![Box::new(MockSource {
            source_name: "reddit",
            items: vec![item("x", "reddit", 100, now)],
            fail: false,
        })]
    };
    let store = MockStore::default();

    let first = build_pipeline(
        test_config(),
        make_sources(),
        MockEmbedder {
            dim: 8,
            ..MockEmbedder::default()
        },
        store.clone(),
    );
    let first_report = first.run().await;
    assert_eq!(first_report.persisted.updated, 0);
    assert!(first_report.persisted.inserted > 0);

    let second = build_pipeline(
        test_config(),
        make_sources(),
        MockEmbedder {
            dim: 8,
            ..MockEmbedder::default()
        },
        store.clone(),
    );
    let second_report = second.run().await;
    assert_eq!(second_report.persisted.inserted, 0);
    assert_eq!(
        second_report.persisted.updated,
        first_report.persisted.inserted
    );
    assert_eq!(store.0.item_ids.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn window_filter_drops_stale_items() {
    let now = Utc::now();
    let sources: Vec<Box<dyn SourceClient>> = vec![Box::new(MockSource {
        source_name: "reddit",
        items: vec![
            item("fresh", "reddit", 10, now),
            item("stale", "reddit", 9000, now - Duration::days(90)),
        ],
        fail: false,
    })];
    let store = MockStore::default();
    let pipeline = build_pipeline(
        test_config(),
        sources,
        MockEmbedder {
            dim: 8,
            ..MockEmbedder::default()
        },
        store.clone(),
    );

    let report = pipeline.run().await;

    assert_eq!(report.fetched, 1);
    assert!(store.0.item_ids.lock().unwrap().contains("fresh"));
    assert!(!store.0.item_ids.lock().unwrap().contains("stale"));
}

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::dedupe::dedupe_items;
use crate::llm::{Embedder, InsightGenerator, Summarizer};
use crate::ranking::rank_items;
use crate::retry::RetryPolicy;
use crate::security;
use crate::sources::SourceClient;
use crate::storage::Store;
use crate::types::{
    Comment, ContentItem, InsightRecord, StructuredInsight, StructuredSummary, UpsertResult,
};

/// Per-run counters, logged at the end of every run and optionally posted
/// to Slack. Failures count isolated per-source/per-item/per-artifact
/// errors; they never abort the run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub fetched: usize,
    pub deduplicated: usize,
    pub selected: usize,
    pub summarized: usize,
    pub insights: usize,
    pub embedded: usize,
    pub persisted: UpsertResult,
    pub failures: usize,
}

/// One embedding slot: where the vector belongs and the vector itself
/// (empty when the input text was blank or embedding failed).
#[derive(Debug, Clone)]
pub struct EmbeddingTarget {
    pub entity_type: &'static str,
    pub entity_id: String,
    pub vector: Vec<f64>,
}

/// Artifacts produced by the enrich stage, keyed by item id.
#[derive(Debug, Default)]
struct Enrichment {
    summaries: HashMap<String, StructuredSummary>,
    insights: HashMap<String, StructuredInsight>,
    embeddings: Vec<EmbeddingTarget>,
}

/// Sequential batch pipeline: FETCH → DEDUPE → RANK → SELECT_TOP_N →
/// ENRICH → PERSIST, one pass per invocation.
///
/// Every outbound call goes through the retry policy. Failures are
/// contained at the granularity of one source (FETCH), one item (ENRICH),
/// or one artifact (PERSIST); later stages always run on whatever
/// succeeded.
pub struct Pipeline {
    config: PipelineConfig,
    sources: Vec<Box<dyn SourceClient>>,
    summarizer: Box<dyn Summarizer>,
    insight_generator: Box<dyn InsightGenerator>,
    embedder: Box<dyn Embedder>,
    store: Box<dyn Store>,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        sources: Vec<Box<dyn SourceClient>>,
        summarizer: Box<dyn Summarizer>,
        insight_generator: Box<dyn InsightGenerator>,
        embedder: Box<dyn Embedder>,
        store: Box<dyn Store>,
    ) -> Self {
        Self {
            config,
            sources,
            summarizer,
            insight_generator,
            embedder,
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run one full pass. Always completes; partial failures are logged and
    /// counted in the report.
    pub async fn run(&self) -> RunReport {
        let mut report = RunReport {
            run_id: Uuid::new_v4(),
            ..RunReport::default()
        };
        let since = Utc::now() - Duration::days(self.config.lookback_days.max(1));
        info!(
            "Starting pipeline run {} with {} sources (window since {})",
            report.run_id,
            self.sources.len(),
            since
        );

        let fetched = self.fetch_stage(since, &mut report).await;
        report.fetched = fetched.len();

        let deduped = dedupe_items(&fetched);
        report.deduplicated = deduped.len();

        let mut selected = rank_items(&deduped);
        selected.truncate(self.config.top_n);
        report.selected = selected.len();

        let enrichment = self.enrich_stage(&selected, &mut report).await;

        self.persist_stage(&selected, &enrichment, &mut report).await;

        info!(
            "Run {} finished: fetched={} deduplicated={} selected={} summarized={} \
             insights={} embedded={} persisted={}+{} failures={}",
            report.run_id,
            report.fetched,
            report.deduplicated,
            report.selected,
            report.summarized,
            report.insights,
            report.embedded,
            report.persisted.inserted,
            report.persisted.updated,
            report.failures
        );
        report
    }

    /// FETCH: concatenate all enabled sources, isolating per-source
    /// failures, then apply the recency window and minimum-engagement
    /// filter.
    async fn fetch_stage(&self, since: DateTime<Utc>, report: &mut RunReport) -> Vec<ContentItem> {
        let limit_per_topic = self.config.top_n.clamp(1, 10);
        let mut items = Vec::new();

        for source in &self.sources {
            let topics = self.topics_for(source.name());
            match self
                .retry
                .run(|| source.fetch_top_items(&topics, since, limit_per_topic))
                .await
            {
                Ok(fetched) => {
                    info!("Fetched {} items from {}", fetched.len(), source.name());
                    items.extend(fetched);
                }
                Err(e) => {
                    error!("Source {} failed, continuing without it: {}", source.name(), e);
                    report.failures += 1;
                }
            }
        }

        items.retain(|item| {
            item.created_utc >= since && item.num_comments > self.config.min_comments.max(0)
        });
        items
    }

    fn topics_for(&self, source_name: &str) -> Vec<String> {
        match source_name {
            "reddit" => self.config.subreddits.clone(),
            _ => Vec::new(),
        }
    }

    /// ENRICH: per-item summaries and insights (item failures isolated),
    /// then one ordered embedding batch over titles, summaries, and
    /// serialized insights.
    async fn enrich_stage(&self, selected: &[ContentItem], report: &mut RunReport) -> Enrichment {
        let mut enrichment = Enrichment::default();

        for item in selected {
            let comments = self.fetch_comments_for(item, report).await;
            let clean_item = security::redact_item(item);
            let clean_comments: Vec<Comment> =
                comments.iter().map(security::redact_comment).collect();

            match self
                .retry
                .run(|| self.summarizer.summarize(&clean_item, &clean_comments))
                .await
            {
                Ok(summary) => {
                    enrichment.summaries.insert(item.id.clone(), summary);
                }
                Err(e) => {
                    error!("Summarization failed for item {}: {}", item.id, e);
                    report.failures += 1;
                }
            }
        }
        report.summarized = enrichment.summaries.len();

        for item in selected {
            let Some(summary) = enrichment.summaries.get(&item.id) else {
                continue;
            };
            match self
                .retry
                .run(|| self.insight_generator.derive_insights(summary))
                .await
            {
                Ok(insight) => {
                    enrichment.insights.insert(item.id.clone(), insight);
                }
                Err(e) => {
                    error!("Insight derivation failed for item {}: {}", item.id, e);
                    report.failures += 1;
                }
            }
        }
        report.insights = enrichment.insights.len();

        // Embedding batch order: per item its title then its summary, then
        // one serialized insight per item that has one. Positional
        // correspondence with the returned vectors is the contract.
        let mut texts: Vec<String> = Vec::new();
        let mut targets: Vec<(&'static str, String)> = Vec::new();
        for item in selected {
            texts.push(item.title.clone());
            targets.push(("item", item.id.clone()));

            let summary_text = enrichment
                .summaries
                .get(&item.id)
                .map(|s| s.summary.clone())
                .unwrap_or_default();
            texts.push(summary_text);
            targets.push(("item", format!("{}#summary", item.id)));
        }
        for item in selected {
            if let Some(insight) = enrichment.insights.get(&item.id) {
                texts.push(serde_json::to_string(insight).unwrap_or_default());
                targets.push(("insight", item.id.clone()));
            }
        }

        let vectors = match self.retry.run(|| self.embedder.embed(&texts)).await {
            Ok(vectors) => vectors,
            Err(e) => {
                error!("Embedding failed: {}", e);
                report.failures += 1;
                Vec::new()
            }
        };

        enrichment.embeddings = targets
            .into_iter()
            .zip(vectors)
            .map(|((entity_type, entity_id), vector)| EmbeddingTarget {
                entity_type,
                entity_id,
                vector,
            })
            .collect();
        report.embedded = enrichment
            .embeddings
            .iter()
            .filter(|t| !t.vector.is_empty())
            .count();

        enrichment
    }

    async fn fetch_comments_for(&self, item: &ContentItem, report: &mut RunReport) -> Vec<Comment> {
        let Some(source) = self.sources.iter().find(|s| s.name() == item.source) else {
            warn!("No source client for {}, skipping comments", item.source);
            return Vec::new();
        };
        match self
            .retry
            .run(|| source.fetch_comments(&item.id, self.config.top_k_comments))
            .await
        {
            Ok(comments) => comments,
            Err(e) => {
                warn!("Comment fetch failed for item {}: {}", item.id, e);
                report.failures += 1;
                Vec::new()
            }
        }
    }

    /// PERSIST: items, then embeddings with non-empty vectors, then insight
    /// rows. Each artifact write is isolated; a failure never blocks the
    /// remaining artifacts.
    async fn persist_stage(
        &self,
        selected: &[ContentItem],
        enrichment: &Enrichment,
        report: &mut RunReport,
    ) {
        match self.retry.run(|| self.store.upsert_items(selected)).await {
            Ok(result) => report.persisted += result,
            Err(e) => {
                error!("Item upsert failed: {}", e);
                report.failures += 1;
            }
        }

        for target in &enrichment.embeddings {
            if target.vector.is_empty() {
                continue;
            }
            match self
                .retry
                .run(|| {
                    self.store
                        .upsert_embedding(target.entity_type, &target.entity_id, &target.vector)
                })
                .await
            {
                Ok(result) => report.persisted += result,
                Err(e) => {
                    error!(
                        "Embedding upsert failed for {}/{}: {}",
                        target.entity_type, target.entity_id, e
                    );
                    report.failures += 1;
                }
            }
        }

        for item in selected {
            let Some(insight) = enrichment.insights.get(&item.id) else {
                continue;
            };
            let record = InsightRecord {
                id: item.id.clone(),
                item_id: item.id.clone(),
                summary: enrichment.summaries.get(&item.id).cloned(),
                insight: insight.clone(),
                llm_model: self.config.insight_model.clone(),
                prompt_version: "v1".to_string(),
            };
            match self.retry.run(|| self.store.upsert_insight(&record)).await {
                Ok(result) => report.persisted += result,
                Err(e) => {
                    error!("Insight upsert failed for item {}: {}", item.id, e);
                    report.failures += 1;
                }
            }
        }
    }
}

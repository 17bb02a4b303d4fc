use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use super::Store;
use crate::types::{ContentItem, InsightRecord, Result, StructuredSummary, UpsertResult};

/// Postgres-backed store. Every write is `INSERT ... ON CONFLICT ... DO
/// UPDATE`; the `xmax = 0` system-column check distinguishes fresh inserts
/// from updates so callers get accurate write counts.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Connected to Postgres and applied migrations");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn upsert_items(&self, items: &[ContentItem]) -> Result<UpsertResult> {
        debug!("Upserting {} items", items.len());
        let mut result = UpsertResult::default();
        let now = Utc::now();

        for item in items {
            let row = sqlx::query(
                r#"
                INSERT INTO items (id, source, title, author, url, score, num_comments,
                                   created_utc, topic, text, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (id) DO UPDATE SET
                    source = EXCLUDED.source,
                    title = EXCLUDED.title,
                    author = EXCLUDED.author,
                    url = EXCLUDED.url,
                    score = EXCLUDED.score,
                    num_comments = EXCLUDED.num_comments,
                    created_utc = EXCLUDED.created_utc,
                    topic = EXCLUDED.topic,
                    text = EXCLUDED.text,
                    updated_at = EXCLUDED.updated_at
                RETURNING (xmax = 0) AS inserted
                "#,
            )
            .bind(&item.id)
            .bind(&item.source)
            .bind(&item.title)
            .bind(&item.author)
            .bind(item.url.as_str())
            .bind(item.score)
            .bind(item.num_comments)
            .bind(item.created_utc)
            .bind(&item.topic)
            .bind(&item.text)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

            if row.try_get::<bool, _>("inserted")? {
                result.inserted += 1;
            } else {
                result.updated += 1;
            }
        }
        Ok(result)
    }

    async fn upsert_insight(&self, record: &InsightRecord) -> Result<UpsertResult> {
        debug!("Upserting insight {}", record.id);
        let now = Utc::now();
        let summary = record.summary.clone().unwrap_or_else(StructuredSummary::default);

        let row = sqlx::query(
            r#"
            INSERT INTO insights (id, item_id, summary, pain_points, recommendations,
                                  segments, tools_mentioned, key_metrics, evidence_links,
                                  contrarian_take, freelancer_actions, client_playbook,
                                  measurement, risk_watchouts, draft_titles, confidence,
                                  short_rationale, llm_model, prompt_version, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            ON CONFLICT (id) DO UPDATE SET
                item_id = EXCLUDED.item_id,
                summary = EXCLUDED.summary,
                pain_points = EXCLUDED.pain_points,
                recommendations = EXCLUDED.recommendations,
                segments = EXCLUDED.segments,
                tools_mentioned = EXCLUDED.tools_mentioned,
                key_metrics = EXCLUDED.key_metrics,
                evidence_links = EXCLUDED.evidence_links,
                contrarian_take = EXCLUDED.contrarian_take,
                freelancer_actions = EXCLUDED.freelancer_actions,
                client_playbook = EXCLUDED.client_playbook,
                measurement = EXCLUDED.measurement,
                risk_watchouts = EXCLUDED.risk_watchouts,
                draft_titles = EXCLUDED.draft_titles,
                confidence = EXCLUDED.confidence,
                short_rationale = EXCLUDED.short_rationale,
                llm_model = EXCLUDED.llm_model,
                prompt_version = EXCLUDED.prompt_version,
                updated_at = EXCLUDED.updated_at
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&record.id)
        .bind(&record.item_id)
        .bind(&summary.summary)
        .bind(&summary.pain_points)
        .bind(&summary.recommendations)
        .bind(&summary.segments)
        .bind(&summary.tools_mentioned)
        .bind(&summary.key_metrics)
        .bind(&summary.sources)
        .bind(&summary.contrarian_take)
        .bind(&record.insight.freelancer_actions)
        .bind(&record.insight.client_playbook)
        .bind(&record.insight.measurement)
        .bind(&record.insight.risk_watchouts)
        .bind(&record.insight.draft_titles)
        .bind(record.insight.confidence)
        .bind(&record.insight.short_rationale)
        .bind(&record.llm_model)
        .bind(&record.prompt_version)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let inserted = row.try_get::<bool, _>("inserted")?;
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
        debug!("Upserting embedding for {}/{}", entity_type, entity_id);
        let row = sqlx::query(
            r#"
            INSERT INTO embeddings (entity_type, entity_id, embedding, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (entity_type, entity_id) DO UPDATE SET
                embedding = EXCLUDED.embedding,
                updated_at = EXCLUDED.updated_at
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(vector)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        let inserted = row.try_get::<bool, _>("inserted")?;
        Ok(UpsertResult {
            inserted: inserted as u64,
            updated: (!inserted) as u64,
        })
    }
}

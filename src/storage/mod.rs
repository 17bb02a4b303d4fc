pub mod postgres;

pub use postgres::PostgresStore;

use async_trait::async_trait;

use crate::types::{ContentItem, InsightRecord, Result, UpsertResult};

/// Idempotent write interface for pipeline outputs. Repeated identical
/// upserts must not create duplicates; each call reports how many rows were
/// freshly inserted versus updated in place.
#[async_trait]
pub trait Store: Send + Sync {
    /// Upsert selected items, conflict-keyed by item `id`.
    async fn upsert_items(&self, items: &[ContentItem]) -> Result<UpsertResult>;

    /// Upsert one combined summary+insight row, conflict-keyed by record id.
    async fn upsert_insight(&self, record: &InsightRecord) -> Result<UpsertResult>;

    /// Upsert one embedding vector, conflict-keyed by `(entity_type, entity_id)`.
    async fn upsert_embedding(
        &self,
        entity_type: &str,
        entity_id: &str,
        vector: &[f64],
    ) -> Result<UpsertResult>;
}

pub mod hackernews;
pub mod producthunt;
pub mod reddit;

pub use hackernews::HackerNewsClient;
pub use producthunt::ProductHuntClient;
pub use reddit::RedditClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{Comment, ContentItem, Result};

/// Trait for pulling content from social sources (Reddit, HN, Product Hunt).
///
/// Implementations use official APIs only; "no data" is an empty vec, never
/// an error. Genuine transport/auth failures propagate and are handled by
/// the orchestrator's retry and isolation rules.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Source tag stamped on every item this client produces.
    fn name(&self) -> &'static str;

    /// Fetch top items per topic created since the given instant. Sources
    /// without a topic concept ignore `topics` and return one global batch.
    async fn fetch_top_items(
        &self,
        topics: &[String],
        since: DateTime<Utc>,
        limit_per_topic: usize,
    ) -> Result<Vec<ContentItem>>;

    /// Fetch up to `limit` top-level comments for an item.
    async fn fetch_comments(&self, item_id: &str, limit: usize) -> Result<Vec<Comment>>;
}

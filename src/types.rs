use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::retry::Retryable;

/// A normalised content item from any source (Reddit post, HN story, ...).
///
/// Items are immutable once constructed; pipeline stages return new
/// collections rather than mutating their input. `id` is the identity key
/// for dedupe and persistence and is source-scoped, never empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub source: String,
    pub title: String,
    pub author: String,
    pub url: Url,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
    pub created_utc: DateTime<Utc>,
    /// Origin-specific grouping: subreddit, HN story kind, PH topic.
    pub topic: Option<String>,
    pub text: Option<String>,
}

/// A single comment attached to an item, as returned by `fetch_comments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub body: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub author: String,
}

/// Strict-JSON summariser output. Every field defaults so a partially
/// well-formed model response still deserialises.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredSummary {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub pain_points: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub segments: Vec<String>,
    #[serde(default)]
    pub tools_mentioned: Vec<String>,
    #[serde(default)]
    pub key_metrics: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub contrarian_take: String,
}

impl StructuredSummary {
    /// Fallback record for malformed model output: the raw text goes into
    /// `summary`, everything else stays empty.
    pub fn fallback(raw: &str) -> Self {
        Self {
            summary: raw.to_string(),
            ..Self::default()
        }
    }
}

/// Strict-JSON insight output derived from a summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredInsight {
    #[serde(default)]
    pub freelancer_actions: Vec<String>,
    #[serde(default)]
    pub client_playbook: Vec<String>,
    #[serde(default)]
    pub measurement: Vec<String>,
    #[serde(default)]
    pub risk_watchouts: Vec<String>,
    #[serde(default)]
    pub draft_titles: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub short_rationale: String,
}

impl StructuredInsight {
    pub fn fallback(raw: &str) -> Self {
        Self {
            short_rationale: raw.to_string(),
            ..Self::default()
        }
    }
}

/// Combined summary + insight row persisted per selected item, keyed by a
/// stable record id (the item id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightRecord {
    pub id: String,
    pub item_id: String,
    pub summary: Option<StructuredSummary>,
    pub insight: StructuredInsight,
    pub llm_model: String,
    pub prompt_version: String,
}

/// Return contract for idempotent writes; lets the orchestrator log write
/// volume without knowing storage internals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertResult {
    pub inserted: u64,
    pub updated: u64,
}

impl std::ops::AddAssign for UpsertResult {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.updated += rhs.updated;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Retryable for PipelineError {
    /// Transport, database, rate-limit, and server-side failures are
    /// retryable; parse failures, client errors, and bad configuration are
    /// not worth repeating.
    fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Http(_) | PipelineError::Database(_) => true,
            PipelineError::Api { status, .. } => *status == 429 || *status >= 500,
            PipelineError::Migrate(_)
            | PipelineError::InvalidUrl(_)
            | PipelineError::Serialization(_)
            | PipelineError::Malformed(_)
            | PipelineError::Config(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

use clap::{ArgAction, Parser};

use crate::types::{PipelineError, Result};

/// Batch social-content pipeline: fetch, dedupe, rank, enrich, persist.
///
/// Every option is available both as a flag and as an environment variable;
/// the parsed struct is constructed once in `main` and passed by reference
/// into the pipeline and collaborators.
#[derive(Debug, Clone, Parser)]
#[command(name = "pulse-aggregator", version, about)]
pub struct PipelineConfig {
    /// Enable the Reddit source.
    #[arg(long, env = "REDDIT_ENABLED", action = ArgAction::Set, default_value_t = true)]
    pub reddit_enabled: bool,

    /// Enable the Hacker News source.
    #[arg(long, env = "HACKERNEWS_ENABLED", action = ArgAction::Set, default_value_t = false)]
    pub hackernews_enabled: bool,

    /// Enable the Product Hunt source.
    #[arg(long, env = "PRODUCTHUNT_ENABLED", action = ArgAction::Set, default_value_t = false)]
    pub producthunt_enabled: bool,

    #[arg(long, env = "REDDIT_CLIENT_ID", hide_env_values = true)]
    pub reddit_client_id: Option<String>,

    #[arg(long, env = "REDDIT_CLIENT_SECRET", hide_env_values = true)]
    pub reddit_client_secret: Option<String>,

    #[arg(long, env = "REDDIT_USER_AGENT", default_value = "pulse-aggregator/0.1.0")]
    pub reddit_user_agent: String,

    /// Subreddits to pull from, comma separated.
    #[arg(
        long,
        env = "SUBREDDITS",
        value_delimiter = ',',
        default_value = "technology,programming"
    )]
    pub subreddits: Vec<String>,

    /// Recency window applied to fetched items.
    #[arg(long, env = "LOOKBACK_DAYS", default_value_t = 30)]
    pub lookback_days: i64,

    /// Items must have strictly more comments than this to proceed.
    #[arg(long, env = "MIN_COMMENTS", default_value_t = 5)]
    pub min_comments: i64,

    /// How many ranked items are selected for enrichment.
    #[arg(long, env = "TOP_N_POSTS", default_value_t = 20)]
    pub top_n: usize,

    /// How many top comments feed each summary.
    #[arg(long, env = "TOP_K_COMMENTS", default_value_t = 5)]
    pub top_k_comments: usize,

    #[arg(long, env = "HTTP_TIMEOUT_SECONDS", default_value_t = 60)]
    pub http_timeout_secs: u64,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "LLM_MODEL_SUMMARISER", default_value = "gpt-4o-mini")]
    pub summarizer_model: String,

    #[arg(long, env = "LLM_MODEL_INSIGHTS", default_value = "gpt-4o-mini")]
    pub insight_model: String,

    #[arg(long, env = "EMBEDDINGS_MODEL", default_value = "text-embedding-3-large")]
    pub embedding_model: String,

    #[arg(long, env = "EMBEDDINGS_DIM", default_value_t = 3072)]
    pub embedding_dim: usize,

    #[arg(long, env = "PRODUCTHUNT_TOKEN", hide_env_values = true)]
    pub producthunt_token: Option<String>,

    /// Optional Slack webhook for the end-of-run summary.
    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    pub slack_webhook_url: Option<String>,

    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,
}

impl PipelineConfig {
    /// Check cross-field requirements that clap cannot express. Failures
    /// here are fatal: no stage runs on a half-configured process.
    pub fn validate(&self) -> Result<()> {
        if self.reddit_enabled
            && (self.reddit_client_id.is_none() || self.reddit_client_secret.is_none())
        {
            return Err(PipelineError::Config(
                "REDDIT_CLIENT_ID and REDDIT_CLIENT_SECRET are required when Reddit is enabled"
                    .to_string(),
            ));
        }
        if self.producthunt_enabled && self.producthunt_token.is_none() {
            return Err(PipelineError::Config(
                "PRODUCTHUNT_TOKEN is required when Product Hunt is enabled".to_string(),
            ));
        }
        if self.openai_api_key.is_none() {
            return Err(PipelineError::Config(
                "OPENAI_API_KEY is required for the enrichment stage".to_string(),
            ));
        }
        if self.embedding_dim == 0 {
            return Err(PipelineError::Config(
                "EMBEDDINGS_DIM must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

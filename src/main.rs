use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pulse_aggregator::llm::OpenAiClient;
use pulse_aggregator::notify::SlackNotifier;
use pulse_aggregator::sources::{
    HackerNewsClient, ProductHuntClient, RedditClient, SourceClient,
};
use pulse_aggregator::storage::PostgresStore;
use pulse_aggregator::{Pipeline, PipelineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Configuration failures are the only fatal path; everything after this
    // point completes with partial results at worst.
    let config = PipelineConfig::parse();
    config.validate().context("invalid configuration")?;

    let store = PostgresStore::connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    let timeout = Duration::from_secs(config.http_timeout_secs);
    let user_agent = format!("pulse-aggregator/{}", env!("CARGO_PKG_VERSION"));
    let mut sources: Vec<Box<dyn SourceClient>> = Vec::new();
    if config.reddit_enabled {
        let client_id = config
            .reddit_client_id
            .clone()
            .ok_or_else(|| anyhow!("REDDIT_CLIENT_ID is required when Reddit is enabled"))?;
        let client_secret = config
            .reddit_client_secret
            .clone()
            .ok_or_else(|| anyhow!("REDDIT_CLIENT_SECRET is required when Reddit is enabled"))?;
        sources.push(Box::new(RedditClient::new(
            client_id,
            client_secret,
            config.reddit_user_agent.clone(),
            timeout,
        )?));
    }
    if config.hackernews_enabled {
        sources.push(Box::new(HackerNewsClient::new(user_agent.clone(), timeout)?));
    }
    if config.producthunt_enabled {
        let token = config
            .producthunt_token
            .clone()
            .ok_or_else(|| anyhow!("PRODUCTHUNT_TOKEN is required when Product Hunt is enabled"))?;
        sources.push(Box::new(ProductHuntClient::new(
            token,
            user_agent.clone(),
            timeout,
        )?));
    }
    info!("Configured {} sources", sources.len());

    let api_key = config
        .openai_api_key
        .clone()
        .ok_or_else(|| anyhow!("OPENAI_API_KEY is required for the enrichment stage"))?;
    let llm = OpenAiClient::new(&config, api_key)?;

    let notifier = SlackNotifier::new(config.slack_webhook_url.clone());

    let pipeline = Pipeline::new(
        config,
        sources,
        Box::new(llm.clone()),
        Box::new(llm.clone()),
        Box::new(llm),
        Box::new(store),
    );
    let report = pipeline.run().await;

    if let Err(e) = notifier.notify_run(&report).await {
        warn!("Slack notification failed: {}", e);
    }

    // Partial per-item failures are not process failures.
    Ok(())
}

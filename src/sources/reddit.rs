use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use super::SourceClient;
use crate::types::{Comment, ContentItem, PipelineError, Result};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";

/// Reddit source backed by the official OAuth2 API (client-credentials
/// grant). Never scrapes HTML.
pub struct RedditClient {
    http: Client,
    client_id: String,
    client_secret: String,
    token: RwLock<Option<String>>,
}

impl RedditClient {
    pub fn new(
        client_id: String,
        client_secret: String,
        user_agent: String,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()?;
        Ok(Self {
            http,
            client_id,
            client_secret,
            token: RwLock::new(None),
        })
    }

    /// Obtain (and cache for the run) an application-only access token.
    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.as_ref() {
            return Ok(token.clone());
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        debug!("Requesting Reddit access token");
        let response = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Api {
                status: status.as_u16(),
                message: format!("Reddit token request failed: {}", response.text().await?),
            });
        }

        let token: TokenResponse = response.json().await?;
        *self.token.write().await = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    async fn get_listing(&self, path: &str) -> Result<Listing> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(format!("{API_BASE}{path}"))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Api {
                status: status.as_u16(),
                message: format!("Reddit listing {path} failed"),
            });
        }
        Ok(response.json().await?)
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    #[serde(default)]
    kind: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SubmissionData {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: i64,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    subreddit: Option<String>,
    #[serde(default)]
    selftext: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentData {
    #[serde(default)]
    id: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    author: Option<String>,
}

fn submission_to_item(data: SubmissionData, fallback_topic: &str) -> Option<ContentItem> {
    if data.id.is_empty() {
        return None;
    }
    // Link posts carry the external URL; self posts fall back to the
    // permalink on reddit.com.
    let url = data
        .url
        .as_deref()
        .and_then(|u| Url::parse(u).ok())
        .or_else(|| {
            data.permalink
                .as_deref()
                .and_then(|p| Url::parse(&format!("https://www.reddit.com{p}")).ok())
        })?;
    let created_utc =
        DateTime::from_timestamp(data.created_utc as i64, 0).unwrap_or(DateTime::UNIX_EPOCH);
    let text = data.selftext.filter(|t| !t.is_empty());
    Some(ContentItem {
        id: data.id,
        source: "reddit".to_string(),
        title: data.title,
        author: data.author.unwrap_or_default(),
        url,
        score: data.score,
        num_comments: data.num_comments,
        created_utc,
        topic: Some(
            data.subreddit
                .unwrap_or_else(|| fallback_topic.to_string()),
        ),
        text,
    })
}

#[async_trait]
impl SourceClient for RedditClient {
    fn name(&self) -> &'static str {
        "reddit"
    }

    async fn fetch_top_items(
        &self,
        topics: &[String],
        since: DateTime<Utc>,
        limit_per_topic: usize,
    ) -> Result<Vec<ContentItem>> {
        info!(
            "Fetching Reddit submissions for {} subreddits since {}",
            topics.len(),
            since
        );

        let mut items = Vec::new();
        for sub in topics {
            let listing = self
                .get_listing(&format!("/r/{sub}/hot?limit={limit_per_topic}&raw_json=1"))
                .await?;
            for thing in listing.data.children {
                if thing.kind != "t3" {
                    continue;
                }
                let Ok(data) = serde_json::from_value::<SubmissionData>(thing.data) else {
                    continue;
                };
                if let Some(item) = submission_to_item(data, sub) {
                    if item.created_utc >= since {
                        items.push(item);
                    }
                }
            }
        }
        info!("Fetched {} Reddit submissions", items.len());
        Ok(items)
    }

    async fn fetch_comments(&self, item_id: &str, limit: usize) -> Result<Vec<Comment>> {
        debug!("Fetching Reddit comments for {}", item_id);

        // The comments endpoint returns two listings: the submission itself,
        // then its comment tree.
        let token = self.access_token().await?;
        let response = self
            .http
            .get(format!(
                "{API_BASE}/comments/{item_id}?limit={limit}&depth=1&raw_json=1"
            ))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Api {
                status: status.as_u16(),
                message: format!("Reddit comments for {item_id} failed"),
            });
        }

        let listings: Vec<Listing> = response.json().await?;
        let Some(comment_listing) = listings.into_iter().nth(1) else {
            return Ok(Vec::new());
        };

        let mut comments = Vec::new();
        for thing in comment_listing.data.children {
            // "more" placeholders have no body and are skipped.
            if thing.kind != "t1" {
                continue;
            }
            let Ok(data) = serde_json::from_value::<CommentData>(thing.data) else {
                continue;
            };
            let Some(body) = data.body.filter(|b| !b.is_empty()) else {
                continue;
            };
            comments.push(Comment {
                id: data.id,
                body,
                score: data.score,
                author: data.author.unwrap_or_default(),
            });
            if comments.len() >= limit {
                break;
            }
        }
        Ok(comments)
    }
}

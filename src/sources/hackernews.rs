use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::SourceClient;
use crate::types::{Comment, ContentItem, PipelineError, Result};

const API_BASE: &str = "https://hn.algolia.com/api/v1";

/// Hacker News source backed by the public Algolia search API.
pub struct HackerNewsClient {
    http: Client,
}

impl HackerNewsClient {
    pub fn new(user_agent: String, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()?;
        Ok(Self { http })
    }

    async fn search(
        &self,
        query: Option<&str>,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        let mut request = self
            .http
            .get(format!("{API_BASE}/search_by_date"))
            .query(&[
                ("tags", "story".to_string()),
                ("numericFilters", format!("created_at_i>{}", since.timestamp())),
                ("hitsPerPage", limit.to_string()),
            ]);
        if let Some(query) = query {
            request = request.query(&[("query", query)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Api {
                status: status.as_u16(),
                message: "HN search failed".to_string(),
            });
        }

        #[derive(Deserialize)]
        struct SearchResponse {
            hits: Vec<Hit>,
        }

        #[derive(Deserialize)]
        struct Hit {
            #[serde(rename = "objectID")]
            object_id: String,
            #[serde(default)]
            title: Option<String>,
            #[serde(default)]
            url: Option<String>,
            #[serde(default)]
            author: Option<String>,
            #[serde(default)]
            points: Option<i64>,
            #[serde(default)]
            num_comments: Option<i64>,
            #[serde(default)]
            created_at_i: i64,
            #[serde(default)]
            story_text: Option<String>,
        }

        let body: SearchResponse = response.json().await?;
        let items = body
            .hits
            .into_iter()
            .filter_map(|hit| {
                // Stories without an external link live on HN itself.
                let url = hit
                    .url
                    .as_deref()
                    .and_then(|u| Url::parse(u).ok())
                    .or_else(|| {
                        Url::parse(&format!(
                            "https://news.ycombinator.com/item?id={}",
                            hit.object_id
                        ))
                        .ok()
                    })?;
                let created_utc = DateTime::from_timestamp(hit.created_at_i, 0)
                    .unwrap_or(DateTime::UNIX_EPOCH);
                Some(ContentItem {
                    id: hit.object_id,
                    source: "hackernews".to_string(),
                    title: hit.title.unwrap_or_default(),
                    author: hit.author.unwrap_or_default(),
                    url,
                    score: hit.points.unwrap_or(0),
                    num_comments: hit.num_comments.unwrap_or(0),
                    created_utc,
                    topic: query.map(|q| q.to_string()),
                    text: hit.story_text.filter(|t| !t.is_empty()),
                })
            })
            .collect();
        Ok(items)
    }
}

#[async_trait]
impl SourceClient for HackerNewsClient {
    fn name(&self) -> &'static str {
        "hackernews"
    }

    async fn fetch_top_items(
        &self,
        topics: &[String],
        since: DateTime<Utc>,
        limit_per_topic: usize,
    ) -> Result<Vec<ContentItem>> {
        info!("Fetching HN stories since {}", since);

        // HN has no topic scoping of its own; topics become search queries
        // when supplied, otherwise one global batch of recent stories.
        let mut items = Vec::new();
        if topics.is_empty() {
            items.extend(self.search(None, since, limit_per_topic).await?);
        } else {
            for topic in topics {
                items.extend(self.search(Some(topic.as_str()), since, limit_per_topic).await?);
            }
        }
        info!("Fetched {} HN stories", items.len());
        Ok(items)
    }

    async fn fetch_comments(&self, item_id: &str, limit: usize) -> Result<Vec<Comment>> {
        debug!("Fetching HN comments for {}", item_id);

        let response = self
            .http
            .get(format!("{API_BASE}/items/{item_id}"))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Api {
                status: status.as_u16(),
                message: format!("HN item {item_id} failed"),
            });
        }

        #[derive(Deserialize)]
        struct Item {
            #[serde(default)]
            children: Vec<Child>,
        }

        #[derive(Deserialize)]
        struct Child {
            #[serde(default)]
            id: Option<i64>,
            #[serde(default)]
            text: Option<String>,
            #[serde(default)]
            author: Option<String>,
            #[serde(default)]
            points: Option<i64>,
        }

        let item: Item = response.json().await?;
        let comments = item
            .children
            .into_iter()
            .filter_map(|child| {
                let body = child.text.filter(|t| !t.is_empty())?;
                Some(Comment {
                    id: child.id.map(|id| id.to_string()).unwrap_or_default(),
                    body,
                    score: child.points.unwrap_or(0),
                    author: child.author.unwrap_or_default(),
                })
            })
            .take(limit)
            .collect();
        Ok(comments)
    }
}

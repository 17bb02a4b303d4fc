use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use super::SourceClient;
use crate::types::{Comment, ContentItem, PipelineError, Result};

const API_URL: &str = "https://api.producthunt.com/v2/api/graphql";

/// Product Hunt source backed by the official GraphQL v2 API.
pub struct ProductHuntClient {
    http: Client,
    token: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

impl ProductHuntClient {
    pub fn new(token: String, user_agent: String, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()?;
        Ok(Self { http, token })
    }

    async fn query<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T> {
        let response = self
            .http
            .post(API_URL)
            .bearer_auth(&self.token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Api {
                status: status.as_u16(),
                message: "Product Hunt GraphQL request failed".to_string(),
            });
        }

        let body: GraphQlResponse<T> = response.json().await?;
        if let Some(errors) = body.errors {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(PipelineError::Malformed(format!(
                "Product Hunt GraphQL errors: {}",
                messages.join("; ")
            )));
        }
        body.data
            .ok_or_else(|| PipelineError::Malformed("Product Hunt response without data".into()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostsData {
    posts: Connection<PostNode>,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostNode {
    id: String,
    name: String,
    #[serde(default)]
    tagline: Option<String>,
    url: String,
    #[serde(default)]
    votes_count: i64,
    #[serde(default)]
    comments_count: i64,
    created_at: DateTime<Utc>,
    #[serde(default)]
    user: Option<UserNode>,
}

#[derive(Debug, Deserialize)]
struct UserNode {
    #[serde(default)]
    username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostCommentsData {
    post: Option<PostComments>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostComments {
    comments: Connection<CommentNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentNode {
    id: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    votes_count: i64,
    #[serde(default)]
    user: Option<UserNode>,
}

#[async_trait]
impl SourceClient for ProductHuntClient {
    fn name(&self) -> &'static str {
        "producthunt"
    }

    async fn fetch_top_items(
        &self,
        _topics: &[String],
        since: DateTime<Utc>,
        limit_per_topic: usize,
    ) -> Result<Vec<ContentItem>> {
        info!("Fetching Product Hunt posts since {}", since);

        const QUERY: &str = r#"
            query Posts($postedAfter: DateTime!, $first: Int!) {
                posts(order: VOTES, postedAfter: $postedAfter, first: $first) {
                    edges {
                        node {
                            id
                            name
                            tagline
                            url
                            votesCount
                            commentsCount
                            createdAt
                            user { username }
                        }
                    }
                }
            }
        "#;

        let data: PostsData = self
            .query(
                QUERY,
                json!({
                    "postedAfter": since.to_rfc3339(),
                    "first": limit_per_topic,
                }),
            )
            .await?;

        let items = data
            .posts
            .edges
            .into_iter()
            .filter_map(|edge| {
                let node = edge.node;
                let url = Url::parse(&node.url).ok()?;
                Some(ContentItem {
                    id: node.id,
                    source: "producthunt".to_string(),
                    title: node.name,
                    author: node.user.map(|u| u.username).unwrap_or_default(),
                    url,
                    score: node.votes_count,
                    num_comments: node.comments_count,
                    created_utc: node.created_at,
                    topic: None,
                    text: node.tagline.filter(|t| !t.is_empty()),
                })
            })
            .collect::<Vec<_>>();
        info!("Fetched {} Product Hunt posts", items.len());
        Ok(items)
    }

    async fn fetch_comments(&self, item_id: &str, limit: usize) -> Result<Vec<Comment>> {
        debug!("Fetching Product Hunt comments for {}", item_id);

        const QUERY: &str = r#"
            query PostComments($id: ID!, $first: Int!) {
                post(id: $id) {
                    comments(first: $first) {
                        edges {
                            node {
                                id
                                body
                                votesCount
                                user { username }
                            }
                        }
                    }
                }
            }
        "#;

        let data: PostCommentsData = self
            .query(QUERY, json!({ "id": item_id, "first": limit }))
            .await?;

        let Some(post) = data.post else {
            return Ok(Vec::new());
        };
        let comments = post
            .comments
            .edges
            .into_iter()
            .filter(|edge| !edge.node.body.is_empty())
            .map(|edge| Comment {
                id: edge.node.id,
                body: edge.node.body,
                score: edge.node.votes_count,
                author: edge.node.user.map(|u| u.username).unwrap_or_default(),
            })
            .collect();
        Ok(comments)
    }
}

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use super::{truncate_chars, OpenAiClient};
use crate::types::{Comment, ContentItem, Result, StructuredSummary};

const SYSTEM_PROMPT: &str =
    "You are a rigorous marketing analyst. Be concise, factual, and specific. UK English.";

/// Coarse truncation guards applied before the request leaves the process.
const MAX_COMMENT_CHARS: usize = 800;
const MAX_CONTENT_CHARS: usize = 2000;

/// Summarizes one item plus its top comments into a structured record.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        item: &ContentItem,
        top_comments: &[Comment],
    ) -> Result<StructuredSummary>;
}

fn build_user_content(item: &ContentItem, top_comments: &[Comment]) -> String {
    let comments_str = top_comments
        .iter()
        .map(|c| format!("- [score {}] {}", c.score, truncate_chars(&c.body, MAX_COMMENT_CHARS)))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Post title:\n{}\n\nPost body:\n{}\n\nTop comments (truncated):\n{}",
        item.title,
        item.text.as_deref().unwrap_or(""),
        comments_str
    )
}

fn response_format() -> serde_json::Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "summariser_schema",
            "schema": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "summary": {"type": "string"},
                    "pain_points": {"type": "array", "items": {"type": "string"}},
                    "recommendations": {"type": "array", "items": {"type": "string"}},
                    "segments": {"type": "array", "items": {"type": "string"}},
                    "tools_mentioned": {"type": "array", "items": {"type": "string"}},
                    "contrarian_take": {"type": "string"},
                    "key_metrics": {"type": "array", "items": {"type": "string"}},
                    "sources": {"type": "array", "items": {"type": "string"}}
                },
                "required": [
                    "summary",
                    "pain_points",
                    "recommendations",
                    "segments",
                    "tools_mentioned",
                    "contrarian_take",
                    "key_metrics",
                    "sources"
                ]
            },
            "strict": true
        }
    })
}

#[async_trait]
impl Summarizer for OpenAiClient {
    async fn summarize(
        &self,
        item: &ContentItem,
        top_comments: &[Comment],
    ) -> Result<StructuredSummary> {
        info!("Summarising item {}", item.id);

        let content = truncate_chars(&build_user_content(item, top_comments), MAX_CONTENT_CHARS);
        let user = format!(
            "Provide post title + body + top comments (with scores).\n\
             Return strict JSON with keys: summary, pain_points[], recommendations[], segments[], \
             tools_mentioned[], contrarian_take, key_metrics[], sources[].\n\n{content}"
        );

        let raw = self
            .chat_json(&self.summarizer_model, SYSTEM_PROMPT, &user, response_format())
            .await?;

        // Malformed model output is not an error: keep the raw text as the
        // summary so storage stays strict.
        Ok(serde_json::from_str(&raw).unwrap_or_else(|_| StructuredSummary::fallback(&raw)))
    }
}

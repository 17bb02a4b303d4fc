use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use super::OpenAiClient;
use crate::types::{Result, StructuredInsight, StructuredSummary};

const SYSTEM_PROMPT: &str = "You are a senior B2B marketing strategist in the UK.";

/// Derives portfolio-fit insights from a structured summary.
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    async fn derive_insights(&self, summary: &StructuredSummary) -> Result<StructuredInsight>;
}

fn response_format() -> serde_json::Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "insight_schema",
            "schema": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "freelancer_actions": {"type": "array", "items": {"type": "string"}},
                    "client_playbook": {"type": "array", "items": {"type": "string"}},
                    "measurement": {"type": "array", "items": {"type": "string"}},
                    "risk_watchouts": {"type": "array", "items": {"type": "string"}},
                    "draft_titles": {"type": "array", "items": {"type": "string"}},
                    "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                    "short_rationale": {"type": "string"}
                },
                "required": [
                    "freelancer_actions",
                    "client_playbook",
                    "measurement",
                    "risk_watchouts",
                    "draft_titles",
                    "confidence",
                    "short_rationale"
                ]
            },
            "strict": true
        }
    })
}

#[async_trait]
impl InsightGenerator for OpenAiClient {
    async fn derive_insights(&self, summary: &StructuredSummary) -> Result<StructuredInsight> {
        info!("Deriving insights");

        let user = format!(
            "Given the following summariser JSON, return strict JSON with keys: \
             freelancer_actions[], client_playbook[], measurement[], risk_watchouts[], \
             draft_titles[], plus a confidence 0.0-1.0 and short_rationale.\n\n{}",
            serde_json::to_string(summary)?
        );

        let raw = self
            .chat_json(&self.insight_model, SYSTEM_PROMPT, &user, response_format())
            .await?;

        Ok(serde_json::from_str(&raw).unwrap_or_else(|_| StructuredInsight::fallback(&raw)))
    }
}

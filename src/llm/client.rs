use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::types::{PipelineError, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-backed implementation of the enrichment collaborators
/// (summarizer, insight generator, embedder). One client serves all three;
/// model names come from configuration.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
    pub(crate) summarizer_model: String,
    pub(crate) insight_model: String,
    pub(crate) embedding_model: String,
    pub(crate) embedding_dim: usize,
}

impl OpenAiClient {
    pub fn new(config: &PipelineConfig, api_key: String) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("pulse-aggregator/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            summarizer_model: config.summarizer_model.clone(),
            insight_model: config.insight_model.clone(),
            embedding_model: config.embedding_model.clone(),
            embedding_dim: config.embedding_dim,
        })
    }

    /// Point the client at a different endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// One schema-constrained chat completion; returns the raw message
    /// content for the caller to parse.
    pub(crate) async fn chat_json(
        &self,
        model: &str,
        system: &str,
        user: &str,
        response_format: serde_json::Value,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            response_format: serde_json::Value,
        }

        #[derive(Deserialize)]
        struct Response {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }

        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        debug!("Chat completion via {}", model);
        let request = Request {
            model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
            response_format,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: Response = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| PipelineError::Malformed("chat completion without content".into()))
    }

    /// One embeddings call for a batch of non-empty texts; returns vectors
    /// in input order.
    pub(crate) async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f64>>> {
        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            input: &'a [&'a str],
        }

        #[derive(Deserialize)]
        struct Response {
            data: Vec<Datum>,
        }

        #[derive(Deserialize)]
        struct Datum {
            embedding: Vec<f64>,
        }

        debug!("Embedding {} texts via {}", texts.len(), self.embedding_model);
        let response = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&Request {
                model: &self.embedding_model,
                input: texts,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: Response = response.json().await?;
        if body.data.len() != texts.len() {
            return Err(PipelineError::Malformed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.data.len()
            )));
        }
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }
}

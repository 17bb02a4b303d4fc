use async_trait::async_trait;
use tracing::info;

use super::OpenAiClient;
use crate::types::Result;

/// Batch embedding collaborator.
///
/// Returns one vector per input text in order. Empty/whitespace-only inputs
/// map to an explicit empty vector without a remote call; non-empty vectors
/// are padded or truncated to the configured dimension.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>>;
}

/// Positions and contents of the inputs that actually go to the API.
fn non_blank(texts: &[String]) -> Vec<(usize, &str)> {
    texts
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.trim().is_empty())
        .map(|(i, t)| (i, t.as_str()))
        .collect()
}

/// Place returned vectors back at their original positions, padding or
/// truncating each to `dim`. Blank positions keep an empty vector.
fn restore_positions(
    len: usize,
    indexed: Vec<(usize, &str)>,
    vectors: Vec<Vec<f64>>,
    dim: usize,
) -> Vec<Vec<f64>> {
    let mut result: Vec<Vec<f64>> = vec![Vec::new(); len];
    for ((orig_idx, _), mut vector) in indexed.into_iter().zip(vectors) {
        vector.resize(dim, 0.0);
        result[orig_idx] = vector;
    }
    result
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        info!("Embedding {} texts", texts.len());
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let indexed = non_blank(texts);
        if indexed.is_empty() {
            return Ok(vec![Vec::new(); texts.len()]);
        }

        let inputs: Vec<&str> = indexed.iter().map(|(_, t)| *t).collect();
        let vectors = self.embed_batch(&inputs).await?;
        Ok(restore_positions(texts.len(), indexed, vectors, self.embedding_dim))
    }
}

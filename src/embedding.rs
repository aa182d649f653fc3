//! Embedding provider abstraction and the Gemini implementation.
//!
//! Defines the [`Embedder`] trait consumed by the index builder and the
//! retriever, plus vector utilities shared with index persistence:
//!
//! - [`cosine_similarity`] — similarity between two embedding vectors
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes for
//!   SQLite BLOB storage
//! - [`blob_to_vec`] — decode a SQLite BLOB back into a `Vec<f32>`
//!
//! # Retry Strategy
//!
//! The Gemini embedder uses exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::QaError;

/// Maps text to a fixed-dimension float vector.
///
/// Implementations must be deterministic enough that identical text yields
/// reproducible nearest-neighbor behavior across an index save/load cycle.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"embedding-001"`).
    fn model_name(&self) -> &str;
    /// Embedding vector dimensionality (e.g. `768`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, QaError>;
}

/// Embed a single query text.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>, QaError> {
    let results = embedder.embed_batch(&[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| QaError::Embedding("empty embedding response".to_string()))
}

/// Embedding provider backed by the Gemini `batchEmbedContents` API.
///
/// Requires the `GEMINI_API_KEY` environment variable. Requests are split
/// into batches of `batch_size` texts per API call.
pub struct GeminiEmbedder {
    model: String,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
    timeout_secs: u64,
    base_url: String,
    api_key: String,
}

impl GeminiEmbedder {
    /// Create a new Gemini embedder from configuration.
    ///
    /// Fails fast when `GEMINI_API_KEY` is not set, before any documents
    /// are processed.
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY environment variable not set"))?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            batch_size: config.batch_size,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key,
        })
    }

    async fn embed_one_batch(
        &self,
        client: &reqwest::Client,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, QaError> {
        let url = format!(
            "{}/models/{}:batchEmbedContents?key={}",
            self.base_url, self.model, self.api_key
        );

        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|t| {
                serde_json::json!({
                    "model": format!("models/{}", self.model),
                    "content": { "parts": [{ "text": t }] },
                })
            })
            .collect();
        let body = serde_json::json!({ "requests": requests });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client.post(&url).json(&body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| QaError::Embedding(e.to_string()))?;
                        return parse_embed_response(&json, self.dims);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(QaError::Embedding(format!(
                            "Gemini API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(QaError::Embedding(format!(
                        "Gemini API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(QaError::Embedding(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| QaError::Embedding("embedding failed after retries".to_string())))
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, QaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| QaError::Embedding(e.to_string()))?;

        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1)) {
            out.extend(self.embed_one_batch(&client, batch).await?);
        }
        Ok(out)
    }
}

/// Parse the `batchEmbedContents` response JSON.
///
/// Extracts `embeddings[].values` in order and checks each vector against
/// the configured dimensionality.
fn parse_embed_response(json: &serde_json::Value, dims: usize) -> Result<Vec<Vec<f32>>, QaError> {
    let data = json
        .get("embeddings")
        .and_then(|d| d.as_array())
        .ok_or_else(|| {
            QaError::Embedding("invalid response: missing embeddings array".to_string())
        })?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let values = item
            .get("values")
            .and_then(|v| v.as_array())
            .ok_or_else(|| QaError::Embedding("invalid response: missing values".to_string()))?;

        let vec: Vec<f32> = values
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        if vec.len() != dims {
            return Err(QaError::Embedding(format!(
                "expected {} dims, got {}",
                dims,
                vec.len()
            )));
        }

        embeddings.push(vec);
    }

    Ok(embeddings)
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing a BLOB
/// of `vec.len() × 4` bytes. The round trip through [`blob_to_vec`] is
/// bit-for-bit exact, which is what makes index save/load reproducible.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors of
/// different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_or_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_parse_embed_response() {
        let json = serde_json::json!({
            "embeddings": [
                { "values": [0.1, 0.2, 0.3] },
                { "values": [0.4, 0.5, 0.6] },
            ]
        });
        let vecs = parse_embed_response(&json, 3).unwrap();
        assert_eq!(vecs.len(), 2);
        assert!((vecs[1][0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_parse_embed_response_dims_mismatch() {
        let json = serde_json::json!({ "embeddings": [{ "values": [0.1, 0.2] }] });
        let err = parse_embed_response(&json, 3).unwrap_err();
        assert!(matches!(err, QaError::Embedding(_)));
    }

    #[test]
    fn test_parse_embed_response_missing_array() {
        let json = serde_json::json!({ "error": "nope" });
        assert!(parse_embed_response(&json, 3).is_err());
    }
}

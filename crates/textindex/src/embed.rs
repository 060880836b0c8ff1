//! Embedding generation for vector search.
//!
//! [`HttpEmbedder`] speaks the OpenAI-compatible `/embeddings` endpoint;
//! anything else (including test stubs) can plug in through the
//! [`Embedder`] trait. Vectors are stored as packed little-endian f32
//! bytes.

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

pub(crate) const EMBED_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DIM: usize = 1536;

/// Produces a fixed-dimension vector for a text.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;
}

/// Embedding API configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub dim: usize,
}

impl EmbedConfig {
    /// Build a config from `KVFS_EMBED_*` variables. Returns `None`
    /// without an API key, in which case vector features stay off.
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("KVFS_EMBED_API_KEY").ok()?;
        if api_key.is_empty() {
            return None;
        }
        let base_url =
            env::var("KVFS_EMBED_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = env::var("KVFS_EMBED_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let dim = env::var("KVFS_EMBED_DIM")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_DIM);
        Some(Self {
            api_key,
            base_url,
            model,
            dim,
        })
    }
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    data: Vec<EmbedData>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f64>,
    index: usize,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

/// [`Embedder`] backed by an OpenAI-compatible embedding API.
pub struct HttpEmbedder {
    http: reqwest::Client,
    config: EmbedConfig,
}

impl HttpEmbedder {
    pub fn new(config: EmbedConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(EMBED_TIMEOUT_SECONDS))
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self { http, config })
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let count = texts.len();
        let request = EmbedRequest {
            model: self.config.model.clone(),
            input: texts,
        };
        let body = serde_json::to_string(&request).context("encode embedding request")?;
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .with_context(|| format!("failed to send request to {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(anyhow!("HTTP {status} error from {url}: {error_text}"));
        }

        let json_text = response.text().await.context("read response body")?;
        let parsed: EmbedResponse =
            serde_json::from_str(&json_text).context("parse embedding response")?;

        if let Some(error) = parsed.error {
            return Err(anyhow!("embedding API error: {}", error.message));
        }

        let mut results = vec![Vec::new(); count];
        for item in parsed.data {
            if item.index < results.len() {
                results[item.index] = item.embedding.iter().map(|&v| v as f32).collect();
            }
        }
        Ok(results)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut results = self.embed_batch(vec![text.to_string()]).await?;
        let vector = results
            .pop()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow!("embedding API returned no vector"))?;
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.config.dim
    }
}

/// Pack a vector as little-endian f32 bytes for storage.
pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Inverse of [`vector_to_bytes`]. Trailing partial values are dropped.
pub fn bytes_to_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity of two vectors; zero when either has no magnitude
/// or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        dot += f64::from(x) * f64::from(y);
        norm_a += f64::from(x) * f64::from(x);
        norm_b += f64::from(y) * f64::from(y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

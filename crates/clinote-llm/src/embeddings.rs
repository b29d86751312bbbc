//! Text embeddings used to make persisted extractions searchable.
//!
//! - [`MockEmbedder`]: deterministic vectors for tests
//! - [`OpenAiEmbedder`]: any OpenAI-compatible `/embeddings` endpoint
//! - [`BoundedEmbedder`]: wraps another embedder with a per-call timeout and
//!   short-circuits empty input

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{LlmError, Result};

/// Default per-call bound for embedding requests.
pub const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(30);

// ─────────────────────────────────────────────────────────────────────────────
// Embedder Trait
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Sequential by default. Remote embedders override this with one request.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    fn dimensions(&self) -> usize;

    fn name(&self) -> &str;
}

pub type SharedEmbedder = Arc<dyn Embedder>;

// ─────────────────────────────────────────────────────────────────────────────
// Bounded Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// Enforces the embedding contract callers rely on: empty (or whitespace)
/// text yields an empty vector without calling out, and no single call runs
/// longer than `timeout`.
pub struct BoundedEmbedder {
    inner: SharedEmbedder,
    timeout: Duration,
}

impl BoundedEmbedder {
    pub fn new(inner: SharedEmbedder, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn shared(inner: SharedEmbedder) -> SharedEmbedder {
        Arc::new(Self::new(inner, DEFAULT_EMBED_TIMEOUT))
    }
}

#[async_trait]
impl Embedder for BoundedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        tokio::time::timeout(self.timeout, self.inner.embed(text))
            .await
            .map_err(|_| {
                LlmError::Network(format!(
                    "embedding via {} timed out after {}s",
                    self.inner.name(),
                    self.timeout.as_secs()
                ))
            })?
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// Hash-seeded unit vectors: equal text gives equal vectors, nothing else is promised.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimensions: usize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut state = text
            .bytes()
            .fold(5381u64, |h, b| h.wrapping_mul(33).wrapping_add(b as u64));
        let mut embedding: Vec<f32> = (0..self.dimensions)
            .map(|_| {
                state = state.wrapping_mul(1103515245).wrapping_add(12345);
                ((state >> 16) as u16 as f32 / 32768.0) - 1.0
            })
            .collect();

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            embedding.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI Embedder
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OpenAiEmbedderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Requested output size, for models that support shortening.
    pub dimensions: Option<usize>,
    pub timeout: Duration,
}

impl OpenAiEmbedderConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: None,
            timeout: DEFAULT_EMBED_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiEmbedderConfig,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiEmbedderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let dimensions = config.dimensions.unwrap_or(match config.model.as_str() {
            "text-embedding-3-large" => 3072,
            "nomic-embed-text" => 768,
            _ => 1536,
        });

        Ok(Self {
            client,
            config,
            dimensions,
        })
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.config.base_url)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingRequest {
            model: self.config.model.clone(),
            input: texts.iter().map(|s| s.to_string()).collect(),
            dimensions: self.config.dimensions,
        };

        let mut builder = self.client.post(self.embeddings_url()).json(&request);
        if let Some(key) = self.config.api_key.as_deref() {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend(format!(
                "Embedding request failed: HTTP {} - {}",
                status, body
            )));
        }

        let mut result: EmbeddingResponse = response.json().await?;
        result.data.sort_by_key(|e| e.index);
        Ok(result.data.into_iter().map(|e| e.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[derive(Debug, serde::Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Construction from configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Provider-neutral embedder settings, filled in by the host from its config.
#[derive(Debug, Clone)]
pub struct EmbedderSpec {
    /// "openai" or "mock".
    pub provider: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub dimensions: Option<usize>,
    pub timeout: Duration,
}

/// Build a [`BoundedEmbedder`]-wrapped embedder from a spec.
pub fn build_embedder(spec: &EmbedderSpec) -> Result<SharedEmbedder> {
    let inner: SharedEmbedder = match spec.provider.as_str() {
        "openai" => {
            let mut config = OpenAiEmbedderConfig::new(spec.api_key.clone());
            if let Some(model) = &spec.model {
                config = config.with_model(model);
            }
            if let Some(base_url) = &spec.base_url {
                config = config.with_base_url(base_url);
            } else if config.api_key.is_none() {
                return Err(LlmError::Config(
                    "OpenAI embedding provider requires an API key. \
                     Set OPENAI_API_KEY or configure [embedding] api_key."
                        .to_string(),
                ));
            }
            config.dimensions = spec.dimensions;
            Arc::new(OpenAiEmbedder::new(config)?)
        }
        "mock" => Arc::new(MockEmbedder::new(spec.dimensions.unwrap_or(384))),
        other => {
            return Err(LlmError::Config(format!(
                "Unknown embedding provider '{}'. Valid: openai, mock",
                other
            )));
        }
    };
    Ok(Arc::new(BoundedEmbedder::new(inner, spec.timeout)))
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

//! Sentence-embedding clients used by concept deduplication.
//!
//! Supports multiple backends:
//!   - OpenAI         (text-embedding-3-small / text-embedding-3-large)
//!   - OpenAI-compat  (any /v1/embeddings endpoint)
//!   - Ollama         (nomic-embed-text or any ollama embedding model)
//!   - FastEmbed      (local ONNX all-MiniLM-L6-v2, feature `fastembed_backend`)
//!   - Disabled       (always unavailable; dedup falls back to exact match)
//!
//! All vectors returned through [`Embedder::embed`] are L2-normalised.

use std::time::Duration;

use async_trait::async_trait;
use paperatlas_common::{sandbox::SandboxClient, PaperAtlasError};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding backend unavailable: {0}")]
    Unavailable(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
    #[error("malformed embedding response: {0}")]
    Malformed(String),
    #[error("embedding model error: {0}")]
    Model(String),
}

impl From<PaperAtlasError> for EmbedError {
    fn from(err: PaperAtlasError) -> Self {
        match err {
            PaperAtlasError::Http(e) => EmbedError::Http(e),
            other => EmbedError::Unavailable(other.to_string()),
        }
    }
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `texts`, returning one L2-normalised vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
    fn model_name(&self) -> &str;
}

// ── Vector helpers ────────────────────────────────────────────────────────────

fn l2_norm(v: &[f32]) -> f32 {
    let s: f32 = v.iter().map(|x| x * x).sum();
    s.sqrt().max(1e-10)
}

pub fn normalize(v: Vec<f32>) -> Vec<f32> {
    let norm = l2_norm(&v);
    v.into_iter().map(|x| x / norm).collect()
}

/// Cosine similarity; for normalised inputs this is the dot product.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (l2_norm(a) * l2_norm(b))
}

fn check_count(expected: usize, vecs: Vec<Vec<f32>>) -> Result<Vec<Vec<f32>>, EmbedError> {
    if vecs.len() != expected {
        return Err(EmbedError::Malformed(format!(
            "expected {expected} vectors, got {}",
            vecs.len()
        )));
    }
    Ok(vecs.into_iter().map(normalize).collect())
}

async fn read_json(resp: reqwest::Response) -> Result<serde_json::Value, EmbedError> {
    let status = resp.status().as_u16();
    let body: serde_json::Value = resp.json().await?;
    if status >= 400 {
        let message = body["error"]["message"]
            .as_str()
            .or_else(|| body["error"].as_str())
            .unwrap_or("unknown API error")
            .to_string();
        return Err(EmbedError::ApiError { status, message });
    }
    Ok(body)
}

fn parse_openai_embeddings(resp: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let data = resp["data"]
        .as_array()
        .ok_or_else(|| EmbedError::Malformed("missing `data` array".to_string()))?;
    data.iter().map(|item| parse_vector(&item["embedding"])).collect()
}

/// A JSON array of numbers as `f32`. Anything else is malformed.
fn parse_vector(value: &serde_json::Value) -> Result<Vec<f32>, EmbedError> {
    value
        .as_array()
        .ok_or_else(|| EmbedError::Malformed("missing `embedding`".to_string()))?
        .iter()
        .map(|x| {
            x.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| EmbedError::Malformed(format!("non-numeric vector element: {x}")))
        })
        .collect()
}

// ── OpenAI / OpenAI-compatible ────────────────────────────────────────────────

/// `/embeddings` client for OpenAI and any endpoint speaking the same shape.
pub struct OpenAiEmbedder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: SandboxClient,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, EmbedError> {
        let base_url = base_url.into();
        let mut client = SandboxClient::with_timeout(timeout)?;
        client.allow_url_host(&base_url);
        Ok(Self { base_url, model: model.into(), api_key, client })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    #[instrument(skip(self, texts), fields(n = texts.len(), model = %self.model))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({"model": &self.model, "input": texts});
        let mut req = self.client.post(&url)?.json(&body);
        if let Some(ref k) = self.api_key {
            req = req.bearer_auth(k);
        }
        let json = read_json(req.send().await?).await?;
        check_count(texts.len(), parse_openai_embeddings(&json)?)
    }

    fn model_name(&self) -> &str { &self.model }
}

// ── Ollama ────────────────────────────────────────────────────────────────────

pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: SandboxClient,
}

impl OllamaEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self, EmbedError> {
        let base_url = base_url.into();
        let mut client = SandboxClient::with_timeout(timeout)?;
        client.allow_url_host(&base_url);
        Ok(Self { base_url, model: model.into(), client })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    #[instrument(skip(self, texts), fields(n = texts.len(), model = %self.model))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let url = format!("{}/api/embeddings", self.base_url.trim_end_matches('/'));
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let body = serde_json::json!({"model": &self.model, "prompt": text});
            let json = read_json(self.client.post(&url)?.json(&body).send().await?).await?;
            out.push(parse_vector(&json["embedding"])?);
        }
        check_count(texts.len(), out)
    }

    fn model_name(&self) -> &str { &self.model }
}

// ── FastEmbed (local) ─────────────────────────────────────────────────────────

#[cfg(feature = "fastembed_backend")]
pub use local::FastEmbedder;

#[cfg(feature = "fastembed_backend")]
mod local {
    use super::*;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    pub struct FastEmbedder {
        model: Arc<Mutex<TextEmbedding>>,
        model_name: String,
        batch_size: usize,
    }

    fn model_for(name: &str) -> EmbeddingModel {
        match name.to_lowercase().as_str() {
            "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
            "bge-base-en-v1.5"  => EmbeddingModel::BGEBaseENV15,
            "paraphrase-multilingual-minilm-l12-v2" => EmbeddingModel::ParaphraseMLMiniLML12V2,
            _ => EmbeddingModel::AllMiniLML6V2,
        }
    }

    impl FastEmbedder {
        /// Loads (downloading on first use) the ONNX model.
        pub fn new(model: &str, cache_dir: Option<&str>, batch_size: usize) -> Result<Self, EmbedError> {
            let mut options = InitOptions::new(model_for(model));
            if let Some(dir) = cache_dir {
                options = options.with_cache_dir(PathBuf::from(dir));
            }
            let embedding = TextEmbedding::try_new(options)
                .map_err(|e| EmbedError::Unavailable(format!("failed to load fastembed model: {e}")))?;
            Ok(Self {
                model: Arc::new(Mutex::new(embedding)),
                model_name: model.to_string(),
                batch_size: batch_size.max(1),
            })
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            if texts.is_empty() {
                return Ok(vec![]);
            }
            let mut model = self.model.lock().await;
            let vecs = model
                .embed(texts.to_vec(), Some(self.batch_size))
                .map_err(|e| EmbedError::Model(e.to_string()))?;
            check_count(texts.len(), vecs)
        }

        fn model_name(&self) -> &str { &self.model_name }
    }
}

// ── Disabled ──────────────────────────────────────────────────────────────────

/// Stand-in used when no embedding backend could be constructed.
pub struct DisabledEmbedder {
    reason: String,
}

impl DisabledEmbedder {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl Embedder for DisabledEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        debug!(reason = %self.reason, "embedding requested from disabled backend");
        Err(EmbedError::Unavailable(self.reason.clone()))
    }

    fn model_name(&self) -> &str { "disabled" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let v = normalize(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_stays_finite() {
        let v = normalize(vec![0.0, 0.0]);
        assert!(v.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_openai_embeddings() {
        let json = serde_json::json!({"data": [{"embedding": [1.0, 0.0]}, {"embedding": [0.0, 2.0]}]});
        let vecs = parse_openai_embeddings(&json).unwrap();
        assert_eq!(vecs.len(), 2);
        assert_eq!(vecs[1], vec![0.0, 2.0]);
        assert!(parse_openai_embeddings(&serde_json::json!({})).is_err());
    }

    #[test]
    fn test_non_numeric_vector_is_malformed() {
        let json = serde_json::json!({"data": [{"embedding": [1.0, "x"]}]});
        assert!(matches!(parse_openai_embeddings(&json), Err(EmbedError::Malformed(_))));
        let json = serde_json::json!({"data": [{"index": 0}]});
        assert!(matches!(parse_openai_embeddings(&json), Err(EmbedError::Malformed(_))));
        assert!(matches!(parse_vector(&serde_json::json!([0.5, null])), Err(EmbedError::Malformed(_))));
        assert_eq!(parse_vector(&serde_json::json!([0.5, 1])).unwrap(), vec![0.5, 1.0]);
    }

    #[test]
    fn test_check_count_mismatch() {
        assert!(matches!(check_count(2, vec![vec![1.0]]), Err(EmbedError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_disabled_embedder_is_unavailable() {
        let e = DisabledEmbedder::new("no backend configured");
        let err = e.embed(&["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbedError::Unavailable(ref r) if r == "no backend configured"));
    }
}

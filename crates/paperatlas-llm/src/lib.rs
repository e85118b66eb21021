//! paperatlas-llm: generative text and embedding backends.
//!
//! Construction goes through [`build_llm_backend`] and [`build_embedder`],
//! which check capabilities once at startup: a missing API key yields no
//! LLM backend (offline mode), and a failed embedder yields
//! [`DisabledEmbedder`].

pub mod backend;
pub mod embedding;

use std::sync::Arc;
use std::time::Duration;

use paperatlas_config::{Config, EmbeddingBackendKind, LlmBackendKind};
use tracing::{info, warn};

pub use backend::{LlmBackend, LlmError, OllamaBackend, OpenAiCompatibleBackend, OpenAiResponsesBackend};
pub use embedding::{cosine_similarity, DisabledEmbedder, EmbedError, Embedder, OllamaEmbedder, OpenAiEmbedder};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Whether the local fastembed backend was compiled in.
pub const FASTEMBED_ENABLED: bool = cfg!(feature = "fastembed_backend");

/// Build the configured generative backend, or `None` when it cannot be used.
pub fn build_llm_backend(cfg: &Config) -> Option<Arc<dyn LlmBackend>> {
    let llm = &cfg.llm;
    if !llm.is_usable() {
        info!("No LLM credentials configured; running in offline mode");
        return None;
    }
    let timeout = Duration::from_secs_f64(llm.timeout_secs.max(1.0));
    let api_key = llm.api_key.clone().unwrap_or_default();

    let built: Result<Arc<dyn LlmBackend>, LlmError> = match llm.backend {
        LlmBackendKind::OpenAiResponses => {
            OpenAiResponsesBackend::new(api_key, &llm.model, &llm.base_url, timeout)
                .map(|b| Arc::new(b) as Arc<dyn LlmBackend>)
        }
        LlmBackendKind::OpenAiCompatible => {
            OpenAiCompatibleBackend::new(&llm.base_url, &llm.model, llm.api_key.clone(), timeout)
                .map(|b| Arc::new(b) as Arc<dyn LlmBackend>)
        }
        LlmBackendKind::Ollama => {
            let base = if llm.base_url.contains("api.openai.com") { DEFAULT_OLLAMA_URL } else { &llm.base_url };
            OllamaBackend::new(base, &llm.model, timeout).map(|b| Arc::new(b) as Arc<dyn LlmBackend>)
        }
    };

    match built {
        Ok(backend) => {
            info!(model = backend.model_id(), backend = ?llm.backend, "LLM backend ready");
            Some(backend)
        }
        Err(e) => {
            warn!(error = %e, "Failed to build LLM backend; running in offline mode");
            None
        }
    }
}

/// Build the configured embedder, degrading to [`DisabledEmbedder`].
pub fn build_embedder(cfg: &Config) -> Arc<dyn Embedder> {
    let emb = &cfg.embedding;
    let timeout = Duration::from_secs_f64(cfg.llm.timeout_secs.max(1.0));
    let api_key = emb.api_key.clone().or_else(|| cfg.llm.api_key.clone());

    let built: Result<Arc<dyn Embedder>, EmbedError> = match emb.backend {
        EmbeddingBackendKind::Disabled => Err(EmbedError::Unavailable("embedding backend disabled".to_string())),
        EmbeddingBackendKind::OpenAi => match api_key {
            Some(key) => {
                let base = emb.base_url.as_deref().unwrap_or("https://api.openai.com/v1");
                OpenAiEmbedder::new(base, &emb.model, Some(key), timeout).map(|e| Arc::new(e) as Arc<dyn Embedder>)
            }
            None => Err(EmbedError::Unavailable("no API key for OpenAI embeddings".to_string())),
        },
        EmbeddingBackendKind::OpenAiCompatible => match emb.base_url.as_deref() {
            Some(base) => OpenAiEmbedder::new(base, &emb.model, api_key, timeout).map(|e| Arc::new(e) as Arc<dyn Embedder>),
            None => Err(EmbedError::Unavailable("openai_compatible embeddings need base_url".to_string())),
        },
        EmbeddingBackendKind::Ollama => {
            let base = emb.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
            OllamaEmbedder::new(base, &emb.model, timeout).map(|e| Arc::new(e) as Arc<dyn Embedder>)
        }
        EmbeddingBackendKind::FastEmbed => build_fastembed(cfg),
    };

    match built {
        Ok(embedder) => {
            info!(model = embedder.model_name(), backend = ?emb.backend, "Embedding backend ready");
            embedder
        }
        Err(e) => {
            warn!(error = %e, "Embedding backend unavailable; dedup will use exact matching");
            Arc::new(DisabledEmbedder::new(e.to_string()))
        }
    }
}

#[cfg(feature = "fastembed_backend")]
fn build_fastembed(cfg: &Config) -> Result<Arc<dyn Embedder>, EmbedError> {
    let emb = &cfg.embedding;
    embedding::FastEmbedder::new(&emb.model, emb.cache_dir.as_deref(), emb.batch_size)
        .map(|e| Arc::new(e) as Arc<dyn Embedder>)
}

#[cfg(not(feature = "fastembed_backend"))]
fn build_fastembed(_cfg: &Config) -> Result<Arc<dyn Embedder>, EmbedError> {
    Err(EmbedError::Unavailable(
        "fastembed backend requires the 'fastembed_backend' feature".to_string(),
    ))
}

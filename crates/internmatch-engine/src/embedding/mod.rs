//! Text embedding providers.

mod hashing;
mod ollama;
mod provider;

use std::sync::Arc;

use internmatch_core::{EmbeddingBackend, EmbeddingConfig};

pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;
pub use provider::{Embedding, EmbeddingProvider, EmbeddingService, cosine_similarity, l2_normalize};

use crate::pool::WorkerPool;

/// Build the provider selected by `config`.
pub fn provider_from_config(config: &EmbeddingConfig, pool: &WorkerPool) -> Arc<dyn EmbeddingProvider> {
    match config.backend {
        EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(config.dimension, pool.clone())),
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(config)),
    }
}

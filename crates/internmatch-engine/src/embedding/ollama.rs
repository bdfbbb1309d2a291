//! Embeddings served by a local Ollama instance.

use std::fmt::Display;

use async_trait::async_trait;
use internmatch_core::{EmbeddingConfig, Error, Result};
use ollama_rs::Ollama;
use ollama_rs::generation::embeddings::request::GenerateEmbeddingsRequest;

use super::provider::{Embedding, EmbeddingProvider};

/// Ollama embedding client
pub struct OllamaEmbedder {
    ollama: Ollama,
    model: String,
}

impl OllamaEmbedder {
    /// Client for the host, port and model in `config`.
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            ollama: Ollama::new(config.host.clone(), config.port),
            model: config.model.clone(),
        }
    }

    fn map_error(&self, error: &impl Display, what: &str) -> Error {
        let message = error.to_string();
        if message.contains("model") && message.contains("not found") {
            Error::ModelLoad(format!(
                "Embedding model '{}' not found. Run: ollama pull {}",
                self.model, self.model
            ))
        } else {
            Error::Other(format!("{what} failed: {message}"))
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_id(&self) -> String {
        format!("ollama-{}", self.model)
    }

    async fn load(&self) -> Result<usize> {
        let models = self.ollama.list_local_models().await.map_err(|error| {
            Error::ModelLoad(format!(
                "Failed to connect to Ollama: {error}. Ensure Ollama is installed and running (ollama serve)"
            ))
        })?;

        if !models.iter().any(|model| model.name.contains(&self.model)) {
            return Err(Error::ModelLoad(format!(
                "Embedding model '{}' is not available locally. Run: ollama pull {}",
                self.model, self.model
            )));
        }

        let probe = self.encode("dimension probe").await?;
        tracing::debug!("Probed Ollama model '{}': {} dims", self.model, probe.len());
        Ok(probe.len())
    }

    async fn encode(&self, text: &str) -> Result<Embedding> {
        let request = GenerateEmbeddingsRequest::new(self.model.clone(), text.to_owned().into());

        let response = self
            .ollama
            .generate_embeddings(request)
            .await
            .map_err(|error| self.map_error(&error, "Embedding generation"))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Other("No embeddings returned".to_owned()))
    }

    async fn encode_batch(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = GenerateEmbeddingsRequest::new(self.model.clone(), texts.into());

        let response = self
            .ollama
            .generate_embeddings(request)
            .await
            .map_err(|error| self.map_error(&error, "Batch embedding generation"))?;

        Ok(response.embeddings)
    }
}

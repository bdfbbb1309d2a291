use std::sync::Arc;

use async_trait::async_trait;
use internmatch_core::{Error, Result};
use tokio::sync::OnceCell;

/// A single embedding vector
pub type Embedding = Vec<f32>;

/// Trait for generating embeddings from text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the model, recorded alongside persisted indices
    fn model_id(&self) -> String;

    /// Make the model ready and report its vector dimension
    ///
    /// # Errors
    /// Returns an error if the model is not available or cannot be loaded
    async fn load(&self) -> Result<usize>;

    /// Generate embedding for text
    ///
    /// # Errors
    /// Returns an error if embedding generation fails
    async fn encode(&self, text: &str) -> Result<Embedding>;

    /// Embed multiple texts in one call, preserving order
    ///
    /// # Errors
    /// Returns an error if any embedding generation fails
    async fn encode_batch(&self, texts: Vec<String>) -> Result<Vec<Embedding>>;
}

/// Lazily loaded handle around an [`EmbeddingProvider`].
///
/// The first caller of [`EmbeddingService::ensure_loaded`] runs the provider's `load`;
/// concurrent callers wait on the same attempt. A failed load is not cached, so the
/// next caller retries.
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    dimension: OnceCell<usize>,
}

impl EmbeddingService {
    /// Service over `provider`, not loaded yet.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            dimension: OnceCell::new(),
        }
    }

    /// Identifier of the underlying model.
    pub fn model_id(&self) -> String {
        self.provider.model_id()
    }

    /// Vector dimension, once loaded.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    /// Whether a load succeeded.
    pub fn is_loaded(&self) -> bool {
        self.dimension.initialized()
    }

    /// Load the model if it is not loaded yet.
    ///
    /// # Errors
    /// Returns [`Error::ModelLoad`] if the provider cannot be loaded
    pub async fn ensure_loaded(&self) -> Result<usize> {
        self.dimension
            .get_or_try_init(|| async {
                let dimension = self.provider.load().await.map_err(|error| match error {
                    Error::ModelLoad(_) => error,
                    other => Error::ModelLoad(other.to_string()),
                })?;
                if dimension == 0 {
                    return Err(Error::ModelLoad(format!(
                        "Model '{}' reported a zero dimension",
                        self.provider.model_id()
                    )));
                }
                tracing::info!(
                    "Embedding model '{}' loaded (dimension {dimension})",
                    self.provider.model_id()
                );
                Ok::<usize, Error>(dimension)
            })
            .await
            .copied()
    }

    /// Encode one text.
    ///
    /// # Errors
    /// Returns an error if the model cannot be loaded or encoding fails
    pub async fn encode(&self, text: &str) -> Result<Embedding> {
        let dimension = self.ensure_loaded().await?;
        let embedding = self.provider.encode(text).await?;
        check_dimension(&embedding, dimension)?;
        Ok(embedding)
    }

    /// Encode many texts in batches of `batch_size`, preserving order.
    ///
    /// # Errors
    /// Returns an error if the model cannot be loaded or any batch fails
    pub async fn encode_batch(&self, texts: &[String], batch_size: usize) -> Result<Vec<Embedding>> {
        let dimension = self.ensure_loaded().await?;
        let mut embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(batch_size.max(1)) {
            let batch = self.provider.encode_batch(chunk.to_vec()).await?;
            if batch.len() != chunk.len() {
                return Err(Error::Other(format!(
                    "Embedding batch returned {} vectors for {} texts",
                    batch.len(),
                    chunk.len()
                )));
            }
            for embedding in &batch {
                check_dimension(embedding, dimension)?;
            }
            embeddings.extend(batch);
        }

        Ok(embeddings)
    }
}

fn check_dimension(embedding: &[f32], dimension: usize) -> Result<()> {
    if embedding.len() == dimension {
        Ok(())
    } else {
        Err(Error::InvalidIndex(format!(
            "Expected embedding of dimension {dimension}, got {}",
            embedding.len()
        )))
    }
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(vector_a: &[f32], vector_b: &[f32]) -> f32 {
    if vector_a.len() != vector_b.len() {
        return 0.0;
    }

    let dot_product: f32 = vector_a
        .iter()
        .zip(vector_b.iter())
        .map(|(left, right)| left * right)
        .sum();
    let magnitude_a = vector_a.iter().map(|value| value * value).sum::<f32>().sqrt();
    let magnitude_b = vector_b.iter().map(|value| value * value).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// Scale `vector` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

//! Deterministic feature-hashing text encoder.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash as _, Hasher as _};

use async_trait::async_trait;
use internmatch_core::Result;

use super::provider::{Embedding, EmbeddingProvider, l2_normalize};
use crate::pool::WorkerPool;

/// Bump when tokenization or weighting changes; persisted indices are keyed on it.
const ENCODER_VERSION: &str = "v1";

const UNIGRAM_WEIGHT: f32 = 1.0;
const BIGRAM_WEIGHT: f32 = 0.5;
const TRIGRAM_WEIGHT: f32 = 0.25;

/// Local encoder hashing word unigrams, word bigrams and character trigrams into a
/// fixed number of buckets with signed hashing, then L2-normalizing.
///
/// Encoding is CPU-bound and runs on the [`WorkerPool`].
pub struct HashingEmbedder {
    dimension: usize,
    pool: WorkerPool,
}

impl HashingEmbedder {
    /// Encoder with `dimension` buckets, at least one.
    pub fn new(dimension: usize, pool: WorkerPool) -> Self {
        Self {
            dimension: dimension.max(1),
            pool,
        }
    }

    /// Encode synchronously on the current thread.
    pub fn encode_now(text: &str, dimension: usize) -> Embedding {
        let mut vector = vec![0.0f32; dimension];
        let tokens = tokenize(text);

        for token in &tokens {
            add_feature(&mut vector, "w", token, UNIGRAM_WEIGHT);

            let padded: Vec<char> = format!(" {token} ").chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                add_feature(&mut vector, "c", &trigram, TRIGRAM_WEIGHT);
            }
        }
        for pair in tokens.windows(2) {
            add_feature(
                &mut vector,
                "b",
                &format!("{} {}", pair[0], pair[1]),
                BIGRAM_WEIGHT,
            );
        }

        l2_normalize(&mut vector);
        vector
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|ch: char| !(ch.is_alphanumeric() || ch == '+' || ch == '#'))
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}

fn add_feature(vector: &mut [f32], namespace: &str, feature: &str, weight: f32) {
    let mut hasher = DefaultHasher::new();
    namespace.hash(&mut hasher);
    feature.hash(&mut hasher);
    let hash = hasher.finish();

    let bucket = (hash % vector.len() as u64) as usize;
    let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
    vector[bucket] += sign * weight;
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn model_id(&self) -> String {
        format!("feature-hashing-{ENCODER_VERSION}-{}", self.dimension)
    }

    async fn load(&self) -> Result<usize> {
        Ok(self.dimension)
    }

    async fn encode(&self, text: &str) -> Result<Embedding> {
        let text = text.to_owned();
        let dimension = self.dimension;
        self.pool
            .run(move || Self::encode_now(&text, dimension))
            .await
    }

    async fn encode_batch(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        let dimension = self.dimension;
        self.pool
            .run(move || {
                texts
                    .iter()
                    .map(|text| Self::encode_now(text, dimension))
                    .collect()
            })
            .await
    }
}

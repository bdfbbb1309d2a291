//! Shared fixtures: sample postings and instrumented providers.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use internmatch_core::{EngineConfig, Error, Result};
use internmatch_engine::{
    Embedding, EmbeddingProvider, HashingEmbedder, InternshipStore, MemoryStore,
    RecommendationEngine, WorkerPool,
};
use serde_json::{Value, json};

pub const DIMENSION: usize = 256;

/// Hashing embedder that counts how often it is asked to encode.
pub struct CountingEmbedder {
    inner: HashingEmbedder,
    pub single_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new() -> Self {
        Self {
            inner: HashingEmbedder::new(DIMENSION, WorkerPool::new(2)),
            single_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
        }
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    fn model_id(&self) -> String {
        self.inner.model_id()
    }

    async fn load(&self) -> Result<usize> {
        self.inner.load().await
    }

    async fn encode(&self, text: &str) -> Result<Embedding> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.encode(text).await
    }

    async fn encode_batch(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.encode_batch(texts).await
    }
}

/// Hashing embedder whose batch calls fail when any text equals `poison`.
///
/// Single encodes always succeed, so index builds and student vectors are unaffected.
pub struct PoisonedEmbedder {
    inner: HashingEmbedder,
    poison: &'static str,
}

impl PoisonedEmbedder {
    pub fn new(poison: &'static str) -> Self {
        Self {
            inner: HashingEmbedder::new(DIMENSION, WorkerPool::new(2)),
            poison,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for PoisonedEmbedder {
    fn model_id(&self) -> String {
        self.inner.model_id()
    }

    async fn load(&self) -> Result<usize> {
        self.inner.load().await
    }

    async fn encode(&self, text: &str) -> Result<Embedding> {
        self.inner.encode(text).await
    }

    async fn encode_batch(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        if texts.iter().any(|text| text == self.poison) {
            return Err(Error::Other(format!("cannot embed {:?}", self.poison)));
        }
        self.inner.encode_batch(texts).await
    }
}

/// Provider whose model never loads.
pub struct BrokenEmbedder;

#[async_trait]
impl EmbeddingProvider for BrokenEmbedder {
    fn model_id(&self) -> String {
        "broken".to_owned()
    }

    async fn load(&self) -> Result<usize> {
        Err(Error::ModelLoad("model files missing".to_owned()))
    }

    async fn encode(&self, _text: &str) -> Result<Embedding> {
        Err(Error::ModelLoad("not loaded".to_owned()))
    }

    async fn encode_batch(&self, _texts: Vec<String>) -> Result<Vec<Embedding>> {
        Err(Error::ModelLoad("not loaded".to_owned()))
    }
}

/// Memory store that counts full collection reads.
pub struct CountingStore {
    pub inner: MemoryStore,
    reads: AtomicUsize,
}

impl CountingStore {
    pub fn new(documents: Vec<Value>) -> Self {
        Self {
            inner: MemoryStore::new(documents),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InternshipStore for CountingStore {
    async fn count_documents(&self) -> Result<usize> {
        self.inner.count_documents().await
    }

    async fn find_all(&self) -> Result<Vec<Value>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.find_all().await
    }
}

pub fn config(cache_dir: &Path) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.embedding.dimension = DIMENSION;
    config.storage.cache_dir = Some(cache_dir.to_path_buf());
    config
}

pub fn engine(
    cache_dir: &Path,
    store: Arc<dyn InternshipStore>,
    provider: Arc<dyn EmbeddingProvider>,
) -> RecommendationEngine {
    RecommendationEngine::new(config(cache_dir), store, provider).unwrap()
}

/// A small catalogue spanning data, web, design and marketing roles.
pub fn catalogue() -> Vec<Value> {
    vec![
        json!({
            "_id": {"$oid": "data-analyst"},
            "title": "Data Analyst Intern",
            "company": "Insight Labs",
            "description": "Query sales data with SQL and build Python reports",
            "skills": ["Python", "SQL"],
            "work_type": "Remote",
            "stipend": "₹15,000/month",
            "duration": "3 months",
            "category": "Data Science",
            "views": 120,
        }),
        json!({
            "_id": "web-dev",
            "title": "Frontend Developer Intern",
            "company": "Pixel Works",
            "description": "Build React components for a dashboard",
            "skills": ["JavaScript", "React", "CSS"],
            "city": "Bengaluru",
            "state": "Karnataka",
            "work_type": "WFO",
            "stipend": 12000,
            "duration": "6 months",
            "category": "Web Development",
            "views": 300,
        }),
        json!({
            "_id": "designer",
            "title": "Graphic Design Intern",
            "company": "Canvas Studio",
            "description": "Create social media creatives and brand assets",
            "skills": ["Photoshop", "Illustrator"],
            "city": "Mumbai",
            "state": "Maharashtra",
            "work_type": "Hybrid",
            "stipend": 8000,
            "duration": "2 months",
            "category": "Design",
            "is_featured": true,
            "views": 40,
        }),
        json!({
            "_id": "marketing",
            "title": "Digital Marketing Intern",
            "company": "Brandly",
            "description": "Run campaigns and track engagement metrics",
            "skills": ["SEO", "Content Writing"],
            "work_type": "Remote",
            "stipend": 5000,
            "duration": "1 month",
            "category": "Marketing",
            "views": 80,
        }),
    ]
}

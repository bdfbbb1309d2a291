//! Internship recommendation engine.
//!
//! Postings are embedded and indexed along four dimensions (skills, location, stipend,
//! timeline). Students are matched by nearest-neighbour search, scored with configurable
//! weights, and each match carries an explanation of why it was recommended.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::float_cmp,
        clippy::absolute_paths,
        reason = "Test allows"
    )
)]

pub mod cache;
pub mod embedding;
pub mod engine;
pub mod explanation;
pub mod index;
pub mod pool;
pub mod profile_cache;
pub mod scoring;
pub mod skills;
pub mod store;

pub use cache::{CacheStats, LruCache};
pub use embedding::{
    Embedding, EmbeddingProvider, EmbeddingService, HashingEmbedder, OllamaEmbedder,
    cosine_similarity, provider_from_config,
};
pub use engine::{
    EngineStats, EngineStatus, PreparedFilters, Recommendation, RecommendationEngine,
    RecommendationFilters,
};
pub use explanation::{MatchExplanation, MatchExplanationGenerator};
pub use index::{IndexEntry, IndexKind, IndexSet, IndexStats, InternshipIndexManager};
pub use pool::WorkerPool;
pub use profile_cache::{ProfileCacheStats, StudentProfileCache, StudentVectors};
pub use scoring::{DimensionScores, MatchQuality, MatchScore, ScoreBreakdown};
pub use skills::{SkillMatchReport, SkillSignatureManager};
pub use store::{InternshipStore, JsonFileStore, MemoryStore};

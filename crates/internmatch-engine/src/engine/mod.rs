//! Recommendation engine: ingestion, ranking, refresh and the public API.

pub mod filters;
pub mod ingest;
pub mod trending;

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::collections::hash_map::{Entry, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt as _, Shared};
use internmatch_core::{DimensionWeights, EngineConfig, Error, Internship, ProfileSnapshot, Result, StudentProfile};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

pub use filters::{PreparedFilters, RecommendationFilters};
pub use ingest::{NormalizedDocument, normalize_document, parse_duration};
pub use trending::rank_trending;

use crate::cache::CacheStats;
use crate::embedding::{Embedding, EmbeddingProvider, EmbeddingService, provider_from_config};
use crate::explanation::{MatchExplanation, MatchExplanationGenerator};
use crate::index::{IndexEntry, IndexKind, IndexSet, IndexStats, InternshipIndexManager};
use crate::pool::WorkerPool;
use crate::profile_cache::{ProfileCacheStats, StudentProfileCache, StudentVectors};
use crate::scoring::{DimensionScores, MatchScore, ScoreBreakdown, clamp_unit, resolve_weights};
use crate::skills::SkillSignatureManager;
use crate::store::InternshipStore;

/// One recommended posting with its score and explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// The recommended posting, flattened into the JSON object
    #[serde(flatten)]
    pub internship: Internship,
    /// Weighted match in `[0, 100]`, two decimals
    pub match_percentage: f64,
    /// Weighted contribution of each dimension
    pub score_breakdown: ScoreBreakdown,
    /// Short reasons shown to the student
    pub match_reasons: Vec<String>,
    /// Full explanation; absent on fallback items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<MatchExplanation>,
    /// Served from the trending ranking because nothing matched
    #[serde(default)]
    pub is_fallback: bool,
}

/// Lifecycle state as reported by [`RecommendationEngine::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum EngineStatus {
    /// Never initialized, or reset
    Uninitialized,
    /// An initialization attempt is running
    Initializing,
    /// Serving requests
    Ready,
    /// The last attempt failed with this reason
    Failed(String),
}

/// Snapshot of engine health for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    /// Lifecycle state
    pub status: EngineStatus,
    /// Shorthand for `status == Ready`
    pub ready: bool,
    /// Embedding model
    pub model_id: String,
    /// Model dimension once loaded
    pub embedding_dimension: Option<usize>,
    /// Lowest match percentage served
    pub min_match_threshold: f64,
    /// Current index snapshot
    pub index: IndexStats,
    /// Last successful rebuild
    pub last_refresh: Option<DateTime<Utc>>,
    /// A background rebuild is running
    pub refresh_in_progress: bool,
    /// Worker pool size
    pub worker_threads: usize,
    /// Student vector cache
    pub student_cache: ProfileCacheStats,
    /// Skill embedding cache
    pub skill_cache: CacheStats,
}

type InitOutcome = Shared<BoxFuture<'static, bool>>;

enum EngineState {
    Uninitialized,
    /// One attempt in flight; every caller awaits the same outcome
    Initializing { attempt: u64, outcome: InitOutcome },
    Ready,
    Failed(String),
}

/// A candidate row with its dimension scores before weighting.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    row: usize,
    skill: f64,
    location: f64,
}

struct RankedCandidate {
    internship: Arc<Internship>,
    score: MatchScore,
}

fn timeout_error(stage: &'static str, limit: Duration) -> Error {
    Error::Timeout {
        stage,
        millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
    }
}

/// Union of skill and location nearest neighbours, with the missing score of each
/// candidate filled in by direct row scoring.
fn gather_candidates(
    set: &IndexSet,
    vectors: &StudentVectors,
    search_k: usize,
    default_location: f64,
) -> Vec<Candidate> {
    let mut found: BTreeMap<usize, (Option<f32>, Option<f32>)> = BTreeMap::new();
    for (score, row) in set.search(IndexKind::Skill, &vectors.skill_vector, search_k) {
        found.entry(row).or_default().0 = Some(score);
    }
    for (score, row) in set.search(IndexKind::Location, &vectors.location_vector, search_k) {
        found.entry(row).or_default().1 = Some(score);
    }

    found
        .into_iter()
        .map(|(row, (skill, location))| {
            let skill = skill
                .or_else(|| set.score_row(IndexKind::Skill, &vectors.skill_vector, row))
                .map_or(0.0, f64::from);
            let location = location
                .or_else(|| set.score_row(IndexKind::Location, &vectors.location_vector, row))
                .map_or(default_location, f64::from);
            Candidate {
                row,
                skill,
                location,
            }
        })
        .collect()
}

struct EngineInner {
    config: EngineConfig,
    store: Arc<dyn InternshipStore>,
    pool: WorkerPool,
    embeddings: Arc<EmbeddingService>,
    skills: Arc<SkillSignatureManager>,
    profiles: StudentProfileCache,
    indices: InternshipIndexManager,
    explainer: MatchExplanationGenerator,
    state: Mutex<EngineState>,
    attempts: AtomicU64,
    refreshing: AtomicBool,
    /// Held for a whole rebuild so refreshes never interleave
    rebuild_lock: AsyncMutex<()>,
    last_refresh: Mutex<Option<DateTime<Utc>>>,
}

impl EngineInner {
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_ready(&self) -> bool {
        matches!(*self.lock_state(), EngineState::Ready)
    }

    fn spawn_initialization(self: Arc<Self>, attempt: u64) -> InitOutcome {
        let worker = Arc::clone(&self);
        let task = tokio::spawn(async move {
            let limit = worker.config.runtime.init_timeout();
            let result = match timeout(limit, worker.prepare()).await {
                Ok(result) => result,
                Err(_elapsed) => Err(timeout_error("initialization", limit)),
            };
            worker.finish_initialization(attempt, result)
        });

        async move {
            match task.await {
                Ok(ready) => ready,
                Err(join_error) => self.finish_initialization(
                    attempt,
                    Err(Error::Other(format!("Initialization task failed: {join_error}"))),
                ),
            }
        }
        .boxed()
        .shared()
    }

    /// Record the outcome of `attempt` unless a reset or newer attempt superseded it.
    fn finish_initialization(&self, attempt: u64, result: Result<()>) -> bool {
        let next = match result {
            Ok(()) => {
                info!("Recommendation engine ready");
                EngineState::Ready
            }
            Err(error) => {
                error!("Recommendation engine initialization failed: {error}");
                EngineState::Failed(error.to_string())
            }
        };
        let ready = matches!(next, EngineState::Ready);

        let mut state = self.lock_state();
        if matches!(&*state, EngineState::Initializing { attempt: current, .. } if *current == attempt)
        {
            *state = next;
        }
        ready
    }

    fn mark_ready(&self) {
        let mut state = self.lock_state();
        if matches!(*state, EngineState::Uninitialized | EngineState::Failed(_)) {
            *state = EngineState::Ready;
        }
    }

    /// Load the model, then serve from the disk cache when it still matches the store,
    /// otherwise rebuild from the store.
    async fn prepare(&self) -> Result<()> {
        info!("Initializing recommendation engine");
        let dimension = self.embeddings.ensure_loaded().await?;
        let model_id = self.embeddings.model_id();

        match self.indices.load_from_disk(dimension, &model_id).await {
            Ok(true) => match self.attach_stored_records().await {
                Ok(true) => return Ok(()),
                Ok(false) => info!("Cached indices no longer match the store, rebuilding"),
                Err(error) => warn!("Could not fetch records for cached indices: {error}"),
            },
            Ok(false) => {}
            Err(error) => warn!("Ignoring unusable index cache: {error}"),
        }

        match self.rebuild().await {
            Ok(_) => Ok(()),
            Err(Error::DataSource(reason)) => {
                warn!("Internship store unavailable, starting without data: {reason}");
                self.indices.clear().await;
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Attach store records to a snapshot loaded from disk.
    ///
    /// Returns `false` when some indexed id has no record in the store.
    async fn attach_stored_records(&self) -> Result<bool> {
        let documents = self.store.find_all().await?;
        let records: Vec<Internship> = documents
            .iter()
            .filter_map(normalize_document)
            .map(|doc| doc.internship)
            .collect();

        let indexed = self.indices.snapshot().await.len();
        let found = self.indices.attach_records(records).await;
        info!("Attached {found} of {indexed} internship records to cached indices");
        Ok(found == indexed)
    }

    /// Rebuild every index from the store, install it and persist it.
    ///
    /// Rebuilds are serialized; a caller arriving mid-rebuild waits and then rebuilds
    /// from the store again. Returns the number of indexed postings.
    async fn rebuild(&self) -> Result<usize> {
        let _rebuilding = self.rebuild_lock.lock().await;
        let dimension = self.embeddings.ensure_loaded().await?;
        let model_id = self.embeddings.model_id();

        let documents = self.store.find_all().await?;
        let source_count = documents.len();
        let mut normalized: Vec<NormalizedDocument> =
            documents.iter().filter_map(normalize_document).collect();
        if normalized.len() < source_count {
            warn!(
                "Skipped {} internship documents without a usable id",
                source_count - normalized.len()
            );
        }

        let mut skill_vectors: Vec<Option<Embedding>> = Vec::with_capacity(normalized.len());
        let mut pending_rows = Vec::new();
        let mut pending_texts = Vec::new();
        for (row, doc) in normalized.iter_mut().enumerate() {
            let stored = doc
                .embedding
                .take()
                .filter(|embedding| embedding.len() == dimension);
            if stored.is_none() {
                pending_rows.push(row);
                pending_texts.push(doc.internship.embedding_text());
            }
            skill_vectors.push(stored);
        }
        info!(
            "Embeddings: {} precomputed, {} to encode",
            normalized.len() - pending_rows.len(),
            pending_rows.len()
        );

        let encoded = self
            .embeddings
            .encode_batch(&pending_texts, self.config.embedding.batch_size)
            .await?;
        for (row, vector) in pending_rows.into_iter().zip(encoded) {
            if let Some(slot) = skill_vectors.get_mut(row) {
                *slot = Some(vector);
            }
        }

        let entries: Vec<IndexEntry> = normalized
            .into_iter()
            .zip(skill_vectors)
            .filter_map(|(doc, skill_vector)| {
                let internship = doc.internship;
                Some(IndexEntry {
                    skill_vector: skill_vector?,
                    location_vector: ingest::location_vector(internship.location_coordinates.as_ref()),
                    stipend_value: ingest::stipend_value(internship.stipend),
                    timeline_value: ingest::timeline_value(internship.duration_months),
                    internship,
                })
            })
            .collect();

        let set = self
            .indices
            .build_indices(entries, dimension, &model_id, source_count)
            .await?;
        if let Err(error) = self.indices.save_to_disk(&set).await {
            warn!("Failed to persist internship indices: {error}");
        }
        *self
            .last_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        Ok(set.len())
    }

    /// Start a background rebuild unless one is already running.
    fn schedule_refresh(self: Arc<Self>) -> bool {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Background refresh already running");
            return false;
        }

        tokio::spawn(async move {
            match self.rebuild().await {
                Ok(count) => info!("Background refresh indexed {count} internships"),
                Err(error) => warn!("Background refresh failed: {error}"),
            }
            self.refreshing.store(false, Ordering::Release);
        });
        true
    }

    /// Student query vectors, from cache when still valid.
    async fn student_vectors(
        &self,
        student: &StudentProfile,
        profile: &ProfileSnapshot,
    ) -> Result<Arc<StudentVectors>> {
        if let Some(cached) = self.profiles.get_cached_vectors(student).await {
            debug!("Using cached vectors for student {}", student.id);
            return Ok(cached);
        }

        let embedding = self.embeddings.encode(&profile.embedding_text()).await?;
        let vectors = Arc::new(ingest::student_vectors(profile, embedding));
        self.profiles
            .store_vectors(&student.id, Arc::clone(&vectors), profile);
        debug!("Computed and cached vectors for student {}", student.id);
        Ok(vectors)
    }

    /// Score candidates from both searches, best first.
    async fn rank_candidates(
        &self,
        set: &Arc<IndexSet>,
        vectors: Arc<StudentVectors>,
        top_k: usize,
        filters: &PreparedFilters,
        weights: &DimensionWeights,
    ) -> Result<Vec<RankedCandidate>> {
        let scoring = &self.config.scoring;
        let search_k = top_k
            .saturating_mul(scoring.search_k_multiplier.max(1))
            .min(set.len());
        let default_location = scoring.default_location_score;

        let search_set = Arc::clone(set);
        let candidates = self
            .pool
            .run(move || gather_candidates(&search_set, &vectors, search_k, default_location))
            .await?;

        let mut best: HashMap<String, RankedCandidate> = HashMap::with_capacity(candidates.len());
        for candidate in candidates {
            let Some(record) = set.record_at(candidate.row) else {
                continue;
            };

            let mut skills = candidate.skill.max(scoring.min_skill_score);
            if !filters.is_empty() {
                skills = (skills * filters.filter_boost(record, scoring)).min(1.0);
            }
            let score = MatchScore::new(
                DimensionScores {
                    skills: clamp_unit(skills),
                    location: clamp_unit(candidate.location),
                    stipend: scoring.default_stipend_score,
                    timeline: scoring.default_timeline_score,
                },
                weights,
            );

            let ranked = RankedCandidate {
                internship: Arc::clone(record),
                score,
            };
            match best.entry(record.id.clone()) {
                Entry::Occupied(mut existing) => {
                    if existing.get().score.weighted_score < score.weighted_score {
                        existing.insert(ranked);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(ranked);
                }
            }
        }

        let mut ranked: Vec<RankedCandidate> = best.into_values().collect();
        ranked.sort_by(|first, second| {
            second
                .score
                .weighted_score
                .partial_cmp(&first.score.weighted_score)
                .unwrap_or(CmpOrdering::Equal)
                .then_with(|| first.internship.id.cmp(&second.internship.id))
        });
        Ok(ranked)
    }

    /// Apply the threshold and hard filters, explaining survivors until `top_k`.
    async fn explain_ranked(
        &self,
        student: &StudentProfile,
        profile: &ProfileSnapshot,
        ranked: Vec<RankedCandidate>,
        filters: &PreparedFilters,
        top_k: usize,
    ) -> Vec<Recommendation> {
        let threshold = self.config.matching.min_match_threshold;
        let mut recommendations = Vec::with_capacity(top_k);

        for candidate in ranked {
            if recommendations.len() >= top_k {
                break;
            }
            let percentage = candidate.score.match_percentage();
            if percentage < threshold {
                break;
            }
            if !filters.passes(&candidate.internship) {
                continue;
            }

            let explanation = match self
                .explainer
                .generate_explanation(student, &candidate.internship, &candidate.score, profile)
                .await
            {
                Ok(explanation) => explanation,
                Err(error) => {
                    warn!("Explanation failed for {}: {error}", candidate.internship.id);
                    MatchExplanation::minimal(percentage, self.explainer.quality(percentage))
                }
            };

            recommendations.push(Recommendation {
                internship: Arc::unwrap_or_clone(candidate.internship),
                match_percentage: percentage,
                score_breakdown: candidate.score.dimensions.breakdown(),
                match_reasons: explanation.recommendation_reasons.clone(),
                explanation: Some(explanation),
                is_fallback: false,
            });
        }

        recommendations
    }
}

/// Embedding-based internship recommender.
///
/// Cheap to clone; clones share one engine. Construct once and pass it to every
/// request handler.
#[derive(Clone)]
pub struct RecommendationEngine {
    inner: Arc<EngineInner>,
}

impl RecommendationEngine {
    /// Engine using `provider` for embeddings.
    ///
    /// # Errors
    /// Returns an error if no cache directory can be determined
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn InternshipStore>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let pool = WorkerPool::new(config.runtime.worker_threads);
        Self::with_pool(config, store, provider, pool)
    }

    /// Engine using the embedding backend named in `config`.
    ///
    /// # Errors
    /// Returns an error if no cache directory can be determined
    pub fn from_config(config: EngineConfig, store: Arc<dyn InternshipStore>) -> Result<Self> {
        let pool = WorkerPool::new(config.runtime.worker_threads);
        let provider = provider_from_config(&config.embedding, &pool);
        Self::with_pool(config, store, provider, pool)
    }

    fn with_pool(
        config: EngineConfig,
        store: Arc<dyn InternshipStore>,
        provider: Arc<dyn EmbeddingProvider>,
        pool: WorkerPool,
    ) -> Result<Self> {
        let cache_dir = config.cache_dir()?;
        let embeddings = Arc::new(EmbeddingService::new(provider));
        let skills = Arc::new(SkillSignatureManager::new(
            Arc::clone(&embeddings),
            &config.skills,
        ));

        let inner = EngineInner {
            profiles: StudentProfileCache::new(Arc::clone(&skills), &config.cache),
            indices: InternshipIndexManager::new(cache_dir, pool.clone()),
            explainer: MatchExplanationGenerator::new(Arc::clone(&skills), config.matching.clone()),
            store,
            pool,
            embeddings,
            skills,
            state: Mutex::new(EngineState::Uninitialized),
            attempts: AtomicU64::new(0),
            refreshing: AtomicBool::new(false),
            rebuild_lock: AsyncMutex::new(()),
            last_refresh: Mutex::new(None),
            config,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Current lifecycle state.
    pub fn status(&self) -> EngineStatus {
        match &*self.inner.lock_state() {
            EngineState::Uninitialized => EngineStatus::Uninitialized,
            EngineState::Initializing { .. } => EngineStatus::Initializing,
            EngineState::Ready => EngineStatus::Ready,
            EngineState::Failed(reason) => EngineStatus::Failed(reason.clone()),
        }
    }

    /// Whether the engine is serving requests.
    pub fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    /// Whether a background rebuild is running.
    pub fn is_refreshing(&self) -> bool {
        self.inner.refreshing.load(Ordering::Acquire)
    }

    /// Bring the engine to `Ready`.
    ///
    /// Concurrent callers share a single attempt. Returns `false` if it failed; the next
    /// call starts a new attempt.
    pub async fn initialize(&self) -> bool {
        let outcome = {
            let mut state = self.inner.lock_state();
            match &*state {
                EngineState::Ready => return true,
                EngineState::Initializing { outcome, .. } => outcome.clone(),
                EngineState::Uninitialized | EngineState::Failed(_) => {
                    let attempt = self.inner.attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    let outcome = Arc::clone(&self.inner).spawn_initialization(attempt);
                    *state = EngineState::Initializing {
                        attempt,
                        outcome: outcome.clone(),
                    };
                    outcome
                }
            }
        };
        outcome.await
    }

    /// Ranked recommendations for `student`.
    ///
    /// Returns at most `top_k` items. When nothing clears the match threshold, trending
    /// postings are returned instead, marked `is_fallback`: those satisfying `filters`
    /// when any do, otherwise the unfiltered trending list.
    ///
    /// # Errors
    /// Returns [`Error::Unavailable`] if the engine cannot initialize and
    /// [`Error::Timeout`] if a bounded stage or the whole request runs out of time
    pub async fn get_recommendations_for_student(
        &self,
        student: &StudentProfile,
        top_k: usize,
        filters: &RecommendationFilters,
        weights: Option<DimensionWeights>,
    ) -> Result<Vec<Recommendation>> {
        let limit = self.inner.config.runtime.request_timeout();
        timeout(limit, self.recommend(student, top_k, filters, weights))
            .await
            .map_err(|_elapsed| timeout_error("recommendation", limit))?
    }

    async fn recommend(
        &self,
        student: &StudentProfile,
        top_k: usize,
        filters: &RecommendationFilters,
        weights: Option<DimensionWeights>,
    ) -> Result<Vec<Recommendation>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        self.ensure_ready().await?;

        let mut set = self.inner.indices.snapshot().await;
        if !set.has_records() {
            set = self.reload().await?;
        }
        self.check_for_drift(&set).await;

        let inner = &self.inner;
        let weights = resolve_weights(
            weights,
            inner.config.storage.weights_path.as_deref(),
            inner.config.scoring.default_weights,
        )
        .await;
        let profile = student.snapshot();
        let filters = filters.prepare();

        let ranked = match inner.student_vectors(student, &profile).await {
            Ok(vectors) => inner
                .rank_candidates(&set, vectors, top_k, &filters, &weights)
                .await
                .unwrap_or_else(|error| {
                    warn!("Candidate search failed for {}: {error}", student.id);
                    Vec::new()
                }),
            Err(error) => {
                warn!("Could not build vectors for student {}: {error}", student.id);
                Vec::new()
            }
        };

        let recommendations = inner
            .explain_ranked(student, &profile, ranked, &filters, top_k)
            .await;
        if !recommendations.is_empty() || !set.has_records() {
            info!(
                "Returning {} recommendations for student {}",
                recommendations.len(),
                student.id
            );
            return Ok(recommendations);
        }

        info!("No matches above threshold for student {}, serving trending", student.id);
        Ok(trending::fallback_recommendations(
            set.records.values(),
            &filters,
            top_k,
            &inner.config.scoring,
        ))
    }

    async fn ensure_ready(&self) -> Result<()> {
        if self.inner.is_ready() {
            return Ok(());
        }
        let limit = self.inner.config.runtime.request_init_timeout();
        match timeout(limit, self.initialize()).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::Unavailable(
                "Recommendation engine could not initialize".to_owned(),
            )),
            Err(_elapsed) => Err(timeout_error("initialization", limit)),
        }
    }

    /// Rebuild from the store when the engine is ready but holds no postings.
    async fn reload(&self) -> Result<Arc<IndexSet>> {
        let limit = self.inner.config.runtime.reload_timeout();
        match timeout(limit, self.inner.rebuild()).await {
            Ok(Ok(count)) => info!("Reloaded {count} internships"),
            Ok(Err(error)) => warn!("Reloading internships failed: {error}"),
            Err(_elapsed) => return Err(timeout_error("reload", limit)),
        }
        Ok(self.inner.indices.snapshot().await)
    }

    /// Schedule a background rebuild if the store size changed since the last build.
    async fn check_for_drift(&self, set: &IndexSet) {
        let limit = self.inner.config.runtime.refresh_check_timeout();
        match timeout(limit, self.inner.store.count_documents()).await {
            Ok(Ok(count)) if count != set.internship_count => {
                info!(
                    "Internship count changed ({} -> {count}), scheduling refresh",
                    set.internship_count
                );
                Arc::clone(&self.inner).schedule_refresh();
            }
            Ok(Ok(_)) => {}
            Ok(Err(error)) => debug!("Skipping refresh check: {error}"),
            Err(_elapsed) => debug!("Refresh check timed out after {}ms", limit.as_millis()),
        }
    }

    /// Most popular listed postings, at most `limit`.
    ///
    /// # Errors
    /// Returns [`Error::DataSource`] if no index is loaded and the store cannot be read
    pub async fn get_trending_internships(&self, limit: usize) -> Result<Vec<Internship>> {
        let set = self.inner.indices.snapshot().await;
        let ranked = if set.has_records() {
            rank_trending(set.records.values(), limit)
        } else {
            let documents = self.inner.store.find_all().await?;
            let records: Vec<Arc<Internship>> = documents
                .iter()
                .filter_map(normalize_document)
                .map(|doc| Arc::new(doc.internship))
                .collect();
            rank_trending(&records, limit)
        };
        Ok(ranked.into_iter().map(Arc::unwrap_or_clone).collect())
    }

    /// Rebuild every index from the store now and persist it.
    pub async fn refresh_data(&self) -> bool {
        info!("Refreshing internship data");
        match self.inner.rebuild().await {
            Ok(count) => {
                info!("Refresh indexed {count} internships");
                self.inner.mark_ready();
                true
            }
            Err(error) => {
                error!("Refresh failed: {error}");
                false
            }
        }
    }

    /// Drop the cached vectors of one student.
    pub fn invalidate_user_cache(&self, student_id: &str) -> bool {
        let removed = self.inner.profiles.invalidate(student_id);
        if removed {
            debug!("Invalidated cached vectors for student {student_id}");
        }
        removed
    }

    /// Health and cache statistics.
    pub async fn get_engine_stats(&self) -> EngineStats {
        let inner = &self.inner;
        let status = self.status();
        EngineStats {
            ready: status == EngineStatus::Ready,
            status,
            model_id: inner.embeddings.model_id(),
            embedding_dimension: inner.embeddings.dimension(),
            min_match_threshold: inner.config.matching.min_match_threshold,
            index: inner.indices.stats().await,
            last_refresh: *inner
                .last_refresh
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            refresh_in_progress: self.is_refreshing(),
            worker_threads: inner.pool.max_concurrent(),
            student_cache: inner.profiles.stats(),
            skill_cache: inner.skills.cache_stats(),
        }
    }

    /// Clear student vectors and return to `Uninitialized`.
    pub fn reset(&self) {
        self.inner.profiles.clear();
        *self.inner.lock_state() = EngineState::Uninitialized;
        info!("Recommendation engine reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn engine_with(documents: Vec<serde_json::Value>) -> (RecommendationEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.embedding.dimension = 64;
        config.storage.cache_dir = Some(dir.path().to_path_buf());
        let provider = Arc::new(HashingEmbedder::new(64, WorkerPool::new(2)));
        let engine =
            RecommendationEngine::new(config, Arc::new(MemoryStore::new(documents)), provider)
                .unwrap();
        (engine, dir)
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let (engine, _dir) = engine_with(vec![json!({"id": "a", "title": "Rust Intern"})]);
        assert_eq!(engine.status(), EngineStatus::Uninitialized);
        assert!(engine.initialize().await);
        assert!(engine.initialize().await);
        assert!(engine.is_ready());
        assert_eq!(engine.get_engine_stats().await.index.indexed, 1);
    }

    #[tokio::test]
    async fn test_zero_top_k_is_empty() {
        let (engine, _dir) = engine_with(vec![json!({"id": "a", "title": "Rust Intern"})]);
        let student = StudentProfile::new("s1").with_skills(["Rust"]);
        let results = engine
            .get_recommendations_for_student(&student, 0, &RecommendationFilters::default(), None)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_reset_returns_to_uninitialized() {
        let (engine, _dir) = engine_with(Vec::new());
        assert!(engine.initialize().await);
        engine.reset();
        assert_eq!(engine.status(), EngineStatus::Uninitialized);
        assert!(engine.initialize().await);
    }

    #[tokio::test]
    async fn test_trending_without_index_reads_store() {
        let (engine, _dir) = engine_with(vec![
            json!({"id": "a", "title": "A", "views": 5}),
            json!({"id": "b", "title": "B", "views": 50}),
        ]);
        let trending = engine.get_trending_internships(1).await.unwrap();
        assert_eq!(trending.len(), 1);
        assert_eq!(trending[0].id, "b");
    }

    #[test]
    fn test_gather_candidates_scores_both_dimensions() {
        let entries = [("near", [0.5f32, 0.5]), ("far", [0.9, 0.1])]
            .into_iter()
            .enumerate()
            .map(|(position, (id, location))| IndexEntry {
                internship: Internship::new(id, id),
                skill_vector: if position == 0 { vec![1.0, 0.0] } else { vec![0.0, 1.0] },
                location_vector: location,
                stipend_value: 0.2,
                timeline_value: 0.5,
            })
            .collect();
        let set = IndexSet::build(entries, 2, "test", 2).unwrap();
        let vectors = StudentVectors {
            skill_vector: vec![1.0, 0.0],
            location_vector: vec![0.5, 0.5],
            stipend_vector: vec![0.2],
            timeline_vector: vec![0.3],
        };

        let candidates = gather_candidates(&set, &vectors, 1, 0.5);
        assert_eq!(candidates.len(), 1);
        let only = candidates[0];
        assert_eq!(only.row, 0);
        assert!((only.skill - 1.0).abs() < 1e-6);
        assert!((only.location - 1.0).abs() < 1e-6);
    }
}

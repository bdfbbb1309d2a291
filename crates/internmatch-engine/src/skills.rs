//! Semantic skill matching and skill-set change classification.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash as _, Hasher as _};
use std::sync::{Arc, Mutex, PoisonError};

use internmatch_core::Result;
use internmatch_core::config::SkillConfig;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheStats, LruCache};
use crate::embedding::{Embedding, EmbeddingService, cosine_similarity};

/// Signature of an empty skill set.
pub const EMPTY_SIGNATURE: &str = "empty";

/// Trim and lowercase a skill name.
pub fn normalize_skill(skill: &str) -> String {
    skill.trim().to_lowercase()
}

/// Normalized, deduplicated, sorted skill names with blanks removed.
pub fn normalized_set<S: AsRef<str>>(skills: &[S]) -> BTreeSet<String> {
    skills
        .iter()
        .map(|skill| normalize_skill(skill.as_ref()))
        .filter(|skill| !skill.is_empty())
        .collect()
}

/// Stable hash over a skill set, insensitive to order, case and duplicates.
pub fn compute_skill_signature<S: AsRef<str>>(skills: &[S]) -> String {
    let normalized = normalized_set(skills);
    if normalized.is_empty() {
        return EMPTY_SIGNATURE.to_owned();
    }

    let joined = normalized.into_iter().collect::<Vec<_>>().join("|");
    let mut hasher = DefaultHasher::new();
    joined.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// How closely a user skill covers a required one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillMatchType {
    /// Similarity at least 0.95
    Exact,
    /// Similarity at least 0.85
    Semantic,
    /// Similarity at least 0.75
    Related,
    /// Anything weaker that still cleared the threshold
    Transferable,
}

impl SkillMatchType {
    /// Bucket of a cosine similarity.
    pub fn from_similarity(similarity: f32) -> Self {
        if similarity >= 0.95 {
            Self::Exact
        } else if similarity >= 0.85 {
            Self::Semantic
        } else if similarity >= 0.75 {
            Self::Related
        } else {
            Self::Transferable
        }
    }
}

/// A required skill covered by a similar, non-identical user skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticMatch {
    /// Normalized posting skill
    pub required_skill: String,
    /// Normalized student skill covering it
    pub user_skill: String,
    /// Rounded to 3 decimals
    pub similarity: f32,
    /// Bucket of `similarity`
    pub match_type: SkillMatchType,
}

/// Result of matching a student's skills against a posting's requirements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillMatchReport {
    /// Required skills the student has verbatim
    pub exact_matches: Vec<String>,
    /// Required skills covered by a similar student skill
    pub semantic_matches: Vec<SemanticMatch>,
    /// Required skills left uncovered
    pub missing_skills: Vec<String>,
    /// Student skills no requirement used
    pub extra_skills: Vec<String>,
    /// Percentage in `[0, 100]`, rounded to 2 decimals
    pub match_score: f64,
    /// Distinct required skills
    pub total_required: usize,
    /// Exact plus semantic matches
    pub total_matched: usize,
}

/// Outcome of comparing an old skill set with a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementCheck {
    /// The edit refines rather than replaces the skill set
    pub is_enhancement: bool,
    /// Mean best similarity of the added skills
    pub avg_similarity: f32,
    /// New skills not similar to any old skill
    pub different_skills: Vec<String>,
}

/// Thresholds used by the matching functions.
#[derive(Debug, Clone, Copy)]
pub struct MatchThresholds {
    /// Similarity a semantic match must exceed
    pub similarity: f32,
    /// Largest share of different skills an enhancement may add
    pub enhancement_ratio: f32,
    /// Credit of a semantic match relative to an exact one
    pub semantic_weight: f64,
}

impl From<&SkillConfig> for MatchThresholds {
    fn from(config: &SkillConfig) -> Self {
        Self {
            similarity: config.similarity_threshold,
            enhancement_ratio: config.enhancement_ratio,
            semantic_weight: config.semantic_match_weight,
        }
    }
}

/// Match user skills against required skills.
///
/// Exact (normalized) overlaps are taken first. Each remaining required skill, in sorted
/// order, greedily takes the most similar unused user skill whose similarity strictly
/// exceeds the threshold.
pub fn match_skills<F>(
    user_skills: &[String],
    required_skills: &[String],
    thresholds: MatchThresholds,
    mut similarity: F,
) -> SkillMatchReport
where
    F: FnMut(&str, &str) -> f32,
{
    let user_set = normalized_set(user_skills);
    let required_set = normalized_set(required_skills);

    if user_set.is_empty() || required_set.is_empty() {
        return SkillMatchReport {
            total_required: required_set.len(),
            missing_skills: required_set.into_iter().collect(),
            extra_skills: user_set.into_iter().collect(),
            ..SkillMatchReport::default()
        };
    }

    let exact_matches: Vec<String> = user_set.intersection(&required_set).cloned().collect();
    let remaining_user: Vec<&String> = user_set.difference(&required_set).collect();

    let mut used_user = BTreeSet::new();
    let mut semantic_matches = Vec::new();
    let mut missing_skills = Vec::new();

    for required in required_set.difference(&user_set) {
        let mut best: Option<(&String, f32)> = None;
        for user in &remaining_user {
            if used_user.contains(*user) {
                continue;
            }
            let score = similarity(required, user);
            let better = best.is_none_or(|(_, best_score)| score > best_score);
            if score > thresholds.similarity && better {
                best = Some((user, score));
            }
        }

        match best {
            Some((user, score)) => {
                used_user.insert(user.clone());
                semantic_matches.push(SemanticMatch {
                    required_skill: required.clone(),
                    user_skill: user.clone(),
                    similarity: (score * 1000.0).round() / 1000.0,
                    match_type: SkillMatchType::from_similarity(score),
                });
            }
            None => missing_skills.push(required.clone()),
        }
    }

    let extra_skills = remaining_user
        .into_iter()
        .filter(|user| !used_user.contains(*user))
        .cloned()
        .collect();

    let total_required = required_set.len();
    let weighted = exact_matches.len() as f64
        + semantic_matches.len() as f64 * thresholds.semantic_weight;
    let match_score = (weighted / total_required as f64 * 100.0 * 100.0).round() / 100.0;

    SkillMatchReport {
        total_matched: exact_matches.len() + semantic_matches.len(),
        exact_matches,
        semantic_matches,
        missing_skills,
        extra_skills,
        match_score: match_score.clamp(0.0, 100.0),
        total_required,
    }
}

/// Decide whether `new_skills` only refines `old_skills`.
///
/// `embedding` returns the vector for a normalized skill, or `None` when it cannot be
/// computed (such a new skill counts as different).
pub fn classify_enhancement<F>(
    old_skills: &[String],
    new_skills: &[String],
    thresholds: MatchThresholds,
    mut embedding: F,
) -> EnhancementCheck
where
    F: FnMut(&str) -> Option<Arc<Embedding>>,
{
    let old_set = normalized_set(old_skills);
    let new_set = normalized_set(new_skills);

    if old_set.is_empty() {
        return EnhancementCheck {
            is_enhancement: false,
            avg_similarity: 0.0,
            different_skills: new_set.into_iter().collect(),
        };
    }

    let only_in_new: Vec<&String> = new_set.difference(&old_set).collect();
    if only_in_new.is_empty() {
        return EnhancementCheck {
            is_enhancement: true,
            avg_similarity: 1.0,
            different_skills: Vec::new(),
        };
    }

    let old_embeddings: Vec<Arc<Embedding>> =
        old_set.iter().filter_map(|skill| embedding(skill)).collect();
    if old_embeddings.is_empty() {
        return EnhancementCheck {
            is_enhancement: false,
            avg_similarity: 0.0,
            different_skills: only_in_new.into_iter().cloned().collect(),
        };
    }

    let mut different_skills = Vec::new();
    let mut total_similarity = 0.0f32;
    for skill in &only_in_new {
        let Some(new_embedding) = embedding(skill) else {
            different_skills.push((*skill).clone());
            continue;
        };
        let max_similarity = old_embeddings
            .iter()
            .map(|old| cosine_similarity(old, &new_embedding))
            .fold(f32::MIN, f32::max);
        total_similarity += max_similarity;
        if max_similarity < thresholds.similarity {
            different_skills.push((*skill).clone());
        }
    }

    let new_count = only_in_new.len() as f32;
    EnhancementCheck {
        is_enhancement: different_skills.len() as f32 / new_count <= thresholds.enhancement_ratio,
        avg_similarity: total_similarity / new_count,
        different_skills,
    }
}

/// Skill matcher backed by the embedding model, with a bounded per-skill embedding cache.
pub struct SkillSignatureManager {
    embeddings: Arc<EmbeddingService>,
    cache: Mutex<LruCache<String, Arc<Embedding>>>,
    thresholds: MatchThresholds,
}

impl SkillSignatureManager {
    /// Manager embedding through `embeddings`.
    pub fn new(embeddings: Arc<EmbeddingService>, config: &SkillConfig) -> Self {
        Self {
            embeddings,
            cache: Mutex::new(LruCache::new(config.embedding_cache_size)),
            thresholds: MatchThresholds::from(config),
        }
    }

    /// Configured thresholds.
    pub fn thresholds(&self) -> MatchThresholds {
        self.thresholds
    }

    /// See [`compute_skill_signature`].
    pub fn compute_skill_signature<S: AsRef<str>>(&self, skills: &[S]) -> String {
        compute_skill_signature(skills)
    }

    /// Embeddings for the given skills, computing and caching misses in one batch.
    ///
    /// Skills whose embedding cannot be computed are absent from the result.
    pub async fn skill_embeddings<S: AsRef<str>>(
        &self,
        skills: &[S],
    ) -> HashMap<String, Arc<Embedding>> {
        let (mut found, missing) = self.split_cached(skills);
        if !missing.is_empty() {
            let count = missing.len();
            match self.embed_and_cache(missing).await {
                Ok(computed) => found.extend(computed),
                Err(error) => tracing::warn!("Failed to embed {count} skills: {error}"),
            }
        }
        found
    }

    /// Like [`Self::skill_embeddings`], but a failed batch is an error.
    ///
    /// # Errors
    /// Returns the embedding error when some skill is neither cached nor encodable
    pub async fn try_skill_embeddings<S: AsRef<str>>(
        &self,
        skills: &[S],
    ) -> Result<HashMap<String, Arc<Embedding>>> {
        let (mut found, missing) = self.split_cached(skills);
        if !missing.is_empty() {
            found.extend(self.embed_and_cache(missing).await?);
        }
        Ok(found)
    }

    /// Cached embeddings of `skills` and the normalized names still to encode.
    fn split_cached<S: AsRef<str>>(
        &self,
        skills: &[S],
    ) -> (HashMap<String, Arc<Embedding>>, Vec<String>) {
        let mut found = HashMap::new();
        let mut missing = Vec::new();
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        for skill in normalized_set(skills) {
            match cache.get(&skill) {
                Some(embedding) => {
                    found.insert(skill, Arc::clone(embedding));
                }
                None => missing.push(skill),
            }
        }
        (found, missing)
    }

    async fn embed_and_cache(&self, missing: Vec<String>) -> Result<Vec<(String, Arc<Embedding>)>> {
        let vectors = self.embeddings.encode_batch(&missing, missing.len()).await?;
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(missing
            .into_iter()
            .zip(vectors)
            .map(|(skill, vector)| {
                let vector = Arc::new(vector);
                cache.insert(skill.clone(), Arc::clone(&vector), None);
                (skill, vector)
            })
            .collect())
    }

    /// Cosine similarity of two skill names, 0 when either cannot be embedded.
    pub async fn compute_skill_similarity(&self, skill_a: &str, skill_b: &str) -> f32 {
        let embeddings = self.skill_embeddings(&[skill_a, skill_b]).await;
        match (
            embeddings.get(&normalize_skill(skill_a)),
            embeddings.get(&normalize_skill(skill_b)),
        ) {
            (Some(left), Some(right)) => cosine_similarity(left, right),
            _ => 0.0,
        }
    }

    /// Match user skills against required skills using embedding similarity.
    ///
    /// # Errors
    /// Returns the embedding error when the unmatched skills cannot be embedded
    pub async fn find_skill_matches(
        &self,
        user_skills: &[String],
        required_skills: &[String],
    ) -> Result<SkillMatchReport> {
        let user_set = normalized_set(user_skills);
        let required_set = normalized_set(required_skills);
        let needs_similarity = !user_set.is_empty()
            && required_set.difference(&user_set).next().is_some()
            && user_set.difference(&required_set).next().is_some();

        let embeddings = if needs_similarity {
            let pending: Vec<&String> = user_set.symmetric_difference(&required_set).collect();
            self.try_skill_embeddings(&pending).await?
        } else {
            HashMap::new()
        };

        Ok(match_skills(user_skills, required_skills, self.thresholds, |left, right| {
            match (embeddings.get(left), embeddings.get(right)) {
                (Some(left), Some(right)) => cosine_similarity(left, right),
                _ => 0.0,
            }
        }))
    }

    /// Decide whether a skill edit is an enhancement of the previous skill set.
    pub async fn are_skills_enhancement(
        &self,
        old_skills: &[String],
        new_skills: &[String],
    ) -> EnhancementCheck {
        let old_set = normalized_set(old_skills);
        let new_set = normalized_set(new_skills);
        let needs_embeddings =
            !old_set.is_empty() && new_set.difference(&old_set).next().is_some();

        let embeddings = if needs_embeddings {
            let pending: Vec<&String> = old_set.union(&new_set).collect();
            self.skill_embeddings(&pending).await
        } else {
            HashMap::new()
        };

        classify_enhancement(old_skills, new_skills, self.thresholds, |skill| {
            embeddings.get(skill).cloned()
        })
    }

    /// Statistics of the per-skill embedding cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats()
    }

    /// Drop every cached skill embedding.
    pub fn clear_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

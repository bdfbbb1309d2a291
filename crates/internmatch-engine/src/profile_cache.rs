//! Per-student vector cache with change-aware invalidation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use internmatch_core::config::CacheConfig;
use internmatch_core::{ProfileSnapshot, StudentProfile};
use serde::Serialize;

use crate::cache::{CacheStats, LruCache};
use crate::embedding::Embedding;
use crate::skills::{SkillSignatureManager, compute_skill_signature};

/// The four query vectors derived from a student profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentVectors {
    /// Unit-length text embedding
    pub skill_vector: Embedding,
    /// Unit-length normalized coordinates (2 dims)
    pub location_vector: Vec<f32>,
    /// Expected stipend on a 0..1 scale (1 dim)
    pub stipend_vector: Vec<f32>,
    /// Duration preference on a 0..1 scale (1 dim)
    pub timeline_vector: Vec<f32>,
}

#[derive(Debug, Clone)]
struct CachedEntry {
    vectors: Arc<StudentVectors>,
    skills: Vec<String>,
    skill_signature: String,
    profile_hash: String,
    cached_at: DateTime<Utc>,
}

/// Statistics for the student cache
#[derive(Debug, Clone, Serialize)]
pub struct ProfileCacheStats {
    /// Students with cached vectors
    pub cached_profiles: usize,
    /// Cache capacity
    pub max_profiles: usize,
    /// Configured TTL
    pub ttl_hours: u64,
    /// Lookups served from cache
    pub hits: u64,
    /// Lookups with no live entry
    pub misses: u64,
    /// Entries dropped for capacity
    pub evictions: u64,
    /// Hits over total lookups
    pub hit_rate: f64,
    /// Entries dropped because the profile changed
    pub invalidations: u64,
    /// Age of the oldest entry in seconds
    pub oldest_entry_secs: Option<u64>,
}

/// Caches [`StudentVectors`] per student id.
///
/// A cached bundle is served only while its TTL holds, the non-skill part of the
/// profile is unchanged, and any skill edit classifies as an enhancement of the
/// skills it was built from.
pub struct StudentProfileCache {
    skills: Arc<SkillSignatureManager>,
    entries: Mutex<LruCache<String, CachedEntry>>,
    ttl: Duration,
    ttl_hours: u64,
    invalidations: AtomicU64,
}

impl StudentProfileCache {
    /// Empty cache sized and timed by `config`.
    pub fn new(skills: Arc<SkillSignatureManager>, config: &CacheConfig) -> Self {
        Self {
            skills,
            entries: Mutex::new(LruCache::new(config.max_student_profiles)),
            ttl: config.student_ttl(),
            ttl_hours: config.student_ttl_hours,
            invalidations: AtomicU64::new(0),
        }
    }

    /// Cached vectors for `student` if they are still valid for the current profile.
    pub async fn get_cached_vectors(&self, student: &StudentProfile) -> Option<Arc<StudentVectors>> {
        let snapshot = student.snapshot();
        let entry = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&student.id)
            .cloned()?;

        if entry.profile_hash != snapshot.non_skill_hash() {
            tracing::debug!("Student {}: profile data changed, invalidating cache", student.id);
            self.invalidate_changed(&student.id);
            return None;
        }

        if entry.skill_signature == compute_skill_signature(&snapshot.skills) {
            return Some(entry.vectors);
        }

        let check = self
            .skills
            .are_skills_enhancement(&entry.skills, &snapshot.skills)
            .await;
        if check.is_enhancement {
            tracing::debug!(
                "Student {}: skills are enhancements (similarity {:.2}), using cache from {}",
                student.id,
                check.avg_similarity,
                entry.cached_at
            );
            Some(entry.vectors)
        } else {
            let sample: Vec<&String> = check.different_skills.iter().take(5).collect();
            tracing::info!("Student {}: significant skill changes detected: {sample:?}", student.id);
            self.invalidate_changed(&student.id);
            None
        }
    }

    /// Store freshly computed vectors along with the profile they were built from.
    pub fn store_vectors(
        &self,
        student_id: &str,
        vectors: Arc<StudentVectors>,
        snapshot: &ProfileSnapshot,
    ) {
        let entry = CachedEntry {
            vectors,
            skills: snapshot.skills.clone(),
            skill_signature: compute_skill_signature(&snapshot.skills),
            profile_hash: snapshot.non_skill_hash(),
            cached_at: Utc::now(),
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(student_id.to_owned(), entry, Some(self.ttl));
    }

    /// Drop the cached vectors of one student. Returns whether an entry existed.
    pub fn invalidate(&self, student_id: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&student_id.to_owned())
            .is_some()
    }

    fn invalidate_changed(&self, student_id: &str) {
        if self.invalidate(student_id) {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of cached students.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no student is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache counters and sizes.
    pub fn stats(&self) -> ProfileCacheStats {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let CacheStats {
            entries: cached_profiles,
            capacity,
            hits,
            misses,
            evictions,
            hit_rate,
        } = entries.stats();
        ProfileCacheStats {
            cached_profiles,
            max_profiles: capacity,
            ttl_hours: self.ttl_hours,
            hits,
            misses,
            evictions,
            hit_rate,
            invalidations: self.invalidations.load(Ordering::Relaxed),
            oldest_entry_secs: entries.oldest_age().map(|age| age.as_secs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingService, HashingEmbedder};
    use crate::pool::WorkerPool;
    use internmatch_core::config::SkillConfig;

    fn cache_with(config: &CacheConfig) -> StudentProfileCache {
        let service = Arc::new(EmbeddingService::new(Arc::new(HashingEmbedder::new(
            64,
            WorkerPool::new(1),
        ))));
        let skills = Arc::new(SkillSignatureManager::new(service, &SkillConfig::default()));
        StudentProfileCache::new(skills, config)
    }

    fn vectors(marker: f32) -> Arc<StudentVectors> {
        Arc::new(StudentVectors {
            skill_vector: vec![marker, 0.0],
            location_vector: vec![0.5, 0.5],
            stipend_vector: vec![0.2],
            timeline_vector: vec![0.3],
        })
    }

    #[tokio::test]
    async fn test_round_trip() {
        let cache = cache_with(&CacheConfig::default());
        let student = StudentProfile::new("s1").with_skills(["Python"]);
        assert!(cache.get_cached_vectors(&student).await.is_none());

        cache.store_vectors(&student.id, vectors(1.0), &student.snapshot());
        let cached = cache.get_cached_vectors(&student).await.unwrap();
        assert_eq!(cached.skill_vector, vec![1.0, 0.0]);

        let stats = cache.stats();
        assert_eq!(stats.cached_profiles, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_location_change_invalidates() {
        let cache = cache_with(&CacheConfig::default());
        let student = StudentProfile::new("s1").with_skills(["Python"]);
        cache.store_vectors(&student.id, vectors(1.0), &student.snapshot());

        let moved = student.with_location("Mumbai", 19.07, 72.87);
        assert!(cache.get_cached_vectors(&moved).await.is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[tokio::test]
    async fn test_unrelated_skills_invalidate() {
        let cache = cache_with(&CacheConfig::default());
        let student = StudentProfile::new("s1").with_skills(["Python"]);
        cache.store_vectors(&student.id, vectors(1.0), &student.snapshot());

        let changed = StudentProfile::new("s1").with_skills(["Python", "Watercolor", "Pottery"]);
        assert!(cache.get_cached_vectors(&changed).await.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_same_skills_reordered_hit() {
        let cache = cache_with(&CacheConfig::default());
        let student = StudentProfile::new("s1").with_skills(["Python", "SQL"]);
        cache.store_vectors(&student.id, vectors(1.0), &student.snapshot());

        let reordered = StudentProfile::new("s1").with_skills(["sql", "PYTHON"]);
        assert!(cache.get_cached_vectors(&reordered).await.is_some());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let config = CacheConfig {
            student_ttl_hours: 0,
            max_student_profiles: 10,
        };
        let cache = cache_with(&config);
        let student = StudentProfile::new("s1");
        cache.store_vectors(&student.id, vectors(1.0), &student.snapshot());
        assert!(cache.get_cached_vectors(&student).await.is_none());
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let config = CacheConfig {
            student_ttl_hours: 24,
            max_student_profiles: 2,
        };
        let cache = cache_with(&config);
        for id in ["a", "b", "c"] {
            let student = StudentProfile::new(id);
            cache.store_vectors(id, vectors(1.0), &student.snapshot());
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get_cached_vectors(&StudentProfile::new("a")).await.is_none());
        assert!(cache.get_cached_vectors(&StudentProfile::new("c")).await.is_some());

        assert!(cache.invalidate("c"));
        assert!(!cache.invalidate("c"));
        cache.clear();
        assert!(cache.is_empty());
    }
}

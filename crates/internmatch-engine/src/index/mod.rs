//! Multi-dimensional internship vector indices with atomic snapshot swaps.

mod flat;
mod persistence;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use internmatch_core::{Error, Internship, Result};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

pub use flat::FlatIndex;
pub use persistence::IndexMetadata;

use crate::embedding::{Embedding, l2_normalize};
use crate::pool::WorkerPool;

/// The four per-dimension indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Profile text embeddings
    Skill,
    /// Normalized coordinates
    Location,
    /// Stipend on a unit scale
    Stipend,
    /// Duration bucket
    Timeline,
}

impl IndexKind {
    /// Every kind, in persistence order.
    pub const ALL: [Self; 4] = [Self::Skill, Self::Location, Self::Stipend, Self::Timeline];

    /// File stem and log name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Skill => "skill",
            Self::Location => "location",
            Self::Stipend => "stipend",
            Self::Timeline => "timeline",
        }
    }

    /// Whether rows and queries are L2-normalized for this index.
    pub fn is_normalized(self) -> bool {
        matches!(self, Self::Skill | Self::Location)
    }
}

/// One posting with its precomputed vectors, ready for indexing.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// The posting
    pub internship: Internship,
    /// Embedding of the posting text
    pub skill_vector: Embedding,
    /// Normalized `(lat, lon)`
    pub location_vector: [f32; 2],
    /// Stipend on a unit scale
    pub stipend_value: f32,
    /// Duration bucket
    pub timeline_value: f32,
}

/// Immutable snapshot of every index plus the co-indexed id list and records.
#[derive(Debug, Default)]
pub struct IndexSet {
    /// Skill embeddings
    pub skill: FlatIndex,
    /// Coordinates
    pub location: FlatIndex,
    /// Stipends
    pub stipend: FlatIndex,
    /// Duration buckets
    pub timeline: FlatIndex,
    /// Row `i` of every index belongs to `internship_ids[i]`
    pub internship_ids: Vec<String>,
    /// Inverse of `internship_ids`
    pub id_to_row: HashMap<String, usize>,
    /// Postings by id; empty for a snapshot fresh from disk
    pub records: HashMap<String, Arc<Internship>>,
    /// When the snapshot was built
    pub built_at: Option<DateTime<Utc>>,
    /// Number of store documents this snapshot was built from
    pub internship_count: usize,
    /// Skill embedding dimension
    pub dimension: usize,
    /// Model that produced the skill embeddings
    pub model_id: String,
}

impl IndexSet {
    /// Empty snapshot for a model.
    pub fn empty(dimension: usize, model_id: &str) -> Self {
        Self {
            skill: FlatIndex::new(dimension),
            location: FlatIndex::new(2),
            stipend: FlatIndex::new(1),
            timeline: FlatIndex::new(1),
            dimension,
            model_id: model_id.to_owned(),
            ..Self::default()
        }
    }

    /// Build a snapshot from indexing entries.
    ///
    /// Skill and location vectors are L2-normalized; stipend and timeline are stored raw.
    /// Entries repeating an earlier id are skipped.
    ///
    /// # Errors
    /// Returns [`Error::InvalidIndex`] if a skill vector does not match `dimension`
    pub fn build(
        entries: Vec<IndexEntry>,
        dimension: usize,
        model_id: &str,
        source_count: usize,
    ) -> Result<Self> {
        let mut set = Self::empty(dimension, model_id);

        for entry in entries {
            let id = entry.internship.id.clone();
            if set.id_to_row.contains_key(&id) {
                tracing::warn!("Skipping duplicate internship id {id}");
                continue;
            }

            let mut skill_vector = entry.skill_vector;
            l2_normalize(&mut skill_vector);
            let mut location_vector = entry.location_vector;
            l2_normalize(&mut location_vector);

            set.skill.add(&skill_vector)?;
            set.location.add(&location_vector)?;
            set.stipend.add(&[entry.stipend_value])?;
            set.timeline.add(&[entry.timeline_value])?;

            set.id_to_row.insert(id.clone(), set.internship_ids.len());
            set.records.insert(id.clone(), Arc::new(entry.internship));
            set.internship_ids.push(id);
        }

        set.built_at = Some(Utc::now());
        set.internship_count = source_count;
        set.check_consistency()?;
        Ok(set)
    }

    /// Verify every index has one row per id.
    ///
    /// # Errors
    /// Returns [`Error::InvalidIndex`] describing the first mismatch
    pub fn check_consistency(&self) -> Result<()> {
        let rows = self.internship_ids.len();
        for kind in IndexKind::ALL {
            let len = self.index(kind).len();
            if len != rows {
                return Err(Error::InvalidIndex(format!(
                    "{} index has {len} rows but there are {rows} internship ids",
                    kind.name()
                )));
            }
        }
        if self.id_to_row.len() != rows {
            return Err(Error::InvalidIndex(format!(
                "id mapping has {} entries but there are {rows} internship ids",
                self.id_to_row.len()
            )));
        }
        if self.skill.dimension() != self.dimension {
            return Err(Error::InvalidIndex(format!(
                "skill index dimension {} does not match model dimension {}",
                self.skill.dimension(),
                self.dimension
            )));
        }
        Ok(())
    }

    /// The index of `kind`.
    pub fn index(&self, kind: IndexKind) -> &FlatIndex {
        match kind {
            IndexKind::Skill => &self.skill,
            IndexKind::Location => &self.location,
            IndexKind::Stipend => &self.stipend,
            IndexKind::Timeline => &self.timeline,
        }
    }

    /// Number of indexed postings.
    pub fn len(&self) -> usize {
        self.internship_ids.len()
    }

    /// Whether nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.internship_ids.is_empty()
    }

    /// Whether records are attached for the indexed ids.
    pub fn has_records(&self) -> bool {
        !self.records.is_empty()
    }

    /// Record of `id`.
    pub fn record(&self, id: &str) -> Option<&Arc<Internship>> {
        self.records.get(id)
    }

    /// Record indexed at `row`.
    pub fn record_at(&self, row: usize) -> Option<&Arc<Internship>> {
        self.internship_ids
            .get(row)
            .and_then(|id| self.records.get(id))
    }

    /// Prepare a query the same way rows of `kind` were stored.
    fn prepare_query(kind: IndexKind, query: &[f32]) -> Vec<f32> {
        let mut prepared = query.to_vec();
        if kind.is_normalized() {
            l2_normalize(&mut prepared);
        }
        prepared
    }

    /// Top `k` `(score, row)` pairs for `query` on the given index.
    pub fn search(&self, kind: IndexKind, query: &[f32], k: usize) -> Vec<(f32, usize)> {
        let prepared = Self::prepare_query(kind, query);
        self.index(kind).search(&prepared, k)
    }

    /// Score one row directly.
    pub fn score_row(&self, kind: IndexKind, query: &[f32], row: usize) -> Option<f32> {
        let prepared = Self::prepare_query(kind, query);
        self.index(kind).score_row(&prepared, row)
    }

    /// Copy of this snapshot with `records` attached for the ids it indexes.
    ///
    /// Returns the new snapshot and how many indexed ids found a record.
    fn with_records(&self, records: Vec<Internship>) -> (Self, usize) {
        let mut attached = HashMap::with_capacity(self.internship_ids.len());
        for record in records {
            if self.id_to_row.contains_key(&record.id) {
                attached.insert(record.id.clone(), Arc::new(record));
            }
        }
        let found = attached.len();
        let set = Self {
            skill: self.skill.clone(),
            location: self.location.clone(),
            stipend: self.stipend.clone(),
            timeline: self.timeline.clone(),
            internship_ids: self.internship_ids.clone(),
            id_to_row: self.id_to_row.clone(),
            records: attached,
            built_at: self.built_at,
            internship_count: self.internship_count,
            dimension: self.dimension,
            model_id: self.model_id.clone(),
        };
        (set, found)
    }
}

/// Summary of the current snapshot
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    /// Indexed postings
    pub indexed: usize,
    /// Attached records
    pub records: usize,
    /// Store documents at build time
    pub source_count: usize,
    /// Skill embedding dimension
    pub dimension: usize,
    /// Embedding model
    pub model_id: String,
    /// Build time
    pub built_at: Option<DateTime<Utc>>,
}

/// Owns the current [`IndexSet`] and its on-disk copy.
///
/// Readers clone the `Arc` and keep using that snapshot; rebuilds construct a new set
/// off-lock and swap it in. Saves to disk run one at a time.
pub struct InternshipIndexManager {
    current: RwLock<Arc<IndexSet>>,
    cache_dir: PathBuf,
    pool: WorkerPool,
    persist_lock: Mutex<()>,
}

impl InternshipIndexManager {
    /// Manager persisting under `cache_dir` and building on `pool`.
    pub fn new(cache_dir: PathBuf, pool: WorkerPool) -> Self {
        Self {
            current: RwLock::new(Arc::new(IndexSet::default())),
            cache_dir,
            pool,
            persist_lock: Mutex::new(()),
        }
    }

    /// Directory holding the persisted indices.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Current snapshot.
    pub async fn snapshot(&self) -> Arc<IndexSet> {
        Arc::clone(&*self.current.read().await)
    }

    /// Replace the current snapshot.
    pub async fn install(&self, set: IndexSet) -> Arc<IndexSet> {
        let set = Arc::new(set);
        *self.current.write().await = Arc::clone(&set);
        set
    }

    /// Drop the current snapshot.
    pub async fn clear(&self) {
        self.install(IndexSet::default()).await;
    }

    /// Build a new snapshot on the worker pool and install it.
    ///
    /// # Errors
    /// Returns an error if the entries violate index invariants or the pool fails
    pub async fn build_indices(
        &self,
        entries: Vec<IndexEntry>,
        dimension: usize,
        model_id: &str,
        source_count: usize,
    ) -> Result<Arc<IndexSet>> {
        let model_id = model_id.to_owned();
        let set = self
            .pool
            .run(move || IndexSet::build(entries, dimension, &model_id, source_count))
            .await??;

        tracing::info!(
            "Built internship indices: {} rows, dimension {}",
            set.len(),
            set.dimension
        );
        Ok(self.install(set).await)
    }

    /// Attach normalized records to the current snapshot.
    ///
    /// Returns how many indexed ids found a record.
    pub async fn attach_records(&self, records: Vec<Internship>) -> usize {
        let current = self.snapshot().await;
        let (set, found) = current.with_records(records);
        self.install(set).await;
        found
    }

    /// Search one index of the current snapshot on the worker pool.
    ///
    /// # Errors
    /// Returns an error if the pool fails
    pub async fn search(
        &self,
        kind: IndexKind,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(f32, usize)>> {
        let set = self.snapshot().await;
        let query = query.to_vec();
        self.pool.run(move || set.search(kind, &query, k)).await
    }

    /// Persist `set`, typically the snapshot [`Self::build_indices`] just returned.
    ///
    /// Concurrent saves are serialized so the index files and the metadata on disk
    /// always come from the same snapshot.
    ///
    /// # Errors
    /// Returns [`Error::Persistence`] if encoding or writing fails
    pub async fn save_to_disk(&self, set: &Arc<IndexSet>) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        persistence::save(&self.cache_dir, Arc::clone(set)).await
    }

    /// Load a persisted snapshot (without records) and install it.
    ///
    /// Returns `Ok(false)` when no usable cache exists, including a dimension or model
    /// mismatch.
    ///
    /// # Errors
    /// Returns an error if the cached files exist but are corrupt or inconsistent
    pub async fn load_from_disk(&self, dimension: usize, model_id: &str) -> Result<bool> {
        match persistence::load(&self.cache_dir, dimension, model_id).await? {
            Some(set) => {
                tracing::info!(
                    "Loaded {} internship index rows from {}",
                    set.len(),
                    self.cache_dir.display()
                );
                self.install(set).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Summary of the current snapshot.
    pub async fn stats(&self) -> IndexStats {
        let set = self.snapshot().await;
        IndexStats {
            indexed: set.len(),
            records: set.records.len(),
            source_count: set.internship_count,
            dimension: set.dimension,
            model_id: set.model_id.clone(),
            built_at: set.built_at,
        }
    }
}

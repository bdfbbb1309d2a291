//! On-disk copy of the index snapshot.
//!
//! Layout under the cache directory:
//! `indices/{skill,location,stipend,timeline}.bin` (bincode) and
//! `indices/metadata.json`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bincode::config::standard as bincode_config;
use bincode::{Decode, Encode, decode_from_slice, encode_to_vec};
use chrono::{DateTime, Utc};
use internmatch_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tokio::fs as async_fs;
use tokio::task::spawn_blocking;
use tracing::{info, warn};

use super::{FlatIndex, IndexKind, IndexSet};

/// Bumped whenever the stored layout changes.
const FORMAT_VERSION: u32 = 1;

const INDEX_DIR: &str = "indices";
const METADATA_FILE: &str = "metadata.json";

/// Distinguishes temp files of writes in flight.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Encode, Decode)]
struct StoredIndex {
    version: u32,
    index: FlatIndex,
}

/// JSON sidecar describing the persisted indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Layout version
    pub version: u32,
    /// Id of each row
    pub internship_ids: Vec<String>,
    /// Row of each id
    pub id_to_row: HashMap<String, usize>,
    /// When the snapshot was built
    pub built_at: Option<DateTime<Utc>>,
    /// Store documents at build time
    pub internship_count: usize,
    /// Skill embedding dimension
    pub dimension: usize,
    /// Embedding model
    pub model_id: String,
    /// When the files were written
    pub saved_at: DateTime<Utc>,
}

fn index_dir(cache_dir: &Path) -> PathBuf {
    cache_dir.join(INDEX_DIR)
}

fn index_path(cache_dir: &Path, kind: IndexKind) -> PathBuf {
    index_dir(cache_dir).join(format!("{}.bin", kind.name()))
}

fn metadata_path(cache_dir: &Path) -> PathBuf {
    index_dir(cache_dir).join(METADATA_FILE)
}

/// Sibling of `path` no other write in this or another process uses.
fn temp_path(path: &Path) -> PathBuf {
    let sequence = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_extension(format!("{}.{sequence}.tmp", process::id()))
}

/// Write `bytes` to a unique sibling temp file, then rename over `path`.
async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<()> {
    let tmp_path = temp_path(path);
    if let Err(error) = async_fs::write(&tmp_path, bytes).await {
        if let Err(cleanup) = async_fs::remove_file(&tmp_path).await {
            warn!("Could not remove {}: {cleanup}", tmp_path.display());
        }
        return Err(Error::Persistence(format!(
            "Failed to write {}: {error}",
            tmp_path.display()
        )));
    }
    async_fs::rename(&tmp_path, path).await.map_err(|error| {
        Error::Persistence(format!("Failed to move cache into {}: {error}", path.display()))
    })
}

/// Persist every index and the metadata sidecar.
pub(super) async fn save(cache_dir: &Path, set: Arc<IndexSet>) -> Result<()> {
    let dir = index_dir(cache_dir);
    async_fs::create_dir_all(&dir).await.map_err(|error| {
        Error::Persistence(format!("Failed to create cache directory: {error}"))
    })?;

    let encode_set = Arc::clone(&set);
    let encoded = spawn_blocking(move || {
        IndexKind::ALL
            .into_iter()
            .map(|kind| {
                let stored = StoredIndex {
                    version: FORMAT_VERSION,
                    index: encode_set.index(kind).clone(),
                };
                encode_to_vec(&stored, bincode_config())
                    .map(|bytes| (kind, bytes))
                    .map_err(|error| {
                        Error::Persistence(format!(
                            "Failed to serialize {} index: {error}",
                            kind.name()
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()
    })
    .await
    .map_err(|error| Error::Persistence(format!("Task join error: {error}")))??;

    let mut total_bytes = 0;
    for (kind, bytes) in encoded {
        total_bytes += bytes.len();
        write_atomic(&index_path(cache_dir, kind), bytes).await?;
    }

    let metadata = IndexMetadata {
        version: FORMAT_VERSION,
        internship_ids: set.internship_ids.clone(),
        id_to_row: set.id_to_row.clone(),
        built_at: set.built_at,
        internship_count: set.internship_count,
        dimension: set.dimension,
        model_id: set.model_id.clone(),
        saved_at: Utc::now(),
    };
    let json = serde_json::to_vec_pretty(&metadata)?;
    write_atomic(&metadata_path(cache_dir), json).await?;

    info!(
        "Saved {} internship index rows to {} ({total_bytes} bytes)",
        set.len(),
        dir.display()
    );
    Ok(())
}

async fn read_metadata(cache_dir: &Path) -> Result<IndexMetadata> {
    let path = metadata_path(cache_dir);
    let bytes = async_fs::read(&path).await.map_err(|error| {
        Error::Persistence(format!("Failed to read {}: {error}", path.display()))
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|error| Error::Persistence(format!("Corrupt index metadata: {error}")))
}

async fn read_index(cache_dir: &Path, kind: IndexKind) -> Result<FlatIndex> {
    let path = index_path(cache_dir, kind);
    let data = async_fs::read(&path).await.map_err(|error| {
        Error::Persistence(format!("Failed to read {}: {error}", path.display()))
    })?;

    let stored: StoredIndex = spawn_blocking(move || {
        decode_from_slice(&data, bincode_config())
            .map(|(stored, _)| stored)
            .map_err(|error| {
                Error::Persistence(format!(
                    "Failed to deserialize {} index: {error}",
                    kind.name()
                ))
            })
    })
    .await
    .map_err(|error| Error::Persistence(format!("Task join error: {error}")))??;

    if stored.version != FORMAT_VERSION {
        return Err(Error::Persistence(format!(
            "{} index has format version {}, expected {FORMAT_VERSION}",
            kind.name(),
            stored.version
        )));
    }
    Ok(stored.index)
}

/// Load a persisted snapshot without records.
///
/// `Ok(None)` means no usable cache: files missing, an older format, or a different
/// model or dimension.
pub(super) async fn load(
    cache_dir: &Path,
    dimension: usize,
    model_id: &str,
) -> Result<Option<IndexSet>> {
    let all_present = metadata_path(cache_dir).exists()
        && IndexKind::ALL
            .into_iter()
            .all(|kind| index_path(cache_dir, kind).exists());
    if !all_present {
        info!("No persisted indices in {}", cache_dir.display());
        return Ok(None);
    }

    let metadata = read_metadata(cache_dir).await?;
    if metadata.version != FORMAT_VERSION {
        warn!(
            "Ignoring persisted indices with format version {} (expected {FORMAT_VERSION})",
            metadata.version
        );
        return Ok(None);
    }
    if metadata.dimension != dimension || metadata.model_id != model_id {
        warn!(
            "Ignoring persisted indices built for {} ({} dims); current model is {model_id} ({dimension} dims)",
            metadata.model_id, metadata.dimension
        );
        return Ok(None);
    }

    for (row, id) in metadata.internship_ids.iter().enumerate() {
        if metadata.id_to_row.get(id) != Some(&row) {
            return Err(Error::InvalidIndex(format!(
                "id mapping disagrees with id list at row {row} ({id})"
            )));
        }
    }

    let set = IndexSet {
        skill: read_index(cache_dir, IndexKind::Skill).await?,
        location: read_index(cache_dir, IndexKind::Location).await?,
        stipend: read_index(cache_dir, IndexKind::Stipend).await?,
        timeline: read_index(cache_dir, IndexKind::Timeline).await?,
        internship_ids: metadata.internship_ids,
        id_to_row: metadata.id_to_row,
        records: HashMap::new(),
        built_at: metadata.built_at,
        internship_count: metadata.internship_count,
        dimension: metadata.dimension,
        model_id: metadata.model_id,
    };
    set.check_consistency()?;
    Ok(Some(set))
}

//! Sources of raw internship documents.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use internmatch_core::{Error, Result};
use serde_json::Value;
use tokio::fs as async_fs;

/// Read access to the internship collection.
///
/// Documents are returned raw; field-name variants are resolved during ingestion.
#[async_trait]
pub trait InternshipStore: Send + Sync {
    /// Number of documents currently in the collection.
    ///
    /// # Errors
    /// Returns [`Error::DataSource`] if the collection cannot be read
    async fn count_documents(&self) -> Result<usize>;

    /// Every document in the collection.
    ///
    /// # Errors
    /// Returns [`Error::DataSource`] if the collection cannot be read
    async fn find_all(&self) -> Result<Vec<Value>>;
}

/// In-process store backed by a vector of documents.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<Vec<Value>>,
}

impl MemoryStore {
    /// Store holding `documents`.
    pub fn new(documents: Vec<Value>) -> Self {
        Self {
            documents: RwLock::new(documents),
        }
    }

    /// Append one document.
    pub fn insert(&self, document: Value) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(document);
    }

    /// Replace the whole collection.
    pub fn replace(&self, documents: Vec<Value>) {
        *self.documents.write().unwrap_or_else(PoisonError::into_inner) = documents;
    }

    /// Remove every document.
    pub fn clear(&self) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl InternshipStore for MemoryStore {
    async fn count_documents(&self) -> Result<usize> {
        Ok(self
            .documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len())
    }

    async fn find_all(&self) -> Result<Vec<Value>> {
        Ok(self
            .documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// Store reading a JSON array of documents from a file on every call.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store reading the array at `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// File backing the store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_documents(&self) -> Result<Vec<Value>> {
        let contents = async_fs::read(&self.path).await.map_err(|error| {
            Error::DataSource(format!("Failed to read {}: {error}", self.path.display()))
        })?;
        let parsed: Value = serde_json::from_slice(&contents).map_err(|error| {
            Error::DataSource(format!("Invalid JSON in {}: {error}", self.path.display()))
        })?;
        match parsed {
            Value::Array(documents) => Ok(documents),
            other => Err(Error::DataSource(format!(
                "{} must hold a JSON array of internships, found {}",
                self.path.display(),
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl InternshipStore for JsonFileStore {
    async fn count_documents(&self) -> Result<usize> {
        self.read_documents().await.map(|documents| documents.len())
    }

    async fn find_all(&self) -> Result<Vec<Value>> {
        self.read_documents().await
    }
}

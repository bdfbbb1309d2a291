//! Brute-force vector index.

use std::cmp::Ordering;

use bincode::{Decode, Encode};
use internmatch_core::{Error, Result};

/// Exhaustive inner-product index over fixed-length rows.
#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct FlatIndex {
    dimension: usize,
    /// Row-major vectors, `len() * dimension` values
    data: Vec<f32>,
}

impl FlatIndex {
    /// Empty index of rows with `dimension` values.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Values per row.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    /// Whether no row was added.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append one row.
    ///
    /// # Errors
    /// Returns [`Error::InvalidIndex`] if the vector has the wrong length
    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension || self.dimension == 0 {
            return Err(Error::InvalidIndex(format!(
                "Cannot add vector of length {} to index of dimension {}",
                vector.len(),
                self.dimension
            )));
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// Stored values of `row`.
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        let start = row.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Inner product of `query` with one stored row.
    pub fn score_row(&self, query: &[f32], row: usize) -> Option<f32> {
        if query.len() != self.dimension {
            return None;
        }
        self.row(row).map(|stored| dot(stored, query))
    }

    /// Top `k` rows by inner product, best first. Ties keep the lower row first.
    ///
    /// `k` is capped at the index size; an empty index or a mismatched query yields no
    /// results.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(f32, usize)> {
        if self.is_empty() || query.len() != self.dimension || k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(f32, usize)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(row, stored)| (dot(stored, query), row))
            .collect();

        let k = k.min(scored.len());
        let by_score = |first: &(f32, usize), second: &(f32, usize)| {
            second
                .0
                .partial_cmp(&first.0)
                .unwrap_or(Ordering::Equal)
                .then(first.1.cmp(&second.1))
        };
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_score);
            scored.truncate(k);
        }
        scored.sort_by(by_score);
        scored
    }
}

fn dot(left: &[f32], right: &[f32]) -> f32 {
    left.iter().zip(right).map(|(lhs, rhs)| lhs * rhs).sum()
}

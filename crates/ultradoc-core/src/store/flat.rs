//! Exhaustive in-memory [`VectorIndex`].
//!
//! Entries live in a `Vec` behind a `parking_lot::RwLock`; their position
//! in that `Vec` is their identity. Search scans every entry, so results
//! are exact. Searches share the read lock; `add` takes the write lock, and
//! `save` runs under a separate persistence mutex so two saves of the same
//! index never interleave their file writes.

use std::path::Path;

use parking_lot::{Mutex, RwLock};

use crate::error::{CoreError, Result};
use crate::models::{Chunk, SearchResult};

use super::{snapshot, VectorIndex};

pub(crate) struct Entry {
    pub(crate) vector: Vec<f32>,
    pub(crate) chunk: Chunk,
}

/// Flat index with exact squared-L2 search.
pub struct FlatIndex {
    dims: usize,
    entries: RwLock<Vec<Entry>>,
    persist: Mutex<()>,
}

impl FlatIndex {
    pub fn new(dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(CoreError::InvalidDimension(dims));
        }
        Ok(Self {
            dims,
            entries: RwLock::new(Vec::new()),
            persist: Mutex::new(()),
        })
    }

    /// Persist the index into `dir` (format in [`snapshot`]).
    pub fn save(&self, dir: &Path) -> Result<()> {
        let _persist = self.persist.lock();
        snapshot::save(self, dir)
    }

    /// Restore an index from `dir`, or `None` when nothing was persisted.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        snapshot::load(dir)
    }

    /// Run `f` over the entries while holding the read lock.
    pub(crate) fn with_entries<R>(&self, f: impl FnOnce(&[Entry]) -> R) -> R {
        let guard = self.entries.read();
        f(&guard)
    }

    fn check_dims(&self, actual: usize) -> Result<()> {
        if actual != self.dims {
            return Err(CoreError::DimensionMismatch {
                expected: self.dims,
                actual,
            });
        }
        Ok(())
    }
}

impl VectorIndex for FlatIndex {
    fn dims(&self) -> usize {
        self.dims
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn add(&self, vectors: &[Vec<f32>], chunks: &[Chunk]) -> Result<()> {
        if vectors.len() != chunks.len() {
            return Err(CoreError::LengthMismatch {
                vectors: vectors.len(),
                chunks: chunks.len(),
            });
        }
        for v in vectors {
            self.check_dims(v.len())?;
        }

        let mut entries = self.entries.write();
        entries.reserve(vectors.len());
        for (v, c) in vectors.iter().zip(chunks.iter()) {
            entries.push(Entry {
                vector: v.clone(),
                chunk: c.clone(),
            });
        }
        Ok(())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        self.check_dims(query.len())?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let entries = self.entries.read();
        let mut scored: Vec<(f32, usize)> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (crate::embedding::squared_l2(query, &e.vector), i))
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(distance, i)| SearchResult {
                chunk: entries[i].chunk.clone(),
                distance,
            })
            .collect())
    }
}

//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait fixes the external contract every index
//! must honor, whatever its internal structure:
//!
//! | Method | Contract |
//! |--------|----------|
//! | [`add`](VectorIndex::add) | Append parallel vectors and chunks; reject length or dimension mismatches without partial writes |
//! | [`search`](VectorIndex::search) | Exact nearest neighbors by squared Euclidean distance, ascending, ties broken by insertion order |
//!
//! [`FlatIndex`] is the exhaustive implementation; [`snapshot`] persists
//! it to a directory.

pub mod flat;
pub mod snapshot;

pub use flat::FlatIndex;

use crate::error::Result;
use crate::models::{Chunk, SearchResult};

/// Append-only nearest-neighbor index over embedded chunks.
///
/// Implementations must be `Send + Sync`; reads may run concurrently,
/// writes exclude every other access to the same instance.
pub trait VectorIndex: Send + Sync {
    /// Dimensionality every stored and query vector must have.
    fn dims(&self) -> usize;

    /// Number of stored entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `vectors[i]` paired with `chunks[i]`, in order.
    fn add(&self, vectors: &[Vec<f32>], chunks: &[Chunk]) -> Result<()>;

    /// Up to `top_k` closest entries to `query`.
    ///
    /// An empty index yields an empty result, not an error.
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;
}

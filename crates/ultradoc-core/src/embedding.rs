//! Embedder trait, the reference hash embedder, and vector utilities.
//!
//! The same [`Embedder`] must be used for corpus chunks and for queries;
//! vectors from different embedders are not comparable.

use crate::error::{CoreError, Result};

/// Default dimensionality of [`HashEmbedder`] vectors.
pub const DEFAULT_DIMS: usize = 128;

/// Trait for embedding backends.
///
/// Implementations must be deterministic: the same text always maps to
/// the same vector.
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"char-hash"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality.
    fn dims(&self) -> usize;
    /// Embed a single text.
    fn embed(&self, text: &str) -> Vec<f32>;

    /// Embed a batch of texts, in input order.
    fn embed_batch(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Character-hashing embedder with no learned parameters.
///
/// Each character of the lower-cased text increments the slot at
/// `code_point % dims`; the result is scaled to unit length unless every
/// slot is zero. Collisions are expected; the vector is a shallow
/// signature, not a semantic representation.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(CoreError::InvalidDimension(dims));
        }
        Ok(Self { dims })
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dims: DEFAULT_DIMS }
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "char-hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut counts = vec![0f64; self.dims];
        for ch in text.to_lowercase().chars() {
            counts[(ch as usize) % self.dims] += 1.0;
        }
        let norm = counts.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            counts.iter().map(|x| (x / norm) as f32).collect()
        } else {
            counts.iter().map(|&x| x as f32).collect()
        }
    }
}

/// Encode a float vector as little-endian f32 bytes.
///
/// ```rust
/// use ultradoc_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes back into a float vector.
///
/// Trailing bytes that do not form a whole `f32` are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Squared Euclidean distance. Callers ensure equal lengths.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l2_norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_deterministic() {
        let e = HashEmbedder::default();
        let a = e.embed("Rate: $2500 USD");
        let b = e.embed("Rate: $2500 USD");
        let bits_a: Vec<u32> = a.iter().map(|x| x.to_bits()).collect();
        let bits_b: Vec<u32> = b.iter().map(|x| x.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
    }

    #[test]
    fn test_unit_norm() {
        let e = HashEmbedder::default();
        for text in ["a", "Shipment ID: LD12345", "ünïcödé text", "  spaced  "] {
            let v = e.embed(text);
            assert_eq!(v.len(), DEFAULT_DIMS);
            assert!((l2_norm(&v) - 1.0).abs() < 1e-5, "norm for {:?}", text);
        }
    }

    #[test]
    fn test_case_insensitive() {
        let e = HashEmbedder::default();
        assert_eq!(e.embed("ABC"), e.embed("abc"));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let e = HashEmbedder::new(16).unwrap();
        let v = e.embed("");
        assert_eq!(v, vec![0.0; 16]);
    }

    #[test]
    fn test_bucket_is_code_point_mod_dims() {
        let e = HashEmbedder::new(4).unwrap();
        // 'a' = 97 -> slot 1, 'b' = 98 -> slot 2
        let v = e.embed("aab");
        let n = (5.0f64).sqrt();
        assert!((v[1] as f64 - 2.0 / n).abs() < 1e-6);
        assert!((v[2] as f64 - 1.0 / n).abs() < 1e-6);
        assert_eq!(v[0], 0.0);
        assert_eq!(v[3], 0.0);
    }

    #[test]
    fn test_zero_dims_rejected() {
        assert!(matches!(
            HashEmbedder::new(0),
            Err(CoreError::InvalidDimension(0))
        ));
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_squared_l2() {
        assert_eq!(squared_l2(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
        assert!((squared_l2(&[1.0, 0.0], &[0.0, 1.0]) - 2.0).abs() < 1e-6);
    }
}

//! Directory snapshots of a [`FlatIndex`].
//!
//! A snapshot is a pair of files:
//!
//! - `index.bin`: magic `UDIX`, `u32` dimension, `u64` entry count, then
//!   every vector as little-endian f32 (see [`vec_to_blob`]).
//! - `chunks.json`: the chunks in insertion order plus the SHA-256 of
//!   `index.bin`, which ties the two files together.
//!
//! Each file is written under a temporary name unique to the writer and
//! renamed into place, `chunks.json` last. A missing file or a digest that does not match
//! means the pair is incomplete, which loads as "no snapshot".

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::{CoreError, Result};
use crate::models::Chunk;

use super::{FlatIndex, VectorIndex};

pub const INDEX_FILE: &str = "index.bin";
pub const CHUNKS_FILE: &str = "chunks.json";

const MAGIC: &[u8; 4] = b"UDIX";
const HEADER_LEN: usize = 16;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Serialize, Deserialize)]
struct ChunkManifest {
    index_sha256: String,
    chunks: Vec<Chunk>,
}

/// Write `index` into `dir`, creating the directory if needed.
///
/// Callers go through [`FlatIndex::save`], which holds the index's
/// persistence lock for the whole call.
pub(crate) fn save(index: &FlatIndex, dir: &Path) -> Result<()> {
    let (bytes, chunks) = index.with_entries(|entries| {
        let mut bytes = Vec::with_capacity(HEADER_LEN + entries.len() * index.dims() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&(index.dims() as u32).to_le_bytes());
        bytes.extend_from_slice(&(entries.len() as u64).to_le_bytes());
        for e in entries {
            bytes.extend_from_slice(&vec_to_blob(&e.vector));
        }
        let chunks: Vec<Chunk> = entries.iter().map(|e| e.chunk.clone()).collect();
        (bytes, chunks)
    });

    let manifest = ChunkManifest {
        index_sha256: digest(&bytes),
        chunks,
    };

    fs::create_dir_all(dir)?;
    write_then_rename(&dir.join(INDEX_FILE), &bytes)?;
    write_then_rename(&dir.join(CHUNKS_FILE), &serde_json::to_vec(&manifest)?)?;

    tracing::debug!(
        dir = %dir.display(),
        entries = manifest.chunks.len(),
        "saved index snapshot"
    );
    Ok(())
}

/// Read a snapshot from `dir`.
///
/// Returns `Ok(None)` when either file is missing or the pair is torn;
/// I/O failures and malformed content are errors.
pub fn load(dir: &Path) -> Result<Option<FlatIndex>> {
    let index_path = dir.join(INDEX_FILE);
    let chunks_path = dir.join(CHUNKS_FILE);
    if !index_path.is_file() || !chunks_path.is_file() {
        return Ok(None);
    }

    let bytes = fs::read(&index_path)?;
    let manifest: ChunkManifest = serde_json::from_slice(&fs::read(&chunks_path)?)?;

    if digest(&bytes) != manifest.index_sha256 {
        tracing::warn!(
            dir = %dir.display(),
            "index snapshot files do not belong together; ignoring snapshot"
        );
        return Ok(None);
    }

    let (dims, vectors) = decode_index(&bytes)?;
    if vectors.len() != manifest.chunks.len() {
        return Err(CoreError::Snapshot(format!(
            "{} vectors but {} chunks",
            vectors.len(),
            manifest.chunks.len()
        )));
    }

    let index = FlatIndex::new(dims)?;
    index.add(&vectors, &manifest.chunks)?;
    Ok(Some(index))
}

fn decode_index(bytes: &[u8]) -> Result<(usize, Vec<Vec<f32>>)> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return Err(CoreError::Snapshot("bad index header".to_string()));
    }
    let dims = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&bytes[8..HEADER_LEN]);
    let count = u64::from_le_bytes(count_bytes) as usize;

    if dims == 0 {
        return Err(CoreError::InvalidDimension(0));
    }
    let body = &bytes[HEADER_LEN..];
    let expected = count
        .checked_mul(dims)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| CoreError::Snapshot("index size overflow".to_string()))?;
    if body.len() != expected {
        return Err(CoreError::Snapshot(format!(
            "index body is {} bytes, expected {}",
            body.len(),
            expected
        )));
    }

    let vectors = body.chunks_exact(dims * 4).map(blob_to_vec).collect();
    Ok((dims, vectors))
}

fn write_then_rename(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// `index.bin` -> `index.bin.<pid>.<seq>.tmp`, distinct per process and call.
fn tmp_path(path: &Path) -> PathBuf {
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.{}.tmp", std::process::id(), seq));
    path.with_file_name(name)
}

fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{Embedder, HashEmbedder};
    use tempfile::TempDir;

    fn sample_index() -> (FlatIndex, HashEmbedder) {
        let e = HashEmbedder::default();
        let texts = ["Shipper: Acme Corp", "Consignee: Beta LLC", "Rate: $2500 USD"];
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk {
                text: t.to_string(),
                page: i as u32 + 1,
            })
            .collect();
        let index = FlatIndex::new(e.dims()).unwrap();
        index.add(&e.embed_batch(&texts), &chunks).unwrap();
        (index, e)
    }

    #[test]
    fn test_load_missing_dir_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load(&tmp.path().join("nothing")).unwrap().is_none());
    }

    #[test]
    fn test_save_load_preserves_search() {
        let tmp = TempDir::new().unwrap();
        let (index, e) = sample_index();
        index.save(tmp.path()).unwrap();

        let restored = FlatIndex::load(tmp.path()).unwrap().unwrap();
        assert_eq!(restored.dims(), index.dims());
        assert_eq!(restored.len(), index.len());
        for q in ["acme", "rate usd", "who is the consignee", ""] {
            let v = e.embed(q);
            assert_eq!(index.search(&v, 5).unwrap(), restored.search(&v, 5).unwrap());
        }
    }

    #[test]
    fn test_one_file_without_the_other_is_none() {
        let tmp = TempDir::new().unwrap();
        let (index, _) = sample_index();
        index.save(tmp.path()).unwrap();
        fs::remove_file(tmp.path().join(CHUNKS_FILE)).unwrap();
        assert!(load(tmp.path()).unwrap().is_none());

        index.save(tmp.path()).unwrap();
        fs::remove_file(tmp.path().join(INDEX_FILE)).unwrap();
        assert!(load(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn test_torn_pair_is_none() {
        let tmp_a = TempDir::new().unwrap();
        let tmp_b = TempDir::new().unwrap();
        let (index, e) = sample_index();
        index.save(tmp_a.path()).unwrap();

        let other = FlatIndex::new(e.dims()).unwrap();
        other
            .add(
                &[e.embed("different")],
                &[Chunk {
                    text: "different".to_string(),
                    page: 9,
                }],
            )
            .unwrap();
        other.save(tmp_b.path()).unwrap();

        fs::copy(tmp_b.path().join(INDEX_FILE), tmp_a.path().join(INDEX_FILE)).unwrap();
        assert!(load(tmp_a.path()).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_index_is_error() {
        let tmp = TempDir::new().unwrap();
        let garbage = b"not an index".to_vec();
        fs::write(tmp.path().join(INDEX_FILE), &garbage).unwrap();
        let manifest = ChunkManifest {
            index_sha256: digest(&garbage),
            chunks: Vec::new(),
        };
        fs::write(
            tmp.path().join(CHUNKS_FILE),
            serde_json::to_vec(&manifest).unwrap(),
        )
        .unwrap();
        assert!(matches!(load(tmp.path()), Err(CoreError::Snapshot(_))));
    }

    #[test]
    fn test_concurrent_saves_and_searches() {
        let tmp = TempDir::new().unwrap();
        let e = HashEmbedder::default();
        let texts: Vec<String> = (0..2000).map(|i| format!("Load {} to Dallas TX", i)).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let chunks: Vec<Chunk> = texts
            .iter()
            .map(|t| Chunk {
                text: t.clone(),
                page: 1,
            })
            .collect();
        let index = FlatIndex::new(e.dims()).unwrap();
        index.add(&e.embed_batch(&refs), &chunks).unwrap();
        let query = e.embed("Load 7 to Dallas TX");
        let expected = index.search(&query, 3).unwrap();

        let second = FlatIndex::new(e.dims()).unwrap();
        second.add(&e.embed_batch(&refs), &chunks).unwrap();

        std::thread::scope(|s| {
            let mut handles = Vec::new();
            for t in 0..8 {
                let target = if t % 2 == 0 { &index } else { &second };
                let dir = tmp.path();
                handles.push(s.spawn(move || {
                    (0..20).filter(|_| target.save(dir).is_err()).count()
                }));
            }
            for _ in 0..4 {
                let (index, query, expected) = (&index, &query, &expected);
                handles.push(s.spawn(move || {
                    (0..20)
                        .filter(|_| index.search(query, 3).unwrap() != *expected)
                        .count()
                }));
            }
            let failures: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
            assert_eq!(failures, 0);
        });

        let restored = load(tmp.path()).unwrap().unwrap();
        assert_eq!(restored.len(), 2000);
        assert_eq!(restored.search(&query, 3).unwrap(), expected);
        let leftovers = fs::read_dir(tmp.path())
            .unwrap()
            .filter(|entry| {
                entry
                    .as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".tmp")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_empty_index_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let index = FlatIndex::new(8).unwrap();
        index.save(tmp.path()).unwrap();
        let restored = load(tmp.path()).unwrap().unwrap();
        assert_eq!(restored.dims(), 8);
        assert!(restored.is_empty());
    }
}

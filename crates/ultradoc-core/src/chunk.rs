//! Fixed-window text chunker.
//!
//! Splits each [`Page`] into overlapping [`Chunk`]s of at most
//! `chunk_size` characters, each tagged with its source page.
//!
//! # Algorithm
//!
//! 1. Pages are processed independently, in input order.
//! 2. A window of `chunk_size` characters starts at offset 0.
//! 3. The window's substring is emitted when it is not blank after
//!    trimming. The emitted text itself is left untrimmed, so it is
//!    always a contiguous substring of the page.
//! 4. Once a window reaches the end of the page, chunking of that page
//!    stops; otherwise the start advances by `chunk_size - overlap`.
//!
//! Offsets count Unicode scalar values, not bytes.
//!
//! # Example
//!
//! ```rust
//! use ultradoc_core::chunk::{chunk_pages, ChunkParams};
//! use ultradoc_core::models::Page;
//!
//! let params = ChunkParams::new(10, 2).unwrap();
//! let chunks = chunk_pages(&[Page::new(1, "abcdefghijklmnop")], params);
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[1].text, "ijklmnop");
//! ```

use crate::error::{CoreError, Result};
use crate::models::{Chunk, Page};

/// Window size and overlap, validated so the window always advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkParams {
    /// Requires `chunk_size > 0` and `overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(CoreError::InvalidChunking {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Distance between consecutive window starts (always >= 1).
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 100,
        }
    }
}

/// Iterator over `(start, end)` character offsets of each window.
#[derive(Debug, Clone)]
pub struct Windows {
    len: usize,
    params: ChunkParams,
    next_start: Option<usize>,
}

impl Windows {
    pub fn new(len: usize, params: ChunkParams) -> Self {
        Self {
            len,
            params,
            next_start: if len == 0 { None } else { Some(0) },
        }
    }
}

impl Iterator for Windows {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start?;
        let end = (start + self.params.chunk_size).min(self.len);
        self.next_start = if end >= self.len {
            None
        } else {
            Some(start + self.params.step())
        };
        Some((start, end))
    }
}

/// Chunk every page in order.
pub fn chunk_pages(pages: &[Page], params: ChunkParams) -> Vec<Chunk> {
    pages
        .iter()
        .flat_map(|page| chunk_page(page, params))
        .collect()
}

/// Chunk a single page. Blank pages yield nothing.
pub fn chunk_page(page: &Page, params: ChunkParams) -> Vec<Chunk> {
    let text = page.text.as_str();
    // Byte offset of every char, plus the end of the string.
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let char_len = bounds.len();
    bounds.push(text.len());

    Windows::new(char_len, params)
        .filter_map(|(start, end)| {
            let piece = &text[bounds[start]..bounds[end]];
            if piece.trim().is_empty() {
                None
            } else {
                Some(Chunk {
                    text: piece.to_string(),
                    page: page.page_number,
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(size: usize, overlap: usize) -> ChunkParams {
        ChunkParams::new(size, overlap).unwrap()
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        assert!(matches!(
            ChunkParams::new(10, 10),
            Err(CoreError::InvalidChunking { .. })
        ));
        assert!(ChunkParams::new(10, 11).is_err());
        assert!(ChunkParams::new(0, 0).is_err());
        assert!(ChunkParams::new(10, 9).is_ok());
    }

    #[test]
    fn test_exact_size_page_single_chunk() {
        let text = "x".repeat(500);
        let chunks = chunk_page(&Page::new(1, text.clone()), ChunkParams::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn test_empty_and_blank_pages_yield_nothing() {
        let p = params(5, 1);
        assert!(chunk_page(&Page::new(1, ""), p).is_empty());
        assert!(chunk_page(&Page::new(2, "   \n\t   \n "), p).is_empty());
    }

    #[test]
    fn test_overlap_windows() {
        let chunks = chunk_page(&Page::new(3, "0123456789abcdef"), params(6, 2));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["012345", "456789", "89abcd", "cdef"]);
        assert!(chunks.iter().all(|c| c.page == 3));
    }

    #[test]
    fn test_window_starts_strictly_increase_and_terminate() {
        for size in 1..12 {
            for overlap in 0..size {
                let p = params(size, overlap);
                for len in 0..40 {
                    let windows: Vec<(usize, usize)> = Windows::new(len, p).collect();
                    for pair in windows.windows(2) {
                        assert!(pair[1].0 > pair[0].0);
                    }
                    if len > 0 {
                        let expected = if len <= size {
                            1
                        } else {
                            (len - overlap).div_ceil(size - overlap)
                        };
                        assert_eq!(windows.len(), expected, "len={len} size={size} overlap={overlap}");
                        assert_eq!(windows.last().unwrap().1, len);
                    } else {
                        assert!(windows.is_empty());
                    }
                }
            }
        }
    }

    #[test]
    fn test_chunks_are_substrings_of_page() {
        let text = "Shipper: Acme Corp\n\nConsignee: Beta LLC\n\nRate: $2500 USD";
        let page = Page::new(1, text);
        for c in chunk_page(&page, params(12, 4)) {
            assert!(text.contains(&c.text));
        }
    }

    #[test]
    fn test_blank_window_skipped_but_others_kept() {
        let text = format!("abc{}def", " ".repeat(10));
        let chunks = chunk_page(&Page::new(1, text), params(4, 0));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abc ", " def"]);
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────┐│héllo│└──────┘";
        let chunks = chunk_page(&Page::new(1, text), params(3, 1));
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.text.chars().count() <= 3);
        }
    }

    #[test]
    fn test_pages_processed_in_order() {
        let pages = vec![Page::new(1, "first page"), Page::new(2, "second page")];
        let chunks = chunk_pages(&pages, params(100, 10));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[1].page, 2);
    }
}

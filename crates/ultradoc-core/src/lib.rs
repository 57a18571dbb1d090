//! # ultradoc core
//!
//! The retrieval-and-gating core of ultradoc: data models, the
//! fixed-window chunker, the deterministic hash embedder, an exact
//! nearest-neighbor index with snapshot persistence, the distance to
//! confidence calibration, the guardrail chain, and the regex-based
//! structured field extractor.
//!
//! This crate is synchronous and contains no tokio, HTTP, or
//! document-format parsing. The `ultradoc` app crate wires it to files,
//! an optional LLM, and the network.
//!
//! ```text
//! Page ─▶ chunk ─▶ embed ─▶ FlatIndex ◀─ embed ◀─ question
//!                               │
//!                        search results
//!                        ┌──────┴───────┐
//!                        ▼              ▼
//!                   confidence     guardrail chain
//! ```

pub mod chunk;
pub mod confidence;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod guardrail;
pub mod models;
pub mod store;

pub use error::{CoreError, Result};

//! # ultradoc
//!
//! Question answering and structured field extraction over uploaded
//! logistics documents (rate confirmations, bills of lading, load
//! tenders).
//!
//! Documents are split into page-tagged chunks, embedded with a
//! deterministic character-hash embedder, and searched exactly. Every
//! answer passes a guardrail chain before it is returned, so a question
//! the documents do not support gets "Not found in document." instead of
//! a guess. Eleven shipment fields are pulled out with regular
//! expressions and can be refined by an optional LLM.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────────────────────────┐
//! │  udi CLI │──▶│  Service   │──▶│ ultradoc-core                │
//! │  / HTTP  │   │ upload/ask │   │ chunk · embed · FlatIndex    │
//! └──────────┘   │ /extract   │   │ confidence · guardrail       │
//!                └─────┬──────┘   │ extract                      │
//!                      │          └──────────────────────────────┘
//!               parser · llm
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`parser`] | PDF, DOCX, and TXT text extraction by page |
//! | [`llm`] | Optional OpenAI-compatible enhancement |
//! | [`service`] | Upload, ask, and extract over the upload directory |
//! | [`server`] | HTTP API (axum) |

pub mod config;
pub mod llm;
pub mod parser;
pub mod server;
pub mod service;

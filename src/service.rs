//! Document question answering over the upload directory.
//!
//! [`Service`] owns everything a request needs: the chunking and retrieval
//! settings, the embedder, the guardrail chain, the optional
//! [`Enhancer`], the current in-memory index, and the structured cache.
//! Both the HTTP server and the CLI drive it.
//!
//! # Pipeline
//!
//! ```text
//! upload ─▶ parse dir ─▶ chunk ─▶ embed ─▶ FlatIndex ─▶ snapshot
//!                  └──▶ full text ─▶ regex extract ─▶ overlay enhancer ─▶ cache
//!
//! ask ─▶ cache lookup ─┬─ hit ─▶ answer (0.95)
//!                      └─ miss ─▶ index ─▶ search ─▶ guardrails ─▶ answer
//! ```
//!
//! The corpus is always the whole upload directory: every upload rebuilds
//! the index from scratch.
//!
//! Rebuilds, lazy index loads, and cache fills run one at a time under a
//! writer lock, so a slower writer never installs an older corpus over a
//! newer one. File I/O, parsing, and embedding run on the blocking pool.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use ultradoc_core::chunk::{chunk_pages, ChunkParams};
use ultradoc_core::confidence::calculate_confidence;
use ultradoc_core::embedding::{Embedder, HashEmbedder};
use ultradoc_core::extract::extract_structured_fields;
use ultradoc_core::guardrail::{GuardrailChain, GuardrailStage, Verdict};
use ultradoc_core::models::{Chunk, StructuredRecord};
use ultradoc_core::store::{FlatIndex, VectorIndex};

use crate::config::Config;
use crate::llm::{create_enhancer, Enhancer};
use crate::parser::{self, Document, DocumentKind};

pub const NO_DOCUMENTS: &str = "No documents uploaded yet.";
pub const NOT_FOUND: &str = "Not found in document.";
pub const UPLOAD_MESSAGE: &str = "File uploaded and processed successfully";

const STRUCTURED_CONFIDENCE: f64 = 0.95;

/// Result of an upload or ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub message: String,
    pub documents: usize,
    pub chunks: usize,
    pub structured_fields: StructuredRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub answer: String,
    pub confidence: f64,
    pub sources: Vec<Source>,
    /// Guardrail that blocked the answer. Not part of the wire format.
    #[serde(skip)]
    pub rejected_by: Option<GuardrailStage>,
}

impl Answer {
    fn unanswered(message: &str) -> Self {
        Self {
            answer: message.to_string(),
            confidence: 0.0,
            sources: Vec::new(),
            rejected_by: None,
        }
    }

    fn rejected(stage: GuardrailStage) -> Self {
        Self {
            rejected_by: Some(stage),
            ..Self::unanswered(NOT_FOUND)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub page: SourcePage,
    pub text: String,
}

/// A page number, or `"structured"` for answers from the extracted record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SourcePage {
    Number(u32),
    Label(String),
}

/// Snapshot of what `index-info` reports.
#[derive(Debug, Clone, Serialize)]
pub struct IndexInfo {
    pub model: String,
    pub dims: usize,
    pub index_dir: PathBuf,
    pub snapshot: bool,
    pub entries: usize,
}

#[derive(Debug, Clone)]
pub struct CachedRecord {
    pub record: StructuredRecord,
    pub extracted_at: DateTime<Utc>,
}

/// Single-slot store for the record of the current corpus.
#[derive(Default)]
pub struct StructuredCache {
    slot: RwLock<Option<CachedRecord>>,
}

impl StructuredCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, record: StructuredRecord) {
        *self.slot.write() = Some(CachedRecord {
            record,
            extracted_at: Utc::now(),
        });
    }

    pub fn get(&self) -> Option<CachedRecord> {
        self.slot.read().clone()
    }
}

pub struct Service {
    config: Config,
    params: ChunkParams,
    embedder: HashEmbedder,
    guardrails: GuardrailChain,
    enhancer: Box<dyn Enhancer>,
    index: RwLock<Option<Arc<FlatIndex>>>,
    cache: StructuredCache,
    writer: Mutex<()>,
}

impl Service {
    pub fn new(config: Config, enhancer: Box<dyn Enhancer>) -> Result<Self> {
        config.validate()?;
        let params = config.chunking.params()?;
        let embedder = HashEmbedder::new(config.retrieval.dims)?;
        let guardrails = GuardrailChain::new(config.retrieval.guardrails());
        Ok(Self {
            config,
            params,
            embedder,
            guardrails,
            enhancer,
            index: RwLock::new(None),
            cache: StructuredCache::new(),
            writer: Mutex::new(()),
        })
    }

    /// Build a service with the enhancer named in `[llm]`.
    pub fn from_config(config: Config) -> Result<Self> {
        let enhancer = create_enhancer(&config.llm)?;
        Self::new(config, enhancer)
    }

    pub fn cache(&self) -> &StructuredCache {
        &self.cache
    }

    /// Store `bytes` as `file_name` in the upload directory and rebuild.
    pub async fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<UploadOutcome> {
        let name = stored_name(file_name)?;
        let upload_dir = &self.config.storage.upload_dir;
        tokio::fs::create_dir_all(upload_dir)
            .await
            .with_context(|| format!("Failed to create {}", upload_dir.display()))?;
        let dest = upload_dir.join(&name);
        tokio::fs::write(&dest, bytes)
            .await
            .with_context(|| format!("Failed to write {}", dest.display()))?;
        tracing::info!(file = %name, bytes = bytes.len(), "stored upload");

        let mut outcome = self.rebuild().await?;
        outcome.message = UPLOAD_MESSAGE.to_string();
        Ok(outcome)
    }

    /// Copy local files into the upload directory and rebuild once.
    pub async fn ingest(&self, paths: &[PathBuf]) -> Result<UploadOutcome> {
        let upload_dir = &self.config.storage.upload_dir;
        let names = paths
            .iter()
            .map(|p| stored_name(&p.to_string_lossy()))
            .collect::<Result<Vec<_>>>()?;

        tokio::fs::create_dir_all(upload_dir)
            .await
            .with_context(|| format!("Failed to create {}", upload_dir.display()))?;
        for (path, name) in paths.iter().zip(&names) {
            tokio::fs::copy(path, upload_dir.join(name))
                .await
                .with_context(|| format!("Failed to copy {}", path.display()))?;
        }

        let mut outcome = self.rebuild().await?;
        outcome.message = format!("{} file(s) ingested", paths.len());
        Ok(outcome)
    }

    /// Re-parse the upload directory, replace the index and the cache.
    async fn rebuild(&self) -> Result<UploadOutcome> {
        let _writer = self.writer.lock().await;

        let upload_dir = self.config.storage.upload_dir.clone();
        let index_dir = self.config.storage.index_dir.clone();
        let params = self.params;
        let embedder = self.embedder.clone();
        let (docs, index) = tokio::task::spawn_blocking(move || -> Result<_> {
            let docs = parser::parse_directory(&upload_dir)?;
            let index = build_index(&docs, params, &embedder)?;
            if let Err(e) = index.save(&index_dir) {
                tracing::warn!(dir = %index_dir.display(), error = %e, "failed to save index snapshot");
            }
            Ok((docs, index))
        })
        .await
        .context("index rebuild task panicked")??;
        let chunks = index.len();
        *self.index.write() = Some(Arc::new(index));

        let record = self.extract_from(&parser::full_text(&docs)).await?;
        self.cache.replace(record.clone());

        tracing::info!(
            documents = docs.len(),
            chunks,
            fields = record.filled(),
            "rebuilt index"
        );

        Ok(UploadOutcome {
            message: String::new(),
            documents: docs.len(),
            chunks,
            structured_fields: record,
        })
    }

    /// Regex extraction, overlaid with whatever the enhancer supplies.
    async fn extract_from(&self, text: &str) -> Result<StructuredRecord> {
        if text.trim().is_empty() {
            return Ok(StructuredRecord::empty());
        }
        let mut record = extract_structured_fields(text)?;
        match self.enhancer.extract_fields(text).await {
            Ok(Some(enhanced)) => record.overlay(&enhanced),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "LLM extraction failed, using regex only"),
        }
        Ok(record)
    }

    pub async fn ask(&self, question: &str) -> Result<Answer> {
        if let Some(cached) = self.cache.get() {
            if let Some((field, value)) = cached.record.lookup_answer(question) {
                return Ok(Answer {
                    answer: value.to_string(),
                    confidence: STRUCTURED_CONFIDENCE,
                    sources: vec![Source {
                        page: SourcePage::Label("structured".to_string()),
                        text: format!("Extracted from {}", field.key()),
                    }],
                    rejected_by: None,
                });
            }
        }

        let index = self.current_index().await?;
        if index.is_empty() {
            return Ok(Answer::unanswered(NO_DOCUMENTS));
        }

        let retrieval = &self.config.retrieval;
        let results = index.search(&self.embedder.embed(question), retrieval.top_k)?;
        if let Verdict::Rejected(stage) = self.guardrails.evaluate(question, &results) {
            tracing::info!(
                %stage,
                best_distance = ?results.first().map(|r| r.distance),
                "question not answered"
            );
            return Ok(Answer::rejected(stage));
        }

        let confidence = calculate_confidence(&results, retrieval.max_distance);
        let top: Vec<Chunk> = results
            .iter()
            .take(retrieval.context_chunks)
            .map(|r| r.chunk.clone())
            .collect();

        let enhanced = match self.enhancer.answer(question, &top).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(error = %e, "LLM answer generation failed");
                None
            }
        };
        let answer = enhanced
            .filter(|a| !a.to_lowercase().contains("not found in document"))
            .unwrap_or_else(|| truncate_chars(&results[0].chunk.text, retrieval.answer_chars));

        Ok(Answer {
            answer,
            confidence,
            sources: top
                .iter()
                .map(|c| Source {
                    page: SourcePage::Number(c.page),
                    text: truncate_chars(&c.text, retrieval.snippet_chars),
                })
                .collect(),
            rejected_by: None,
        })
    }

    /// The cached record, or a fresh extraction over the upload directory.
    pub async fn extract(&self) -> Result<StructuredRecord> {
        if let Some(cached) = self.cache.get() {
            return Ok(cached.record);
        }
        let _writer = self.writer.lock().await;
        if let Some(cached) = self.cache.get() {
            return Ok(cached.record);
        }

        let upload_dir = self.config.storage.upload_dir.clone();
        let docs = tokio::task::spawn_blocking(move || parser::parse_directory(&upload_dir))
            .await
            .context("document parsing task panicked")??;
        let text = parser::full_text(&docs);
        if text.trim().is_empty() {
            return Ok(StructuredRecord::empty());
        }
        let record = self.extract_from(&text).await?;
        self.cache.replace(record.clone());
        Ok(record)
    }

    pub async fn index_info(&self) -> Result<IndexInfo> {
        let index_dir = self.config.storage.index_dir.clone();
        let dir = index_dir.clone();
        let snapshot = tokio::task::spawn_blocking(move || FlatIndex::load(&dir))
            .await
            .context("snapshot load task panicked")??;
        Ok(IndexInfo {
            model: self.embedder.model_name().to_string(),
            dims: self.embedder.dims(),
            index_dir,
            snapshot: snapshot.is_some(),
            entries: snapshot.as_ref().map_or(0, |index| index.len()),
        })
    }

    /// In-memory index, else the snapshot, else a rebuild that is kept in
    /// memory but not persisted.
    async fn current_index(&self) -> Result<Arc<FlatIndex>> {
        if let Some(index) = self.loaded_index() {
            return Ok(index);
        }

        let _writer = self.writer.lock().await;
        // A rebuild may have finished while we waited.
        if let Some(index) = self.loaded_index() {
            return Ok(index);
        }

        let upload_dir = self.config.storage.upload_dir.clone();
        let index_dir = self.config.storage.index_dir.clone();
        let params = self.params;
        let embedder = self.embedder.clone();
        let index = tokio::task::spawn_blocking(move || -> Result<FlatIndex> {
            match load_snapshot(&index_dir, embedder.dims()) {
                Some(index) => Ok(index),
                None => {
                    let docs = parser::parse_directory(&upload_dir)?;
                    build_index(&docs, params, &embedder)
                }
            }
        })
        .await
        .context("index load task panicked")??;

        let index = Arc::new(index);
        *self.index.write() = Some(Arc::clone(&index));
        Ok(index)
    }

    fn loaded_index(&self) -> Option<Arc<FlatIndex>> {
        self.index.read().clone()
    }
}

fn build_index(
    docs: &[Document],
    params: ChunkParams,
    embedder: &HashEmbedder,
) -> Result<FlatIndex> {
    let chunks: Vec<Chunk> = docs
        .iter()
        .flat_map(|d| chunk_pages(&d.pages, params))
        .collect();
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    let vectors = embedder.embed_batch(&texts);

    let index = FlatIndex::new(embedder.dims())?;
    index.add(&vectors, &chunks)?;
    Ok(index)
}

fn load_snapshot(dir: &Path, dims: usize) -> Option<FlatIndex> {
    match FlatIndex::load(dir) {
        Ok(Some(index)) if index.dims() == dims => Some(index),
        Ok(Some(index)) => {
            tracing::warn!(
                dir = %dir.display(),
                snapshot_dims = index.dims(),
                dims,
                "snapshot dimension differs from config; rebuilding"
            );
            None
        }
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "unreadable snapshot; rebuilding");
            None
        }
    }
}

/// Bare file name of a supported document; rejects paths and unknown types.
fn stored_name(file_name: &str) -> Result<String> {
    let name = Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name.is_empty() {
        bail!("file name must not be empty");
    }
    if DocumentKind::from_name(&name).is_none() {
        bail!("unsupported document type: {} (expected .pdf, .docx, or .txt)", name);
    }
    Ok(name)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

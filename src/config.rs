//! TOML configuration for the `udi` binary and the HTTP server.
//!
//! Only `[storage]` is required; every other section falls back to the
//! defaults below. See `config/udi.example.toml` for a full example.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use ultradoc_core::chunk::ChunkParams;
use ultradoc_core::confidence::DEFAULT_MAX_DISTANCE;
use ultradoc_core::embedding::DEFAULT_DIMS;
use ultradoc_core::guardrail::{GuardrailConfig, DEFAULT_MIN_COVERAGE};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Where uploaded documents are kept. Every supported file here is
    /// part of the corpus.
    pub upload_dir: PathBuf,
    /// Where the index snapshot (`index.bin` + `chunks.json`) lives.
    pub index_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> Result<ChunkParams> {
        ChunkParams::new(self.chunk_size, self.overlap).map_err(anyhow::Error::from)
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,
    #[serde(default = "default_min_coverage")]
    pub min_coverage: f64,
    /// Chunks handed to the answer enhancer.
    #[serde(default = "default_context_chunks")]
    pub context_chunks: usize,
    /// Length of the fallback answer cut from the top chunk.
    #[serde(default = "default_answer_chars")]
    pub answer_chars: usize,
    /// Length of each source snippet in an answer.
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            dims: default_dims(),
            top_k: default_top_k(),
            max_distance: default_max_distance(),
            min_coverage: default_min_coverage(),
            context_chunks: default_context_chunks(),
            answer_chars: default_answer_chars(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

impl RetrievalConfig {
    pub fn guardrails(&self) -> GuardrailConfig {
        GuardrailConfig {
            max_distance: self.max_distance,
            min_coverage: self.min_coverage,
        }
    }
}

fn default_dims() -> usize {
    DEFAULT_DIMS
}
fn default_top_k() -> usize {
    5
}
fn default_max_distance() -> f32 {
    DEFAULT_MAX_DISTANCE
}
fn default_min_coverage() -> f64 {
    DEFAULT_MIN_COVERAGE
}
fn default_context_chunks() -> usize {
    3
}
fn default_answer_chars() -> usize {
    500
}
fn default_snippet_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_document_chars")]
    pub max_document_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: Some("gpt-4o".to_string()),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            max_document_chars: default_max_document_chars(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_max_document_chars() -> usize {
    6000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Config {
    /// All defaults, storing data under `./data`.
    pub fn minimal() -> Self {
        Self {
            storage: StorageConfig {
                upload_dir: PathBuf::from("data/uploads"),
                index_dir: PathBuf::from("data/vector_store"),
            },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            llm: LlmConfig::default(),
            server: ServerConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        // Validate chunking
        if self.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            anyhow::bail!(
                "chunking.overlap ({}) must be < chunking.chunk_size ({})",
                self.chunking.overlap,
                self.chunking.chunk_size
            );
        }

        // Validate retrieval
        if self.retrieval.dims == 0 {
            anyhow::bail!("retrieval.dims must be > 0");
        }
        if self.retrieval.top_k < 1 {
            anyhow::bail!("retrieval.top_k must be >= 1");
        }
        if !(self.retrieval.max_distance > 0.0) {
            anyhow::bail!("retrieval.max_distance must be > 0");
        }
        if !(0.0..=1.0).contains(&self.retrieval.min_coverage) {
            anyhow::bail!("retrieval.min_coverage must be in [0.0, 1.0]");
        }

        // Validate llm
        match self.llm.provider.as_str() {
            "disabled" => {}
            "openai" => {
                if self.llm.model.as_deref().map_or(true, str::is_empty) {
                    anyhow::bail!("llm.model must be specified when provider is 'openai'");
                }
            }
            other => anyhow::bail!(
                "Unknown llm provider: '{}'. Must be disabled or openai.",
                other
            ),
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    const STORAGE: &str = "[storage]\nupload_dir = \"u\"\nindex_dir = \"i\"\n";

    #[test]
    fn test_defaults_fill_missing_sections() {
        let cfg = parse(STORAGE).unwrap();
        assert_eq!(cfg.chunking.chunk_size, 500);
        assert_eq!(cfg.chunking.overlap, 100);
        assert_eq!(cfg.retrieval.dims, 128);
        assert_eq!(cfg.retrieval.top_k, 5);
        assert_eq!(cfg.retrieval.max_distance, 1.5);
        assert_eq!(cfg.retrieval.min_coverage, 0.2);
        assert_eq!(cfg.llm.provider, "disabled");
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
    }

    #[test]
    fn test_storage_is_required() {
        assert!(parse("[chunking]\nchunk_size = 10\n").is_err());
    }

    #[test]
    fn test_rejects_overlap_not_below_chunk_size() {
        let err = parse(&format!("{STORAGE}[chunking]\nchunk_size = 10\noverlap = 10\n"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("overlap"));
    }

    #[test]
    fn test_rejects_bad_retrieval() {
        assert!(parse(&format!("{STORAGE}[retrieval]\ndims = 0\n")).is_err());
        assert!(parse(&format!("{STORAGE}[retrieval]\ntop_k = 0\n")).is_err());
        assert!(parse(&format!("{STORAGE}[retrieval]\nmax_distance = 0.0\n")).is_err());
        assert!(parse(&format!("{STORAGE}[retrieval]\nmin_coverage = 1.5\n")).is_err());
    }

    #[test]
    fn test_llm_provider_rules() {
        assert!(parse(&format!("{STORAGE}[llm]\nprovider = \"ollama\"\n")).is_err());
        assert!(parse(&format!("{STORAGE}[llm]\nprovider = \"openai\"\n")).is_err());
        let cfg = parse(&format!(
            "{STORAGE}[llm]\nprovider = \"openai\"\nmodel = \"gpt-4o-mini\"\n"
        ))
        .unwrap();
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.max_document_chars, 6000);
    }

    #[test]
    fn test_minimal_is_valid() {
        let cfg = Config::minimal();
        cfg.validate().unwrap();
        assert_eq!(cfg.storage.upload_dir, PathBuf::from("data/uploads"));
        assert_eq!(cfg.retrieval.guardrails(), GuardrailConfig::default());
    }
}

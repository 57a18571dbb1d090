//! Optional LLM enhancement for extraction and answers.
//!
//! The service works without any model: [`DisabledEnhancer`] answers
//! `None` to everything and the regex extractor plus raw chunk text are
//! used as is. [`OpenAiEnhancer`] talks to any OpenAI-compatible chat
//! completions endpoint.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - Network errors → retry
//! - Other HTTP 4xx → fail immediately
//!
//! Backoff doubles from one second (1s, 2s, 4s, …) and is capped at 32s.
//!
//! Callers treat every error from an enhancer as "no enhancement".

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use ultradoc_core::models::{Chunk, Field, StructuredRecord};

use crate::config::LlmConfig;

/// Model-backed enrichment of extraction and answering.
#[async_trait]
pub trait Enhancer: Send + Sync {
    /// Fields read from the document text. Present fields override the
    /// regex result.
    async fn extract_fields(&self, text: &str) -> Result<Option<StructuredRecord>>;

    /// A natural-language answer grounded in `chunks`.
    async fn answer(&self, question: &str, chunks: &[Chunk]) -> Result<Option<String>>;
}

/// No model configured.
pub struct DisabledEnhancer;

#[async_trait]
impl Enhancer for DisabledEnhancer {
    async fn extract_fields(&self, _text: &str) -> Result<Option<StructuredRecord>> {
        Ok(None)
    }

    async fn answer(&self, _question: &str, _chunks: &[Chunk]) -> Result<Option<String>> {
        Ok(None)
    }
}

const EXTRACTION_SYSTEM_PROMPT: &str =
    "You extract structured data from logistics documents and return JSON only. No explanation.";

const QA_SYSTEM_PROMPT: &str = "You are a helpful logistics document assistant. \
Answer questions using ONLY the provided context. \
If the context does not contain the answer, say 'Not found in document'. \
Be concise and factual. Do not make up information.";

const MAX_CONTEXT_CHUNKS: usize = 3;

fn extraction_prompt(document_text: &str) -> String {
    format!(
        r#"You are an information extraction engine.

Extract the following fields EXACTLY as they appear in the document.
The document is a logistics/freight/shipping document.

Rules:
- Use ONLY the document text below
- Do NOT infer or guess values
- If a value is missing or unclear, return null
- Return ONLY valid JSON, no markdown fencing, no explanation
- For dates, use ISO 8601 format (YYYY-MM-DDTHH:MM:SS) if time is available, otherwise YYYY-MM-DD

JSON schema:
{{
  "shipment_id": string or null,
  "shipper": string or null,
  "consignee": string or null,
  "pickup_datetime": string or null,
  "delivery_datetime": string or null,
  "equipment_type": string or null,
  "mode": string or null,
  "rate": string or null,
  "currency": string or null,
  "weight": string or null,
  "carrier_name": string or null
}}

Document text:
"""
{document_text}
"""
"#
    )
}

fn answer_prompt(question: &str, chunks: &[Chunk]) -> String {
    let context = chunks
        .iter()
        .take(MAX_CONTEXT_CHUNKS)
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n---\n");
    format!("Context from the document:\n\"\"\"\n{context}\n\"\"\"\n\nQuestion: {question}\n\nAnswer:")
}

/// OpenAI-compatible chat completions client.
///
/// The API key is read from the environment variable named by
/// `llm.api_key_env` when the enhancer is built.
pub struct OpenAiEnhancer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
    max_retries: u32,
    max_document_chars: usize,
}

impl OpenAiEnhancer {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} not set", config.api_key_env))?;
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model,
            url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            max_retries: config.max_retries,
            max_document_chars: config.max_document_chars,
        })
    }

    async fn chat(&self, system: &str, user: &str) -> Result<Option<String>> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": 0,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return Ok(parse_chat_response(&json));
                    }

                    // Rate limited or server error, retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!("LLM API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("LLM API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("LLM call failed after retries")))
    }
}

#[async_trait]
impl Enhancer for OpenAiEnhancer {
    async fn extract_fields(&self, text: &str) -> Result<Option<StructuredRecord>> {
        let document: String = text.chars().take(self.max_document_chars).collect();
        let reply = self
            .chat(EXTRACTION_SYSTEM_PROMPT, &extraction_prompt(&document))
            .await?;
        match reply {
            Some(raw) => parse_extraction_reply(&raw).map(Some),
            None => Ok(None),
        }
    }

    async fn answer(&self, question: &str, chunks: &[Chunk]) -> Result<Option<String>> {
        self.chat(QA_SYSTEM_PROMPT, &answer_prompt(question, chunks))
            .await
    }
}

/// Build the enhancer named by `llm.provider`.
pub fn create_enhancer(config: &LlmConfig) -> Result<Box<dyn Enhancer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEnhancer)),
        "openai" => Ok(Box::new(OpenAiEnhancer::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

/// `choices[0].message.content`, trimmed; `None` when absent or blank.
fn parse_chat_response(json: &serde_json::Value) -> Option<String> {
    let content = json
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()?
        .trim();
    (!content.is_empty()).then(|| content.to_string())
}

/// Parse a JSON object out of a model reply, tolerating code fences and
/// surrounding prose. Non-null scalars become strings.
fn parse_extraction_reply(raw: &str) -> Result<StructuredRecord> {
    let mut cleaned = raw.trim();
    if cleaned.starts_with("```") {
        cleaned = cleaned
            .split_once('\n')
            .map_or("", |(_, rest)| rest)
            .trim_end()
            .trim_end_matches("```");
    }

    let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) else {
        bail!("no JSON object in extraction reply");
    };
    if end < start {
        bail!("no JSON object in extraction reply");
    }
    let parsed: serde_json::Value = serde_json::from_str(&cleaned[start..=end])?;

    let mut record = StructuredRecord::empty();
    for field in Field::ALL {
        let value = match parsed.get(field.key()) {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };
        record.set(field, value);
    }
    Ok(record)
}

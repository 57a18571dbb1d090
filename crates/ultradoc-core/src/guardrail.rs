//! Guardrail chain that suppresses answers the evidence does not support.
//!
//! Four checks run in fixed order and stop at the first failure:
//!
//! 1. [`strong_retrieval`]: a result exists and the best distance is
//!    within `max_distance`.
//! 2. [`keyword_intent`]: identifier keywords asked about (IFSC, SWIFT,
//!    IBAN, routing) must appear in the top chunk.
//! 3. [`question_coverage`]: enough of the question's content words
//!    appear literally in the top chunk.
//! 4. [`rate_currency`]: rate/charge/amount questions need a digit and a
//!    currency marker in the top chunk.
//!
//! Checks 2-4 look only at the question and the top chunk's text. The
//! vocabulary is English-only.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::confidence::DEFAULT_MAX_DISTANCE;
use crate::models::SearchResult;

/// Keywords naming account/routing identifiers.
pub const CRITICAL_KEYWORDS: [&str; 4] = ["ifsc", "swift", "iban", "routing"];

/// Question terms that make the rate guardrail apply.
pub const RATE_TERMS: [&str; 3] = ["rate", "charge", "amount"];

/// Currency symbols and codes accepted as evidence of a monetary value.
pub const CURRENCY_MARKERS: [&str; 6] = ["$", "usd", "inr", "eur", "gbp", "cad"];

pub const DEFAULT_MIN_COVERAGE: f64 = 0.2;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "the", "is", "are", "was", "were", "be", "been", "being",
        "have", "has", "had", "do", "does", "did", "will", "would", "could",
        "should", "may", "might", "shall", "can", "need", "dare", "ought",
        "and", "but", "or", "nor", "not", "so", "yet", "both", "either",
        "neither", "each", "every", "all", "any", "few", "more", "most",
        "other", "some", "such", "no", "only", "own", "same", "than", "too",
        "very", "just", "because", "as", "until", "while", "of", "at", "by",
        "for", "with", "about", "against", "between", "through", "during",
        "before", "after", "above", "below", "to", "from", "up", "down",
        "in", "out", "on", "off", "over", "under", "again", "further",
        "then", "once", "here", "there", "when", "where", "why", "how",
        "what", "which", "who", "whom", "this", "that", "these", "those",
        "i", "me", "my", "myself", "we", "our", "ours", "ourselves",
        "you", "your", "yours", "yourself", "he", "him", "his", "himself",
        "she", "her", "hers", "herself", "it", "its", "itself",
        "they", "them", "their", "theirs", "themselves", "many", "much",
        "tell", "give", "show", "find", "get", "list", "describe",
    ]
    .into_iter()
    .collect()
});

/// Thresholds for the chain. `max_distance` is the same value used for
/// confidence scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardrailConfig {
    pub max_distance: f32,
    /// Fraction of question content words that must appear in the chunk.
    pub min_coverage: f64,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_MAX_DISTANCE,
            min_coverage: DEFAULT_MIN_COVERAGE,
        }
    }
}

/// The check that rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailStage {
    RetrievalStrength,
    KeywordIntent,
    QuestionCoverage,
    RateCurrency,
}

impl GuardrailStage {
    pub fn name(self) -> &'static str {
        match self {
            GuardrailStage::RetrievalStrength => "retrieval_strength",
            GuardrailStage::KeywordIntent => "keyword_intent",
            GuardrailStage::QuestionCoverage => "question_coverage",
            GuardrailStage::RateCurrency => "rate_currency",
        }
    }
}

impl fmt::Display for GuardrailStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of running the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Rejected(GuardrailStage),
}

impl Verdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, Verdict::Approved)
    }

    pub fn rejected_by(&self) -> Option<GuardrailStage> {
        match self {
            Verdict::Approved => None,
            Verdict::Rejected(stage) => Some(*stage),
        }
    }
}

/// The ordered, short-circuiting guardrail chain.
#[derive(Debug, Clone, Default)]
pub struct GuardrailChain {
    config: GuardrailConfig,
}

impl GuardrailChain {
    pub fn new(config: GuardrailConfig) -> Self {
        Self { config }
    }

    /// Run every check against `question` and the closest result.
    pub fn evaluate(&self, question: &str, results: &[SearchResult]) -> Verdict {
        let verdict = self.run(question, results);
        if let Verdict::Rejected(stage) = verdict {
            tracing::debug!(%stage, "guardrail blocked answer");
        }
        verdict
    }

    fn run(&self, question: &str, results: &[SearchResult]) -> Verdict {
        if !strong_retrieval(results, self.config.max_distance) {
            return Verdict::Rejected(GuardrailStage::RetrievalStrength);
        }
        let top = results[0].chunk.text.as_str();
        if !keyword_intent(question, top) {
            return Verdict::Rejected(GuardrailStage::KeywordIntent);
        }
        if !question_coverage(question, top, self.config.min_coverage) {
            return Verdict::Rejected(GuardrailStage::QuestionCoverage);
        }
        if !rate_currency(question, top) {
            return Verdict::Rejected(GuardrailStage::RateCurrency);
        }
        Verdict::Approved
    }
}

/// Passes when there is a best result no farther than `max_distance`.
pub fn strong_retrieval(results: &[SearchResult], max_distance: f32) -> bool {
    results
        .first()
        .is_some_and(|best| best.distance <= max_distance)
}

/// Fails when the question names a critical keyword the text lacks.
pub fn keyword_intent(question: &str, text: &str) -> bool {
    let question = question.to_lowercase();
    let text = text.to_lowercase();
    CRITICAL_KEYWORDS
        .iter()
        .all(|kw| !question.contains(kw) || text.contains(kw))
}

/// Passes when at least `min_ratio` of the question's content words occur
/// in the text. A question with no content words passes.
pub fn question_coverage(question: &str, text: &str, min_ratio: f64) -> bool {
    let question = question.to_lowercase();
    let question_words: Vec<&str> = words(&question)
        .filter(|w| w.chars().count() > 1 && !STOP_WORDS.contains(w))
        .collect();
    if question_words.is_empty() {
        return true;
    }

    let text = text.to_lowercase();
    let text_words: HashSet<&str> = words(&text).collect();
    let matched = question_words
        .iter()
        .filter(|w| text_words.contains(*w))
        .count();
    (matched as f64 / question_words.len() as f64) >= min_ratio
}

/// Rate questions need a digit and a currency marker in the text.
pub fn rate_currency(question: &str, text: &str) -> bool {
    let question = question.to_lowercase();
    if !RATE_TERMS.iter().any(|t| question.contains(t)) {
        return true;
    }
    let text = text.to_lowercase();
    let has_number = text.chars().any(|c| c.is_ascii_digit());
    let has_currency = CURRENCY_MARKERS.iter().any(|m| text.contains(m));
    has_number && has_currency
}

/// Word tokens: maximal runs of alphanumerics and underscores.
fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn results(text: &str, distance: f32) -> Vec<SearchResult> {
        vec![SearchResult {
            chunk: Chunk {
                text: text.to_string(),
                page: 1,
            },
            distance,
        }]
    }

    #[test]
    fn test_strong_retrieval() {
        assert!(!strong_retrieval(&[], 1.5));
        assert!(strong_retrieval(&results("x", 1.5), 1.5));
        assert!(!strong_retrieval(&results("x", 1.51), 1.5));
    }

    #[test]
    fn test_keyword_intent_ifsc() {
        assert!(!keyword_intent("What is the IFSC code?", "Bank: HDFC, account 1234"));
        assert!(keyword_intent("What is the IFSC code?", "ifsc: HDFC0001234"));
        assert!(keyword_intent("What is the weight?", "Weight: 100 kg"));
    }

    #[test]
    fn test_ifsc_rejected_regardless_of_other_checks() {
        let chain = GuardrailChain::default();
        let r = results("what is the ifc code of bank account", 0.0);
        assert_eq!(
            chain.evaluate("What is the IFSC code of the bank account?", &r),
            Verdict::Rejected(GuardrailStage::KeywordIntent)
        );
    }

    #[test]
    fn test_coverage_empty_after_stop_words_passes() {
        assert!(question_coverage("What is this?", "totally unrelated", 0.2));
        assert!(question_coverage("", "anything", 0.9));
        assert!(question_coverage("a I ?", "x", 1.0));
    }

    #[test]
    fn test_coverage_ratio() {
        let text = "Consignee: Beta Logistics LLC, Dallas TX";
        // content words: consignee, dallas, warehouse, address, zip -> 2/5
        let q = "consignee dallas warehouse address zip";
        assert!(question_coverage(q, text, 0.4));
        assert!(!question_coverage(q, text, 0.41));
    }

    #[test]
    fn test_coverage_requires_whole_tokens() {
        assert!(!question_coverage("shipping", "shipment details", 0.2));
    }

    #[test]
    fn test_rate_currency() {
        assert!(rate_currency("Who is the shipper?", "no numbers here"));
        assert!(rate_currency("What is the rate?", "Rate: $2500"));
        assert!(rate_currency("Total amount?", "Total 1200 EUR"));
        assert!(!rate_currency("What is the rate?", "Rate: to be confirmed"));
        assert!(!rate_currency("What is the charge?", "Charge: 1200"));
    }

    #[test]
    fn test_chain_order_and_approval() {
        let chain = GuardrailChain::default();
        assert_eq!(
            chain.evaluate("rate?", &[]),
            Verdict::Rejected(GuardrailStage::RetrievalStrength)
        );
        assert_eq!(
            chain.evaluate("What is the carrier rate?", &results("Carrier rate: pending", 0.2)),
            Verdict::Rejected(GuardrailStage::RateCurrency)
        );
        assert_eq!(
            chain.evaluate("pallet count", &results("Rate: $2500 USD", 0.2)),
            Verdict::Rejected(GuardrailStage::QuestionCoverage)
        );
        let ok = chain.evaluate("What is the carrier rate?", &results("Carrier rate: $2500 USD", 0.2));
        assert!(ok.is_approved());
        assert_eq!(ok.rejected_by(), None);
    }

    #[test]
    fn test_far_result_rejected_before_content_checks() {
        let chain = GuardrailChain::new(GuardrailConfig {
            max_distance: 0.5,
            min_coverage: 0.2,
        });
        let v = chain.evaluate("rate", &results("Rate: $2500 USD", 0.6));
        assert_eq!(v.rejected_by(), Some(GuardrailStage::RetrievalStrength));
    }
}

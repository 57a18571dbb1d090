//! Pattern-based structured field extraction.
//!
//! Fills a [`StructuredRecord`] from the full document text, independent
//! of chunking and retrieval. Each field has an ordered list of
//! case-insensitive patterns; the first one that matches supplies the
//! field from its capture group, trimmed. A field no pattern matches is
//! absent, never an empty string.
//!
//! Rate and currency share one pass: the rate comes from an amount-like
//! label or, failing that, any `$` amount; the currency comes from an
//! explicit code or, failing that, is `USD` when a `$` appears.
//!
//! Text is normalized before matching: whitespace runs inside a line
//! collapse to one space and blank lines are dropped, so patterns that
//! stop at a line break still see one.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::error::Result;
use crate::models::{Field, StructuredRecord};

const DATE_TIME: &str = r"(\d{1,2}[/-]\d{1,2}[/-]\d{2,4}(?:\s+\d{1,2}:\d{2})?)";

fn field_patterns(field: Field) -> Vec<String> {
    let p = |s: &str| s.to_string();
    match field {
        Field::ShipmentId => vec![
            p(r"shipment\s*(?:id|#|no|number)\s*[:\-]?\s*([A-Z0-9\-]+)"),
            p(r"load\s*(?:id|#|no|number)\s*[:\-]?\s*([A-Z0-9\-]+)"),
            p(r"order\s*(?:id|#|no|number)\s*[:\-]?\s*([A-Z0-9\-]+)"),
            p(r"pro\s*(?:#|number)\s*[:\-]?\s*([A-Z0-9\-]+)"),
            p(r"bol\s*(?:#|number)\s*[:\-]?\s*([A-Z0-9\-]+)"),
            p(r"\b(ld\d+)\b"),
        ],
        Field::Shipper => vec![
            p(r"shipper\s*[:\-]\s*(.+?)(?:\n|$|consignee|receiver|deliver)"),
            p(r"ship\s*from\s*[:\-]\s*(.+?)(?:\n|$)"),
            p(r"origin\s*[:\-]\s*(.+?)(?:\n|$)"),
            p(r"pickup\s*(?:location|address|from)\s*[:\-]\s*(.+?)(?:\n|$)"),
        ],
        Field::Consignee => vec![
            p(r"consignee\s*[:\-]\s*(.+?)(?:\n|$|shipper|deliver)"),
            p(r"receiver\s*[:\-]\s*(.+?)(?:\n|$)"),
            p(r"ship\s*to\s*[:\-]\s*(.+?)(?:\n|$)"),
            p(r"destination\s*[:\-]\s*(.+?)(?:\n|$)"),
            p(r"deliver(?:y)?\s*(?:location|address|to)\s*[:\-]\s*(.+?)(?:\n|$)"),
        ],
        Field::PickupDatetime => vec![
            p(r"pickup\s*(?:date|time|datetime)\s*[:\-]\s*(.+?)(?:\n|$|delivery|deliver)"),
            format!(r"pick\s*up\s*[:\-]\s*{DATE_TIME}"),
            format!(r"pickup\s*[:\-]\s*{DATE_TIME}"),
        ],
        Field::DeliveryDatetime => vec![
            p(r"delivery\s*(?:date|time|datetime)\s*[:\-]\s*(.+?)(?:\n|$|pickup|pick)"),
            format!(r"deliver(?:y)?\s*[:\-]\s*{DATE_TIME}"),
            format!(r"drop\s*off\s*[:\-]\s*{DATE_TIME}"),
        ],
        Field::EquipmentType => vec![
            p(r"equipment\s*(?:type)?\s*[:\-]\s*(.+?)(?:\n|$)"),
            p(r"\b(flatbed|reefer|dry\s*van|van|tanker|intermodal|container)\b"),
        ],
        Field::Mode => vec![
            p(r"mode\s*[:\-]\s*(\w+)"),
            p(r"\b(ftl|ltl|fcl|lcl|parcel|intermodal|drayage|truckload)\b"),
        ],
        Field::Weight => vec![
            p(r"weight\s*[:\-]\s*([\d,]+\.?\d*\s*(?:lbs?|kg|tons?)?)"),
            p(r"([\d,]+\.?\d*)\s*(?:lbs?|kg|tons?)\b"),
        ],
        Field::CarrierName => vec![
            p(r"carrier\s*(?:name)?\s*[:\-]\s*(.+?)(?:\n|$|driver|dispatcher|rate)"),
            p(r"trucking\s*company\s*[:\-]\s*(.+?)(?:\n|$)"),
        ],
        // Handled by the shared rate/currency pass.
        Field::Rate | Field::Currency => Vec::new(),
    }
}

const RATE_LABELED: &str = r"(?:agreed\s*amount|carrier\s*rate|total\s*(?:rate|charge|amount)|rate|charge)\s*[:\-]?\s*\$?\s*([\d,]+\.?\d*)";
const RATE_DOLLAR: &str = r"\$\s*([\d,]+\.?\d*)";
const CURRENCY_CODE: &str = r"\b(usd|inr|eur|gbp|cad)\b";

fn compile(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("(?i){pattern}"))?)
}

/// Compiled pattern set for every field.
#[derive(Debug, Clone)]
pub struct StructuredExtractor {
    fields: Vec<(Field, Vec<Regex>)>,
    rate: [Regex; 2],
    currency: Regex,
}

impl StructuredExtractor {
    pub fn new() -> Result<Self> {
        let mut fields = Vec::new();
        for field in Field::ALL {
            let patterns = field_patterns(field)
                .iter()
                .map(|p| compile(p))
                .collect::<Result<Vec<_>>>()?;
            if !patterns.is_empty() {
                fields.push((field, patterns));
            }
        }
        Ok(Self {
            fields,
            rate: [compile(RATE_LABELED)?, compile(RATE_DOLLAR)?],
            currency: compile(CURRENCY_CODE)?,
        })
    }

    /// Extract all fields from `full_text`. Deterministic.
    pub fn extract(&self, full_text: &str) -> StructuredRecord {
        let text = normalize(full_text);
        let mut record = StructuredRecord::empty();

        for (field, patterns) in &self.fields {
            record.set(*field, first_capture(patterns, &text));
        }

        let (rate, currency) = self.rate_and_currency(&text);
        record.rate = rate;
        record.currency = currency;
        record
    }

    fn rate_and_currency(&self, text: &str) -> (Option<String>, Option<String>) {
        let rate = first_capture(&self.rate, text);
        let currency = match self.currency.captures(text).and_then(|c| c.get(1)) {
            Some(code) => Some(code.as_str().to_uppercase()),
            None if text.contains('$') => Some("USD".to_string()),
            None => None,
        };
        (rate, currency)
    }
}

/// Extract with a process-wide compiled [`StructuredExtractor`].
///
/// ```rust
/// use ultradoc_core::extract::extract_structured_fields;
///
/// let record = extract_structured_fields("Shipment ID: LD12345, Rate: $2500 USD").unwrap();
/// assert_eq!(record.shipment_id.as_deref(), Some("LD12345"));
/// assert_eq!(record.rate.as_deref(), Some("2500"));
/// assert_eq!(record.currency.as_deref(), Some("USD"));
/// ```
pub fn extract_structured_fields(full_text: &str) -> Result<StructuredRecord> {
    static EXTRACTOR: OnceCell<StructuredExtractor> = OnceCell::new();
    let extractor = EXTRACTOR.get_or_try_init(StructuredExtractor::new)?;
    Ok(extractor.extract(full_text))
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|re| {
        let value = re.captures(text)?.get(1)?.as_str().trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn normalize(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

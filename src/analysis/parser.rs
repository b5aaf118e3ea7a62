//! Backend payload parsing
//!
//! Turns a raw backend payload into a validated [`AnalysisResult`]. Parsing is
//! staged, each stage more permissive than the previous one:
//!
//! 1. the whole payload is a JSON object
//! 2. the object sits inside a fenced code block
//! 3. the object is embedded in surrounding prose (first `{` to last `}`)
//!
//! A stage only succeeds on an object that carries at least one result field.
//! If every stage fails the result is valid but empty. Individual entries that
//! do not conform are dropped and counted instead of failing the whole payload.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use thiserror::Error;

use super::backend::FailureResponse;
use super::types::{AnalysisResult, ReadabilityMetrics, Severity, Suggestion, SuggestionKind, TextRange};

/// Confidence assigned to entries that do not state one
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

const KIND_FIELDS: [(&str, SuggestionKind); 3] = [
    ("grammarSuggestions", SuggestionKind::Grammar),
    ("styleSuggestions", SuggestionKind::Style),
    ("readabilitySuggestions", SuggestionKind::Readability),
];

/// Top-level fields that mark an object as an analysis result
const RESULT_FIELDS: [&str; 5] = [
    "grammarSuggestions",
    "styleSuggestions",
    "readabilitySuggestions",
    "suggestions",
    "readabilityMetrics",
];

/// Which parsing stage produced the result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    Strict,
    Fenced,
    Embedded,
    /// Every stage failed; the result is empty
    Fallback,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload is not a JSON object")]
    NotAnObject,

    #[error("No fenced code block found")]
    NoFencedBlock,

    #[error("No embedded JSON object found")]
    NoEmbeddedObject,

    #[error("Object has no analysis result fields")]
    NoResultFields,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAnalysis {
    pub result: AnalysisResult,
    pub stage: ParseStage,
    /// Entries rejected at the boundary
    pub dropped: usize,
}

impl ParsedAnalysis {
    /// Whether the result came from the payload rather than the empty fallback
    pub fn is_parsed(&self) -> bool {
        self.stage != ParseStage::Fallback
    }
}

/// Parse a raw backend payload. Never fails.
pub fn parse_analysis(raw: &str) -> ParsedAnalysis {
    let stages: [(ParseStage, fn(&str) -> Result<Map<String, Value>, ParseError>); 3] = [
        (ParseStage::Strict, parse_strict),
        (ParseStage::Fenced, parse_fenced),
        (ParseStage::Embedded, parse_embedded),
    ];

    for (stage, parse) in stages {
        match parse(raw).and_then(require_result_fields) {
            Ok(object) => {
                let (result, dropped) = build_result(&object);
                if dropped > 0 {
                    log::warn!("Dropped {} non-conforming suggestion entries", dropped);
                }
                return ParsedAnalysis {
                    result,
                    stage,
                    dropped,
                };
            }
            Err(e) => log::debug!("Parse stage {:?} failed: {}", stage, e),
        }
    }

    log::warn!(
        "Could not parse analysis payload ({} bytes), using empty result",
        raw.len()
    );
    ParsedAnalysis {
        result: AnalysisResult::default(),
        stage: ParseStage::Fallback,
        dropped: 0,
    }
}

/// Failure body (`{ code, message }`) delivered in place of a result.
///
/// Some gateways answer errors with a success status, so the payload has to
/// be checked before it is parsed as an analysis.
pub fn failure_in_payload(raw: &str) -> Option<FailureResponse> {
    let object = parse_object(raw).ok()?;
    if has_result_fields(&object) || !object.contains_key("code") {
        return None;
    }
    serde_json::from_value(Value::Object(object)).ok()
}

fn has_result_fields(object: &Map<String, Value>) -> bool {
    RESULT_FIELDS.iter().any(|field| object.contains_key(*field))
}

fn require_result_fields(object: Map<String, Value>) -> Result<Map<String, Value>, ParseError> {
    if has_result_fields(&object) {
        Ok(object)
    } else {
        Err(ParseError::NoResultFields)
    }
}

fn parse_object(text: &str) -> Result<Map<String, Value>, ParseError> {
    match serde_json::from_str::<Value>(text.trim())? {
        Value::Object(object) => Ok(object),
        _ => Err(ParseError::NotAnObject),
    }
}

fn parse_strict(raw: &str) -> Result<Map<String, Value>, ParseError> {
    parse_object(raw)
}

fn parse_fenced(raw: &str) -> Result<Map<String, Value>, ParseError> {
    let open = raw.find("```").ok_or(ParseError::NoFencedBlock)?;
    let after_open = &raw[open + 3..];
    // Skip an optional language tag such as ```json
    let body_start = after_open.find('\n').ok_or(ParseError::NoFencedBlock)? + 1;
    let body = &after_open[body_start..];
    let close = body.find("```").ok_or(ParseError::NoFencedBlock)?;
    parse_object(&body[..close])
}

fn parse_embedded(raw: &str) -> Result<Map<String, Value>, ParseError> {
    let start = raw.find('{').ok_or(ParseError::NoEmbeddedObject)?;
    let end = raw.rfind('}').ok_or(ParseError::NoEmbeddedObject)?;
    if end < start {
        return Err(ParseError::NoEmbeddedObject);
    }
    parse_object(&raw[start..=end])
}

/// Ids for entries that arrive without one, unique within a payload
struct FallbackIds {
    taken: HashSet<String>,
    next: HashMap<SuggestionKind, usize>,
}

impl FallbackIds {
    fn new(object: &Map<String, Value>) -> Self {
        let taken = KIND_FIELDS
            .iter()
            .map(|(field, _)| *field)
            .chain(["suggestions"])
            .filter_map(|field| object.get(field).and_then(Value::as_array))
            .flatten()
            .filter_map(|entry| explicit_id(entry.get("id")?))
            .collect();
        Self {
            taken,
            next: HashMap::new(),
        }
    }

    fn allocate(&mut self, kind: SuggestionKind) -> String {
        let next = self.next.entry(kind).or_insert(0);
        loop {
            let id = format!("{}-{}", kind.label(), next);
            *next += 1;
            if self.taken.insert(id.clone()) {
                return id;
            }
        }
    }
}

fn explicit_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.trim().is_empty() => Some(id.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn build_result(object: &Map<String, Value>) -> (AnalysisResult, usize) {
    let mut result = AnalysisResult::default();
    let mut dropped = 0;
    let mut ids = FallbackIds::new(object);

    for (field, kind) in KIND_FIELDS {
        if let Some(entries) = object.get(field).and_then(Value::as_array) {
            for (index, entry) in entries.iter().enumerate() {
                match validate_entry(entry, Some(kind), &mut ids) {
                    Ok(suggestion) => result.bucket_mut(kind).push(suggestion),
                    Err(reason) => {
                        log::debug!("Dropping {} entry {}: {}", field, index, reason);
                        dropped += 1;
                    }
                }
            }
        }
    }

    // Flat `suggestions` arrays carry the kind on each entry
    if let Some(entries) = object.get("suggestions").and_then(Value::as_array) {
        for (index, entry) in entries.iter().enumerate() {
            match validate_entry(entry, None, &mut ids) {
                Ok(suggestion) => result.bucket_mut(suggestion.kind).push(suggestion),
                Err(reason) => {
                    log::debug!("Dropping suggestions entry {}: {}", index, reason);
                    dropped += 1;
                }
            }
        }
    }

    result.readability_metrics = object
        .get("readabilityMetrics")
        .cloned()
        .and_then(|v| serde_json::from_value::<ReadabilityMetrics>(v).ok())
        .unwrap_or_default();
    result.processing_time_ms = object
        .get("processingTimeMs")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    (result, dropped)
}

/// Validate one suggestion entry
///
/// Required: `originalText` (non-empty), `suggestedText`, `startOffset` and
/// `endOffset` with start <= end. Optional fields fall back to defaults but
/// must be well-formed when present.
fn validate_entry(
    entry: &Value,
    kind_hint: Option<SuggestionKind>,
    ids: &mut FallbackIds,
) -> Result<Suggestion, String> {
    let object = entry.as_object().ok_or("entry is not an object")?;

    let kind = match kind_hint {
        Some(kind) => kind,
        None => object
            .get("type")
            .or_else(|| object.get("kind"))
            .and_then(Value::as_str)
            .and_then(SuggestionKind::parse_kind)
            .ok_or("missing or unknown suggestion type")?,
    };

    let original_text = object
        .get("originalText")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or("missing originalText")?
        .to_string();

    let suggested_text = object
        .get("suggestedText")
        .and_then(Value::as_str)
        .ok_or("missing suggestedText")?
        .to_string();

    let start = offset_field(object, "startOffset")?;
    let end = offset_field(object, "endOffset")?;
    if start > end {
        return Err(format!("startOffset {} is after endOffset {}", start, end));
    }

    let severity = match object.get("severity") {
        None | Some(Value::Null) => Severity::Medium,
        Some(value) => value
            .as_str()
            .and_then(Severity::parse_severity)
            .ok_or_else(|| format!("unknown severity {}", value))?,
    };

    let confidence = match object.get("confidence") {
        None | Some(Value::Null) => DEFAULT_CONFIDENCE,
        Some(value) => {
            let confidence = value.as_f64().ok_or("confidence is not a number")?;
            if !(0.0..=1.0).contains(&confidence) {
                return Err(format!("confidence {} outside [0, 1]", confidence));
            }
            confidence as f32
        }
    };

    let id = match object.get("id").and_then(explicit_id) {
        Some(id) => id,
        None => ids.allocate(kind),
    };

    let explanation = object
        .get("explanation")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let category = object
        .get("category")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(kind.label())
        .to_string();

    Ok(Suggestion {
        id,
        kind,
        severity,
        original_text,
        suggested_text,
        range: TextRange::new(start, end),
        explanation,
        category,
        confidence,
    })
}

fn offset_field(object: &Map<String, Value>, field: &str) -> Result<usize, String> {
    object
        .get(field)
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| format!("missing or negative {}", field))
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod parser_tests;

//! Analysis data model
//!
//! Suggestions and results as they flow from the backend boundary into the
//! lifecycle manager. Field names follow the camelCase wire format.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of issue a suggestion addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Grammar,
    Style,
    Readability,
}

impl SuggestionKind {
    pub const ALL: [SuggestionKind; 3] = [
        SuggestionKind::Grammar,
        SuggestionKind::Style,
        SuggestionKind::Readability,
    ];

    /// Parse a kind from its wire or CLI spelling
    pub fn parse_kind(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "grammar" => Some(SuggestionKind::Grammar),
            "style" => Some(SuggestionKind::Style),
            "readability" => Some(SuggestionKind::Readability),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SuggestionKind::Grammar => "grammar",
            SuggestionKind::Style => "style",
            SuggestionKind::Readability => "readability",
        }
    }
}

impl fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn parse_severity(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Half-open `[start, end)` range of character positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the two ranges share at least one position.
    pub fn overlaps(&self, other: &TextRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos < self.end
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A single validated suggestion.
///
/// `range` is the backend's approximate location at analysis time. It is
/// advisory only and must be re-verified against live text before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: String,
    pub kind: SuggestionKind,
    pub severity: Severity,
    pub original_text: String,
    pub suggested_text: String,
    pub range: TextRange,
    pub explanation: String,
    pub category: String,
    pub confidence: f32,
}

/// Which checks the backend should run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOptions {
    #[serde(default = "default_true")]
    pub grammar: bool,
    #[serde(default = "default_true")]
    pub style: bool,
    #[serde(default = "default_true")]
    pub readability: bool,
    #[serde(default, alias = "audience_level", skip_serializing_if = "Option::is_none")]
    pub audience_level: Option<String>,
    #[serde(default, alias = "document_type", skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            grammar: true,
            style: true,
            readability: true,
            audience_level: None,
            document_type: None,
        }
    }
}

impl AnalysisOptions {
    pub fn enables(&self, kind: SuggestionKind) -> bool {
        match kind {
            SuggestionKind::Grammar => self.grammar,
            SuggestionKind::Style => self.style,
            SuggestionKind::Readability => self.readability,
        }
    }
}

/// Identity of one scheduled analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Request sent to the analysis backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub text: String,
    pub options: AnalysisOptions,
    pub request_id: RequestId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadabilityMetrics {
    pub flesch_reading_ease: f64,
    pub flesch_kincaid_grade: f64,
    pub average_sentence_length: f64,
    pub average_word_length: f64,
    pub complex_word_percentage: f64,
}

/// Validated analysis outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub grammar_suggestions: Vec<Suggestion>,
    pub style_suggestions: Vec<Suggestion>,
    pub readability_suggestions: Vec<Suggestion>,
    pub readability_metrics: ReadabilityMetrics,
    pub processing_time_ms: u64,
}

impl AnalysisResult {
    /// All suggestions in kind order: grammar, style, readability.
    pub fn suggestions(&self) -> impl Iterator<Item = &Suggestion> {
        self.grammar_suggestions
            .iter()
            .chain(&self.style_suggestions)
            .chain(&self.readability_suggestions)
    }

    pub fn into_suggestions(self) -> Vec<Suggestion> {
        let mut all = self.grammar_suggestions;
        all.extend(self.style_suggestions);
        all.extend(self.readability_suggestions);
        all
    }

    pub fn len(&self) -> usize {
        self.grammar_suggestions.len()
            + self.style_suggestions.len()
            + self.readability_suggestions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn bucket_mut(&mut self, kind: SuggestionKind) -> &mut Vec<Suggestion> {
        match kind {
            SuggestionKind::Grammar => &mut self.grammar_suggestions,
            SuggestionKind::Style => &mut self.style_suggestions,
            SuggestionKind::Readability => &mut self.readability_suggestions,
        }
    }
}

//! Plain-text rendering of anchored suggestions

use crate::analysis::ReadabilityMetrics;
use crate::document::DocumentModel;
use crate::lifecycle::SuggestionManager;

/// One line per displayed suggestion, in document order.
///
/// Positions are reported as 1-based `line:column` of the anchored range.
pub fn render_report(doc: &dyn DocumentModel, manager: &SuggestionManager) -> String {
    let text = doc.text_between(0, doc.len()).unwrap_or_default();
    let mut lines = Vec::new();

    for decoration in manager.decorations().iter() {
        let Some(live) = manager.get(&decoration.suggestion_id) else {
            continue;
        };
        let suggestion = &live.suggestion;
        let (line, column) = line_col(&text, decoration.range.start);

        lines.push(format!(
            "[{}/{}] {}:{} \"{}\" -> \"{}\"",
            suggestion.kind,
            suggestion.severity,
            line,
            column,
            suggestion.original_text,
            suggestion.suggested_text
        ));
        if !suggestion.explanation.is_empty() {
            lines.push(format!("    {}", suggestion.explanation));
        }
    }

    let header = match manager.decorations().len() {
        0 => "No issues found.".to_string(),
        1 => "1 suggestion".to_string(),
        n => format!("{n} suggestions"),
    };
    lines.insert(0, header);
    lines.join("\n")
}

/// Summary line for readability metrics, or `None` when the backend sent none.
pub fn render_metrics(metrics: &ReadabilityMetrics) -> Option<String> {
    if *metrics == ReadabilityMetrics::default() {
        return None;
    }
    Some(format!(
        "Reading ease {:.1}, grade {:.1}, {:.1} words per sentence",
        metrics.flesch_reading_ease,
        metrics.flesch_kincaid_grade,
        metrics.average_sentence_length
    ))
}

fn line_col(text: &str, pos: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for c in text.chars().take(pos) {
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::analysis::{AnalysisResult, Severity, Suggestion, SuggestionKind, TextRange};
    use crate::anchor::AnchorResolver;
    use crate::config::LifecycleConfig;
    use crate::document::RichTextDocument;

    fn suggestion(id: &str, kind: SuggestionKind, original: &str, suggested: &str) -> Suggestion {
        Suggestion {
            id: id.to_string(),
            kind,
            severity: Severity::High,
            original_text: original.to_string(),
            suggested_text: suggested.to_string(),
            range: TextRange::new(0, original.chars().count()),
            explanation: String::new(),
            category: kind.label().to_string(),
            confidence: 0.9,
        }
    }

    fn rendered(doc: &RichTextDocument, result: AnalysisResult) -> String {
        let mut manager =
            SuggestionManager::new(AnchorResolver::default(), &LifecycleConfig::default());
        manager.replace_all(result);
        manager.render(doc);
        render_report(doc, &manager)
    }

    #[test]
    fn test_report_without_suggestions() {
        let doc = RichTextDocument::from_plain_text("All good here.");

        assert_snapshot!(rendered(&doc, AnalysisResult::default()), @"No issues found.");
    }

    #[test]
    fn test_report_lists_in_document_order() {
        let doc = RichTextDocument::from_plain_text("Their going home.\nThe students goes to school.");
        let mut agreement = suggestion("g1", SuggestionKind::Grammar, "students goes", "students go");
        agreement.explanation = "The verb must agree with a plural subject.".to_string();
        let mut wordy = suggestion("s1", SuggestionKind::Style, "Their going", "They're going");
        wordy.severity = Severity::Low;

        let result = AnalysisResult {
            grammar_suggestions: vec![agreement],
            style_suggestions: vec![wordy],
            ..Default::default()
        };

        assert_snapshot!(rendered(&doc, result), @r#"
        2 suggestions
        [style/low] 1:1 "Their going" -> "They're going"
        [grammar/high] 2:5 "students goes" -> "students go"
            The verb must agree with a plural subject.
        "#);
    }

    #[test]
    fn test_report_skips_unanchored() {
        let doc = RichTextDocument::from_plain_text("Short text.");
        let result = AnalysisResult {
            grammar_suggestions: vec![suggestion("g1", SuggestionKind::Grammar, "missing", "x")],
            ..Default::default()
        };

        assert_snapshot!(rendered(&doc, result), @"No issues found.");
    }

    #[test]
    fn test_metrics_line() {
        let metrics = ReadabilityMetrics {
            flesch_reading_ease: 64.28,
            flesch_kincaid_grade: 8.06,
            average_sentence_length: 14.0,
            ..Default::default()
        };

        assert_snapshot!(
            render_metrics(&metrics).unwrap(),
            @"Reading ease 64.3, grade 8.1, 14.0 words per sentence"
        );
        assert_eq!(render_metrics(&ReadabilityMetrics::default()), None);
    }

    #[test]
    fn test_line_col_counts_characters() {
        assert_eq!(line_col("héllo\nwörld", 0), (1, 1));
        assert_eq!(line_col("héllo\nwörld", 2), (1, 3));
        assert_eq!(line_col("héllo\nwörld", 6), (2, 1));
        assert_eq!(line_col("héllo\nwörld", 8), (2, 3));
    }
}

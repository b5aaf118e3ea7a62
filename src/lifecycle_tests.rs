//! Tests for the suggestion lifecycle manager

use super::*;
use crate::analysis::Severity;
use crate::document::{DocumentError, RichTextDocument, TextLeaf};

fn suggestion(
    id: &str,
    kind: SuggestionKind,
    original: &str,
    suggested: &str,
    start: usize,
) -> Suggestion {
    Suggestion {
        id: id.to_string(),
        kind,
        severity: Severity::Medium,
        original_text: original.to_string(),
        suggested_text: suggested.to_string(),
        range: TextRange::new(start, start + original.chars().count()),
        explanation: String::new(),
        category: kind.label().to_string(),
        confidence: 0.8,
    }
}

fn grammar(id: &str, original: &str, suggested: &str, start: usize) -> Suggestion {
    suggestion(id, SuggestionKind::Grammar, original, suggested, start)
}

fn result_of(grammar: Vec<Suggestion>, style: Vec<Suggestion>) -> AnalysisResult {
    AnalysisResult {
        grammar_suggestions: grammar,
        style_suggestions: style,
        ..Default::default()
    }
}

fn manager() -> SuggestionManager {
    SuggestionManager::new(AnchorResolver::default(), &LifecycleConfig::default())
}

#[test]
fn test_students_scenario() {
    let mut doc = RichTextDocument::from_plain_text("The students goes to school.");
    let mut manager = manager();
    manager.replace_all(result_of(
        vec![grammar("g1", "students goes", "students go", 4)],
        vec![],
    ));

    let decorations = manager.render(&doc);
    assert_eq!(decorations.len(), 1);
    assert_eq!(decorations[0].range, TextRange::new(4, 17));
    assert_eq!(manager.get("g1").unwrap().state, SuggestionState::Displayed);

    assert!(manager.accept(&mut doc, "g1"));
    assert_eq!(doc.plain_text(), "The students go to school.");
    assert!(manager.is_empty());
    assert!(manager.decorations().is_empty());
}

#[test]
fn test_double_accept_applies_once() {
    let mut doc = RichTextDocument::from_plain_text("I has a cat.");
    let mut manager = manager();
    manager.replace_all(result_of(vec![grammar("g1", "I has", "I have", 0)], vec![]));
    manager.render(&doc);

    assert!(manager.accept(&mut doc, "g1"));
    assert!(!manager.accept(&mut doc, "g1"));
    assert_eq!(doc.plain_text(), "I have a cat.");
}

#[test]
fn test_replace_all_drops_duplicates_and_replaces_set() {
    let mut manager = manager();

    let kept = manager.replace_all(result_of(
        vec![
            grammar("a", "one", "1", 0),
            grammar("a", "two", "2", 4),
            grammar("b", "three", "3", 8),
        ],
        vec![],
    ));
    assert_eq!(kept, 2);
    assert_eq!(manager.get("a").unwrap().suggestion.original_text, "one");

    manager.replace_all(result_of(vec![grammar("c", "four", "4", 0)], vec![]));
    assert_eq!(manager.len(), 1);
    assert!(manager.get("a").is_none());
    assert_eq!(manager.get("c").unwrap().state, SuggestionState::Pending);
}

#[test]
fn test_min_confidence_filter() {
    let config = LifecycleConfig {
        min_confidence: 0.5,
        ..Default::default()
    };
    let mut manager = SuggestionManager::new(AnchorResolver::default(), &config);
    let mut unsure = grammar("unsure", "a", "b", 0);
    unsure.confidence = 0.3;

    manager.replace_all(result_of(vec![unsure, grammar("sure", "c", "d", 2)], vec![]));

    assert!(manager.get("unsure").is_none());
    assert!(manager.get("sure").is_some());
}

#[test]
fn test_render_drops_deleted_text_silently() {
    let doc = RichTextDocument::from_plain_text("The students go to school.");
    let mut manager = manager();
    manager.replace_all(result_of(
        vec![
            grammar("gone", "students goes", "students go", 4),
            grammar("here", "school", "college", 19),
        ],
        vec![],
    ));

    let decorations = manager.render(&doc);

    assert_eq!(decorations.len(), 1);
    assert_eq!(decorations[0].suggestion_id, "here");
    assert!(manager.get("gone").is_none());
}

#[test]
fn test_render_relocates_after_edits() {
    let doc = RichTextDocument::from_plain_text("New opening. The students goes to school.");
    let mut manager = manager();
    manager.replace_all(result_of(
        vec![grammar("g1", "students goes", "students go", 4)],
        vec![],
    ));

    let decorations = manager.render(&doc);

    assert_eq!(decorations[0].range, TextRange::new(17, 30));
}

#[test]
fn test_suggestion_at_position() {
    let doc = RichTextDocument::from_plain_text("Their going home now.");
    let mut manager = manager();
    manager.replace_all(result_of(
        vec![grammar("g1", "Their going", "They're going", 0)],
        vec![suggestion("s1", SuggestionKind::Style, "home now", "home", 12)],
    ));

    // Not displayed before the first render
    assert!(manager.suggestion_at(3).is_none());

    manager.render(&doc);
    assert_eq!(manager.suggestion_at(3).map(|s| s.id.as_str()), Some("g1"));
    assert_eq!(manager.suggestion_at(15).map(|s| s.id.as_str()), Some("s1"));
    assert!(manager.suggestion_at(11).is_none());
}

#[test]
fn test_accept_maps_remaining_anchors() {
    let mut doc = RichTextDocument::from_plain_text("We was there and they was here.");
    let mut manager = manager();
    manager.replace_all(result_of(
        vec![
            grammar("first", "We was", "We were", 0),
            grammar("second", "they was", "they were", 17),
        ],
        vec![],
    ));
    manager.render(&doc);

    assert!(manager.accept(&mut doc, "first"));

    let second = manager.get("second").unwrap();
    assert_eq!(second.anchor, Some(TextRange::new(18, 26)));
    assert_eq!(
        manager.decorations().iter().next().map(|d| d.range),
        Some(TextRange::new(18, 26))
    );

    assert!(manager.accept(&mut doc, "second"));
    assert_eq!(doc.plain_text(), "We were there and they were here.");
}

#[test]
fn test_accept_invalidates_overlapping_suggestions() {
    let mut doc = RichTextDocument::from_plain_text("He dont knows it.");
    let mut manager = manager();
    manager.replace_all(result_of(
        vec![
            grammar("neg", "dont knows", "doesn't know", 3),
            grammar("verb", "knows it", "know it", 8),
        ],
        vec![],
    ));
    manager.render(&doc);

    assert!(manager.accept(&mut doc, "neg"));
    assert_eq!(doc.plain_text(), "He doesn't know it.");
    assert!(manager.get("verb").is_none());
    assert!(!manager.accept(&mut doc, "verb"));
    assert_eq!(doc.plain_text(), "He doesn't know it.");
}

/// Document that can be read but refuses every edit
struct FrozenDocument(RichTextDocument);

impl DocumentModel for FrozenDocument {
    fn leaves(&self) -> Vec<TextLeaf> {
        self.0.leaves()
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn text_between(&self, from: usize, to: usize) -> Option<String> {
        self.0.text_between(from, to)
    }

    fn replace_range(
        &mut self,
        from: usize,
        to: usize,
        _text: &str,
    ) -> Result<EditStep, DocumentError> {
        Err(DocumentError::OutOfBounds {
            from,
            to,
            len: 0,
        })
    }
}

#[test]
fn test_failed_edit_keeps_suggestions_live() {
    let mut doc = FrozenDocument(RichTextDocument::from_plain_text("He dont knows it."));
    let mut manager = manager();
    manager.replace_all(result_of(
        vec![
            grammar("neg", "dont knows", "doesn't know", 3),
            grammar("verb", "knows it", "know it", 8),
        ],
        vec![],
    ));
    manager.render(&doc);

    assert!(!manager.accept(&mut doc, "neg"));

    assert_eq!(manager.len(), 2);
    assert_eq!(manager.get("neg").unwrap().state, SuggestionState::Displayed);
    assert!(manager.get("verb").is_some());
    assert_eq!(manager.decorations().len(), 2);
    assert_eq!(doc.0.plain_text(), "He dont knows it.");
}

#[test]
fn test_accept_of_vanished_text_invalidates() {
    let mut doc = RichTextDocument::from_plain_text("Teh cat sat.");
    let mut manager = manager();
    manager.replace_all(result_of(vec![grammar("g1", "Teh cat", "The cat", 0)], vec![]));
    manager.render(&doc);

    // The writer fixes it by hand before clicking accept
    doc.replace_range(0, 3, "The").unwrap();

    assert!(!manager.accept(&mut doc, "g1"));
    assert!(manager.get("g1").is_none());
    assert_eq!(doc.plain_text(), "The cat sat.");
}

#[test]
fn test_reject_removes_without_mutation() {
    let doc = RichTextDocument::from_plain_text("Some text here.");
    let mut manager = manager();
    manager.replace_all(result_of(vec![grammar("g1", "Some text", "A text", 0)], vec![]));
    manager.render(&doc);

    assert!(manager.reject("g1"));
    assert!(!manager.reject("g1"));
    assert!(manager.decorations().is_empty());
    assert_eq!(doc.plain_text(), "Some text here.");
}

#[test]
fn test_accept_all_reports_failures_without_aborting() {
    let mut doc = RichTextDocument::from_plain_text("alpha beta gamma delta");
    let mut manager = manager();
    manager.replace_all(result_of(
        vec![
            grammar("a", "alpha beta", "ALPHA BETA", 0),
            grammar("b", "beta gamma", "BETA GAMMA", 6),
            grammar("c", "missing words", "x", 0),
            grammar("d", "delta", "DELTA", 17),
        ],
        vec![suggestion("s", SuggestionKind::Style, "gamma", "GAMMA", 11)],
    ));

    let outcome = manager.accept_all(&mut doc, SuggestionKind::Grammar);

    // "b" overlaps "a" and "c" cannot be anchored
    assert_eq!(
        outcome,
        BulkOutcome {
            applied: 2,
            failed: 2
        }
    );
    assert_eq!(doc.plain_text(), "ALPHA BETA gamma DELTA");
    assert_eq!(manager.len(), 1);
    assert!(manager.get("s").is_some());
}

#[test]
fn test_reject_all_by_kind() {
    let mut manager = manager();
    manager.replace_all(result_of(
        vec![grammar("g1", "a", "b", 0), grammar("g2", "c", "d", 2)],
        vec![suggestion("s1", SuggestionKind::Style, "e", "f", 4)],
    ));

    let outcome = manager.reject_all(SuggestionKind::Grammar);

    assert_eq!(outcome.applied, 2);
    assert_eq!(manager.len(), 1);
    assert_eq!(manager.reject_all(SuggestionKind::Readability), BulkOutcome::default());
}

#[test]
fn test_sweep_drops_unfindable_suggestions() {
    let mut doc = RichTextDocument::from_plain_text("Keep this sentence. Drop that phrase.");
    let mut manager = manager();
    manager.replace_all(result_of(
        vec![
            grammar("keep", "this sentence", "the sentence", 5),
            grammar("drop", "that phrase", "the phrase", 25),
        ],
        vec![],
    ));
    manager.render(&doc);

    doc.replace_range(20, 37, "").unwrap();

    assert_eq!(manager.sweep(&doc), 1);
    assert!(manager.get("keep").is_some());
    assert!(manager.get("drop").is_none());
    assert_eq!(manager.decorations().len(), 1);
}

#[test]
fn test_tick_runs_sweep_when_due() {
    let doc = RichTextDocument::from_plain_text("Nothing matches.");
    let config = LifecycleConfig {
        sweep_interval_ms: 0,
        ..Default::default()
    };
    let mut manager = SuggestionManager::new(AnchorResolver::default(), &config);
    manager.replace_all(result_of(vec![grammar("g1", "absent", "x", 0)], vec![]));

    assert_eq!(manager.tick(&doc), Some(1));

    let mut slow = SuggestionManager::new(AnchorResolver::default(), &LifecycleConfig::default());
    slow.replace_all(result_of(vec![grammar("g1", "absent", "x", 0)], vec![]));
    assert_eq!(slow.tick(&doc), None);
    assert_eq!(slow.len(), 1);
}

#[test]
fn test_map_through_external_edit() {
    let mut doc = RichTextDocument::from_plain_text("Fix teh typo and teh other.");
    let mut manager = manager();
    manager.replace_all(result_of(
        vec![
            grammar("one", "teh typo", "the typo", 4),
            grammar("two", "teh other", "the other", 17),
        ],
        vec![],
    ));
    manager.render(&doc);

    // The writer edits the first typo by hand
    let step = doc.replace_range(4, 7, "the").unwrap();
    manager.map_through(&step);

    assert_eq!(manager.get("one").unwrap().anchor, None);
    assert_eq!(manager.get("one").unwrap().state, SuggestionState::Pending);
    assert_eq!(
        manager.get("two").unwrap().anchor,
        Some(TextRange::new(17, 26))
    );
    assert_eq!(manager.decorations().len(), 1);
}

//! Suggestion lifecycle manager
//!
//! Owns the live set of suggestions for one document. A suggestion arrives
//! `Pending`, becomes `Displayed` once it has been anchored, and leaves the
//! set as `Accepted`, `Rejected` or `Invalidated`. Anchors are cached between
//! renders but re-verified against the live text before anything is applied.

mod sweep;

use std::collections::HashSet;

pub use sweep::SweepTimer;

use crate::analysis::{AnalysisResult, Suggestion, SuggestionKind, TextRange};
use crate::anchor::{AnchorResolver, AnchorResult};
use crate::config::LifecycleConfig;
use crate::document::{Decoration, DecorationSet, DocumentModel, EditStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionState {
    Pending,
    Displayed,
    Accepted,
    Rejected,
    Invalidated,
}

#[derive(Debug, Clone)]
pub struct LiveSuggestion {
    pub suggestion: Suggestion,
    pub state: SuggestionState,
    /// Last verified location; cleared when an edit touches it
    pub anchor: Option<TextRange>,
}

/// Result of a bulk accept or reject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub applied: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct SuggestionManager {
    live: Vec<LiveSuggestion>,
    resolver: AnchorResolver,
    min_confidence: f32,
    sweep_timer: SweepTimer,
    decorations: DecorationSet,
}

impl SuggestionManager {
    pub fn new(resolver: AnchorResolver, config: &LifecycleConfig) -> Self {
        Self {
            live: Vec::new(),
            resolver,
            min_confidence: config.min_confidence,
            sweep_timer: SweepTimer::new(config.sweep_interval_ms),
            decorations: DecorationSet::default(),
        }
    }

    pub fn live(&self) -> &[LiveSuggestion] {
        &self.live
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&LiveSuggestion> {
        self.live.iter().find(|live| live.suggestion.id == id)
    }

    /// Decorations from the last render, kept in place across edits.
    pub fn decorations(&self) -> &DecorationSet {
        &self.decorations
    }

    /// Replace the whole live set with a new result. Returns how many were kept.
    pub fn replace_all(&mut self, result: AnalysisResult) -> usize {
        let mut seen = HashSet::new();
        let mut duplicates = 0;
        let mut low_confidence = 0;

        self.live = result
            .into_suggestions()
            .into_iter()
            .filter(|suggestion| {
                if !seen.insert(suggestion.id.clone()) {
                    duplicates += 1;
                    return false;
                }
                if suggestion.confidence < self.min_confidence {
                    low_confidence += 1;
                    return false;
                }
                true
            })
            .map(|suggestion| LiveSuggestion {
                suggestion,
                state: SuggestionState::Pending,
                anchor: None,
            })
            .collect();
        self.decorations = DecorationSet::default();

        if duplicates > 0 || low_confidence > 0 {
            log::debug!(
                "Dropped {} duplicate and {} low-confidence suggestions",
                duplicates,
                low_confidence
            );
        }
        self.live.len()
    }

    /// Anchor every live suggestion and build its decoration.
    ///
    /// Suggestions whose text is gone are invalidated and removed.
    pub fn render(&mut self, doc: &dyn DocumentModel) -> Vec<Decoration> {
        let resolver = self.resolver;
        let mut decorations = Vec::with_capacity(self.live.len());

        self.live.retain_mut(|live| match resolver.resolve(doc, &live.suggestion) {
            AnchorResult::Found(range) => {
                live.state = SuggestionState::Displayed;
                live.anchor = Some(range);
                decorations.push(Decoration {
                    range,
                    suggestion_id: live.suggestion.id.clone(),
                    kind: live.suggestion.kind,
                    severity: live.suggestion.severity,
                });
                true
            }
            AnchorResult::NotFound => {
                log::debug!("Anchor lost for suggestion {}", live.suggestion.id);
                live.state = SuggestionState::Invalidated;
                false
            }
        });

        self.decorations = DecorationSet::new(decorations);
        self.decorations.iter().cloned().collect()
    }

    /// Suggestion displayed at `pos`, for click handling.
    pub fn suggestion_at(&self, pos: usize) -> Option<&Suggestion> {
        self.live
            .iter()
            .filter(|live| live.state == SuggestionState::Displayed)
            .find(|live| live.anchor.is_some_and(|range| range.contains(pos)))
            .map(|live| &live.suggestion)
    }

    /// Apply a suggestion to the document.
    ///
    /// Returns `false` without touching the document when the suggestion is
    /// not live or its text can no longer be verified.
    pub fn accept(&mut self, doc: &mut dyn DocumentModel, id: &str) -> bool {
        let Some(index) = self.position(id) else {
            log::debug!("Accept of {} ignored, not live", id);
            return false;
        };

        let range = match self.resolver.resolve(&*doc, &self.live[index].suggestion) {
            AnchorResult::Found(range) => range,
            AnchorResult::NotFound => {
                log::debug!("Anchor lost for suggestion {} on accept", id);
                self.remove(index, SuggestionState::Invalidated);
                return false;
            }
        };

        let original = &self.live[index].suggestion.original_text;
        if doc.text_between(range.start, range.end).as_deref() != Some(original.as_str()) {
            log::warn!("Text at {} changed under suggestion {}", range, id);
            return false;
        }

        let overlapping = self.overlapping(&*doc, range, id);
        let replacement = self.live[index].suggestion.suggested_text.clone();

        // Nothing leaves the live set unless the document actually changed
        let step = match doc.replace_range(range.start, range.end, &replacement) {
            Ok(step) => step,
            Err(e) => {
                log::error!("Failed to apply suggestion {}: {}", id, e);
                return false;
            }
        };

        self.remove(index, SuggestionState::Accepted);
        self.invalidate(&overlapping, range);
        self.map_through(&step);
        log::debug!("Accepted suggestion {} at {}", id, range);
        true
    }

    pub fn reject(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(index) => {
                self.remove(index, SuggestionState::Rejected);
                true
            }
            None => false,
        }
    }

    /// Accept every live suggestion of `kind`, in order, without stopping at failures.
    pub fn accept_all(&mut self, doc: &mut dyn DocumentModel, kind: SuggestionKind) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        for id in self.ids_of(kind) {
            if self.accept(doc, &id) {
                outcome.applied += 1;
            } else {
                outcome.failed += 1;
            }
        }

        log::debug!(
            "Accepted {} {} suggestions, {} failed",
            outcome.applied,
            kind,
            outcome.failed
        );
        outcome
    }

    pub fn reject_all(&mut self, kind: SuggestionKind) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        for id in self.ids_of(kind) {
            if self.reject(&id) {
                outcome.applied += 1;
            } else {
                outcome.failed += 1;
            }
        }

        outcome
    }

    /// Drop every suggestion whose original text no longer occurs anywhere.
    pub fn sweep(&mut self, doc: &dyn DocumentModel) -> usize {
        let resolver = self.resolver;
        let mut stale = Vec::new();

        self.live.retain(|live| {
            let keep = !resolver
                .find_occurrences(doc, &live.suggestion.original_text)
                .is_empty();
            if !keep {
                stale.push(live.suggestion.id.clone());
            }
            keep
        });

        if !stale.is_empty() {
            log::debug!("Sweep removed {} stale suggestions", stale.len());
            self.drop_decorations(&stale);
        }
        stale.len()
    }

    /// Run the sweep if its interval has elapsed.
    pub fn tick(&mut self, doc: &dyn DocumentModel) -> Option<usize> {
        if !self.sweep_timer.is_due() {
            return None;
        }
        self.sweep_timer.mark_run();
        Some(self.sweep(doc))
    }

    /// Shift cached anchors and decorations through an edit made elsewhere.
    ///
    /// Anchors the edit touched are cleared and re-resolved on the next render.
    pub fn map_through(&mut self, step: &EditStep) {
        for live in &mut self.live {
            if let Some(range) = live.anchor {
                live.anchor = step.map_range(range);
                if live.anchor.is_none() {
                    live.state = SuggestionState::Pending;
                }
            }
        }
        self.decorations = self.decorations.map(step);
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.live.iter().position(|live| live.suggestion.id == id)
    }

    fn ids_of(&self, kind: SuggestionKind) -> Vec<String> {
        self.live
            .iter()
            .filter(|live| live.suggestion.kind == kind)
            .map(|live| live.suggestion.id.clone())
            .collect()
    }

    fn remove(&mut self, index: usize, state: SuggestionState) -> LiveSuggestion {
        let mut removed = self.live.remove(index);
        removed.state = state;
        self.drop_decorations(std::slice::from_ref(&removed.suggestion.id));
        removed
    }

    fn drop_decorations(&mut self, ids: &[String]) {
        let kept: Vec<Decoration> = self
            .decorations
            .iter()
            .filter(|decoration| !ids.contains(&decoration.suggestion_id))
            .cloned()
            .collect();
        self.decorations = DecorationSet::new(kept);
    }

    /// Ids of the other suggestions whose text overlaps `range`.
    fn overlapping(&self, doc: &dyn DocumentModel, range: TextRange, except: &str) -> Vec<String> {
        self.live
            .iter()
            .filter(|live| live.suggestion.id != except)
            .filter(|live| {
                let anchor = live
                    .anchor
                    .filter(|anchor| {
                        doc.text_between(anchor.start, anchor.end).as_deref()
                            == Some(live.suggestion.original_text.as_str())
                    })
                    .or_else(|| self.resolver.resolve(doc, &live.suggestion).range());
                anchor.is_some_and(|anchor| anchor.overlaps(&range))
            })
            .map(|live| live.suggestion.id.clone())
            .collect()
    }

    fn invalidate(&mut self, ids: &[String], range: TextRange) {
        if ids.is_empty() {
            return;
        }
        self.live.retain(|live| !ids.contains(&live.suggestion.id));
        log::debug!("Invalidated {} suggestions overlapping {}", ids.len(), range);
        self.drop_decorations(ids);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod lifecycle_tests;

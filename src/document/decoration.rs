use crate::analysis::{Severity, SuggestionKind, TextRange};

use super::EditStep;

/// Visual marker for one displayed suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    pub range: TextRange,
    pub suggestion_id: String,
    pub kind: SuggestionKind,
    pub severity: Severity,
}

/// Decorations ordered by start offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecorationSet {
    decorations: Vec<Decoration>,
}

impl DecorationSet {
    pub fn new(mut decorations: Vec<Decoration>) -> Self {
        decorations.sort_by_key(|d| (d.range.start, d.range.end));
        Self { decorations }
    }

    pub fn len(&self) -> usize {
        self.decorations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decoration> {
        self.decorations.iter()
    }

    /// First decoration covering `pos`.
    pub fn at(&self, pos: usize) -> Option<&Decoration> {
        self.decorations.iter().find(|d| d.range.contains(pos))
    }

    /// Keep decorations in place across an edit.
    ///
    /// Decorations whose text the edit touched are dropped; the next render
    /// decides whether they still apply.
    pub fn map(&self, step: &EditStep) -> Self {
        let decorations = self
            .decorations
            .iter()
            .filter_map(|decoration| {
                step.map_range(decoration.range).map(|range| Decoration {
                    range,
                    ..decoration.clone()
                })
            })
            .collect();
        Self { decorations }
    }

    pub fn into_vec(self) -> Vec<Decoration> {
        self.decorations
    }
}

impl From<Vec<Decoration>> for DecorationSet {
    fn from(decorations: Vec<Decoration>) -> Self {
        Self::new(decorations)
    }
}

//! Text anchor resolver
//!
//! Backend offsets describe the text as it was when analysis started. By the
//! time a suggestion is displayed or applied the writer may have typed more,
//! so every anchor is re-derived from the live document: trust the stated
//! range only if it still holds the original text, otherwise scan for the
//! text and pick the occurrence closest to where the backend saw it.

use memchr::memmem;

use crate::analysis::{Suggestion, TextRange};
use crate::config::AnchorConfig;
use crate::document::{DocumentModel, TextLeaf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorResult {
    Found(TextRange),
    NotFound,
}

impl AnchorResult {
    pub fn range(&self) -> Option<TextRange> {
        match self {
            AnchorResult::Found(range) => Some(*range),
            AnchorResult::NotFound => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorResolver {
    short_text_threshold: usize,
    max_distance: Option<usize>,
}

impl Default for AnchorResolver {
    fn default() -> Self {
        Self::from_config(&AnchorConfig::default())
    }
}

impl AnchorResolver {
    pub fn new(short_text_threshold: usize, max_distance: Option<usize>) -> Self {
        Self {
            short_text_threshold,
            max_distance,
        }
    }

    pub fn from_config(config: &AnchorConfig) -> Self {
        Self::new(config.short_text_threshold, config.max_distance)
    }

    /// Locate a suggestion's original text in the live document.
    pub fn resolve(&self, doc: &dyn DocumentModel, suggestion: &Suggestion) -> AnchorResult {
        let original = suggestion.original_text.as_str();
        let stated = suggestion.range;

        if stated.len() == original.chars().count()
            && doc.text_between(stated.start, stated.end).as_deref() == Some(original)
        {
            return AnchorResult::Found(stated);
        }

        let candidates = self.find_occurrences(doc, original);
        let Some(closest) = candidates
            .iter()
            .min_by_key(|range| range.start.abs_diff(stated.start))
        else {
            log::debug!("No occurrence of {:?} for {}", original, suggestion.id);
            return AnchorResult::NotFound;
        };

        let distance = closest.start.abs_diff(stated.start);
        if self.max_distance.is_some_and(|max| distance > max) {
            log::debug!(
                "Closest occurrence for {} is {} positions away, beyond the limit",
                suggestion.id,
                distance
            );
            return AnchorResult::NotFound;
        }

        AnchorResult::Found(*closest)
    }

    /// Every verified occurrence of `text`, in document order.
    ///
    /// Occurrences may overlap. Short texts only match as whole words.
    pub fn find_occurrences(&self, doc: &dyn DocumentModel, text: &str) -> Vec<TextRange> {
        if text.is_empty() {
            return Vec::new();
        }

        let needle_chars = text.chars().count();
        let whole_word = needle_chars <= self.short_text_threshold;
        let index = LeafIndex::new(doc.leaves());
        let finder = memmem::Finder::new(text.as_bytes());
        let haystack = index.text.as_bytes();

        let mut occurrences = Vec::new();
        let mut byte_pos = 0;
        let mut char_pos = 0;
        let mut search_from = 0;

        while let Some(found) = finder.find(&haystack[search_from..]) {
            let match_byte = search_from + found;
            char_pos += index.text[byte_pos..match_byte].chars().count();
            byte_pos = match_byte;
            search_from = match_byte + 1;

            let Some(range) = index.absolute_range(char_pos, needle_chars) else {
                continue;
            };
            if doc.text_between(range.start, range.end).as_deref() != Some(text) {
                continue;
            }
            if whole_word && !is_whole_word(doc, range) {
                continue;
            }
            occurrences.push(range);
        }

        occurrences
    }
}

/// Concatenated leaf text with each leaf's position in it.
struct LeafIndex {
    text: String,
    // (char offset in `text`, absolute document offset, char length)
    spans: Vec<(usize, usize, usize)>,
}

impl LeafIndex {
    fn new(leaves: Vec<TextLeaf>) -> Self {
        let mut text = String::new();
        let mut spans = Vec::with_capacity(leaves.len());
        let mut char_offset = 0;

        for leaf in leaves {
            let len = leaf.char_len();
            spans.push((char_offset, leaf.offset, len));
            text.push_str(&leaf.text);
            char_offset += len;
        }

        Self { text, spans }
    }

    fn absolute(&self, char_index: usize) -> Option<usize> {
        let span = self
            .spans
            .partition_point(|&(start, _, _)| start <= char_index)
            .checked_sub(1)?;
        let (start, offset, len) = self.spans[span];
        (char_index < start + len).then(|| offset + (char_index - start))
    }

    /// Document range of `len` concatenated characters starting at `char_index`.
    fn absolute_range(&self, char_index: usize, len: usize) -> Option<TextRange> {
        let start = self.absolute(char_index)?;
        let last = self.absolute(char_index + len - 1)?;
        Some(TextRange::new(start, last + 1))
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_whole_word(doc: &dyn DocumentModel, range: TextRange) -> bool {
    let boundary = |from: usize, to: usize| {
        doc.text_between(from, to)
            .and_then(|s| s.chars().next())
            .is_none_or(|c| !is_word_char(c))
    };

    let before_ok = range.start == 0 || boundary(range.start - 1, range.start);
    let after_ok = range.end >= doc.len() || boundary(range.end, range.end + 1);
    before_ok && after_ok
}

#[cfg(test)]
#[path = "anchor_tests.rs"]
mod anchor_tests;

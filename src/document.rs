//! Host document model
//!
//! Suggestions are anchored against whatever editor hosts them through the
//! [`DocumentModel`] trait. Positions are character offsets. A block boundary
//! occupies one position and belongs to no text leaf.

mod decoration;
mod mapping;
mod rich_text;

use thiserror::Error;

pub use decoration::{Decoration, DecorationSet};
pub use mapping::{Assoc, EditStep};
pub use rich_text::{Block, Mark, RichTextDocument, TextRun};

/// A contiguous run of text at an absolute document offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLeaf {
    pub offset: usize,
    pub text: String,
}

impl TextLeaf {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("Range {from}..{to} is outside the document (length {len})")]
    OutOfBounds { from: usize, to: usize, len: usize },

    #[error("Range start {from} is after its end {to}")]
    InvertedRange { from: usize, to: usize },
}

/// Read and edit access to a live document.
pub trait DocumentModel {
    /// Text leaves in document order with their absolute offsets.
    fn leaves(&self) -> Vec<TextLeaf>;

    /// Total number of positions, block boundaries included.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text in `[from, to)`. Block boundaries read as `'\n'`.
    ///
    /// Returns `None` for ranges outside the document.
    fn text_between(&self, from: usize, to: usize) -> Option<String>;

    /// Replace `[from, to)` with `text` as one atomic step.
    fn replace_range(&mut self, from: usize, to: usize, text: &str)
    -> Result<EditStep, DocumentError>;
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod document_tests;

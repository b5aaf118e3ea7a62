//! Reference rich-text document: blocks of formatted inline runs.

use super::{DocumentError, DocumentModel, EditStep, TextLeaf};

/// Inline formatting attached to a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Code,
    Link(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub marks: Vec<Mark>,
}

impl TextRun {
    pub fn new(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        Self {
            text: text.into(),
            marks,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A paragraph-like block. Runs are kept non-empty and merged when adjacent
/// runs share the same marks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    runs: Vec<TextRun>,
}

impl Block {
    pub fn new(runs: Vec<TextRun>) -> Self {
        let mut block = Self { runs: Vec::new() };
        for run in runs {
            block.push(run);
        }
        block
    }

    pub fn plain(text: &str) -> Self {
        Self::new(vec![TextRun::plain(text)])
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    pub fn char_len(&self) -> usize {
        self.runs.iter().map(TextRun::char_len).sum()
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    fn push(&mut self, run: TextRun) {
        if run.text.is_empty() {
            return;
        }
        match self.runs.last_mut() {
            Some(last) if last.marks == run.marks => last.text.push_str(&run.text),
            _ => self.runs.push(run),
        }
    }

    /// Split the runs at a character offset within the block.
    fn split_at(&self, at: usize) -> (Vec<TextRun>, Vec<TextRun>) {
        let mut head = Vec::new();
        let mut tail = Vec::new();
        let mut offset = 0;

        for run in &self.runs {
            let len = run.char_len();
            if offset + len <= at {
                head.push(run.clone());
            } else if offset >= at {
                tail.push(run.clone());
            } else {
                let split = byte_index(&run.text, at - offset);
                head.push(TextRun::new(&run.text[..split], run.marks.clone()));
                tail.push(TextRun::new(&run.text[split..], run.marks.clone()));
            }
            offset += len;
        }

        (head, tail)
    }

    /// Marks a character typed at `at` would get.
    fn marks_at(&self, at: usize) -> Vec<Mark> {
        let mut offset = 0;
        let mut before = None;

        for run in &self.runs {
            let len = run.char_len();
            if offset <= at && at < offset + len {
                return run.marks.clone();
            }
            if offset + len == at {
                before = Some(&run.marks);
            }
            offset += len;
        }

        before.cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichTextDocument {
    blocks: Vec<Block>,
}

impl Default for RichTextDocument {
    fn default() -> Self {
        Self {
            blocks: vec![Block::default()],
        }
    }
}

impl RichTextDocument {
    pub fn new(blocks: Vec<Block>) -> Self {
        if blocks.is_empty() {
            return Self::default();
        }
        Self { blocks }
    }

    /// One plain block per line.
    pub fn from_plain_text(text: &str) -> Self {
        Self::new(text.split('\n').map(Block::plain).collect())
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Document text with block boundaries as newlines.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Marks that text inserted at `pos` inherits.
    pub fn marks_at(&self, pos: usize) -> Vec<Mark> {
        let (index, offset) = self.locate(pos);
        self.blocks[index].marks_at(offset)
    }

    /// Block index and offset within it. The position right after a block's
    /// last character is that block's end, not the next block's start.
    fn locate(&self, pos: usize) -> (usize, usize) {
        let mut start = 0;
        for (index, block) in self.blocks.iter().enumerate() {
            let len = block.char_len();
            if pos <= start + len {
                return (index, pos.saturating_sub(start));
            }
            start += len + 1;
        }

        let last = self.blocks.len() - 1;
        (last, self.blocks[last].char_len())
    }

    fn check_range(&self, from: usize, to: usize) -> Result<(), DocumentError> {
        if from > to {
            return Err(DocumentError::InvertedRange { from, to });
        }
        let len = self.len();
        if to > len {
            return Err(DocumentError::OutOfBounds { from, to, len });
        }
        Ok(())
    }
}

impl DocumentModel for RichTextDocument {
    fn leaves(&self) -> Vec<TextLeaf> {
        let mut leaves = Vec::new();
        let mut block_start = 0;

        for block in &self.blocks {
            let mut offset = block_start;
            for run in &block.runs {
                leaves.push(TextLeaf {
                    offset,
                    text: run.text.clone(),
                });
                offset += run.char_len();
            }
            block_start += block.char_len() + 1;
        }

        leaves
    }

    fn len(&self) -> usize {
        let text: usize = self.blocks.iter().map(Block::char_len).sum();
        text + self.blocks.len() - 1
    }

    fn text_between(&self, from: usize, to: usize) -> Option<String> {
        self.check_range(from, to).ok()?;

        let mut text = String::new();
        let mut block_start = 0;
        let last = self.blocks.len() - 1;

        for (index, block) in self.blocks.iter().enumerate() {
            let len = block.char_len();
            let block_end = block_start + len;

            if from < block_end && block_start < to {
                let skip = from.saturating_sub(block_start);
                let take = to.min(block_end) - block_start - skip;
                text.extend(block.text().chars().skip(skip).take(take));
            }
            if index < last && from <= block_end && block_end < to {
                text.push('\n');
            }
            if block_end >= to {
                break;
            }
            block_start = block_end + 1;
        }

        Some(text)
    }

    fn replace_range(
        &mut self,
        from: usize,
        to: usize,
        text: &str,
    ) -> Result<EditStep, DocumentError> {
        self.check_range(from, to)?;

        let marks = self.marks_at(from);
        let (start_index, start_offset) = self.locate(from);
        let (end_index, end_offset) = self.locate(to);
        let (head, _) = self.blocks[start_index].split_at(start_offset);
        let (_, tail) = self.blocks[end_index].split_at(end_offset);

        let mut replacement = Vec::new();
        let mut current = Block::new(head);
        let mut lines = text.split('\n');
        if let Some(first) = lines.next() {
            current.push(TextRun::new(first, marks.clone()));
        }
        for line in lines {
            replacement.push(std::mem::take(&mut current));
            current.push(TextRun::new(line, marks.clone()));
        }
        for run in tail {
            current.push(run);
        }
        replacement.push(current);

        self.blocks.splice(start_index..=end_index, replacement);

        let step = EditStep::new(from, to, text.chars().count());
        log::debug!(
            "Replaced [{}, {}) with {} characters",
            from,
            to,
            step.inserted_len
        );
        Ok(step)
    }
}

/// Byte index of the `chars`-th character.
fn byte_index(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(index, _)| index)
}

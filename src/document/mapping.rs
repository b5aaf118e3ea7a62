use crate::analysis::TextRange;

/// Which side of an edit a position sticks to when the edit lands on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Before,
    After,
}

/// A single applied replacement: `[from, to)` became `inserted_len` positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditStep {
    pub from: usize,
    pub to: usize,
    pub inserted_len: usize,
}

impl EditStep {
    pub fn new(from: usize, to: usize, inserted_len: usize) -> Self {
        Self {
            from,
            to,
            inserted_len,
        }
    }

    pub fn replaced(&self) -> TextRange {
        TextRange::new(self.from, self.to)
    }

    pub fn deleted_len(&self) -> usize {
        self.to - self.from
    }

    /// Map a position in the old document to the new one.
    pub fn map_pos(&self, pos: usize, assoc: Assoc) -> usize {
        if self.from == self.to && pos == self.from {
            return match assoc {
                Assoc::Before => pos,
                Assoc::After => pos + self.inserted_len,
            };
        }

        if pos <= self.from {
            pos
        } else if pos >= self.to {
            pos - self.deleted_len() + self.inserted_len
        } else {
            match assoc {
                Assoc::Before => self.from,
                Assoc::After => self.from + self.inserted_len,
            }
        }
    }

    /// Map a range that the edit did not touch.
    ///
    /// Returns `None` when the edit overlaps the range or inserts inside it.
    pub fn map_range(&self, range: TextRange) -> Option<TextRange> {
        let touched = if self.from == self.to {
            range.start < self.from && self.from < range.end
        } else {
            range.overlaps(&self.replaced())
        };
        if touched {
            return None;
        }

        Some(TextRange::new(
            self.map_pos(range.start, Assoc::After),
            self.map_pos(range.end, Assoc::Before),
        ))
    }
}

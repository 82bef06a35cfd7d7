//! Offset and range arithmetic
//!
//! Every position handed out by this crate is a character offset into the
//! original document text, with an exclusive end. Internally the YAML parser
//! and the expression scanner work on byte offsets; [`CharIndex`] converts
//! between the two.

use tower_lsp::lsp_types::{Position, Range};

/// A `[start, end)` character range into the original text.
pub type Span = (usize, usize);

/// Whether `offset` falls inside `span` (end inclusive, so a cursor placed
/// right after a token still belongs to it).
pub fn span_contains(span: Span, offset: usize) -> bool {
    span.0 <= offset && offset <= span.1
}

/// Number of characters in `text[..byte]`.
pub fn char_offset(text: &str, byte: usize) -> usize {
    text[..byte.min(text.len())].chars().count()
}

/// Byte to character offset conversion for one document.
///
/// ASCII documents map offsets one to one; otherwise a per-byte table is
/// built once.
#[derive(Debug, Clone)]
pub struct CharIndex {
    table: Option<Vec<usize>>,
    len: usize,
}

impl CharIndex {
    pub fn new(text: &str) -> Self {
        if text.is_ascii() {
            return Self {
                table: None,
                len: text.len(),
            };
        }

        let mut table = Vec::with_capacity(text.len() + 1);
        for (chars, ch) in text.chars().enumerate() {
            for _ in 0..ch.len_utf8() {
                table.push(chars);
            }
        }
        let total = text.chars().count();
        table.push(total);

        Self {
            table: Some(table),
            len: total,
        }
    }

    /// Convert a byte offset into a character offset.
    pub fn to_char(&self, byte: usize) -> usize {
        match &self.table {
            None => byte.min(self.len),
            Some(table) => table
                .get(byte)
                .copied()
                .unwrap_or(self.len),
        }
    }

    /// Length of the document in characters.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Line index for converting character offsets to editor positions.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Character offset of the start of every line
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        let mut len = 0;
        for (i, ch) in text.chars().enumerate() {
            if ch == '\n' {
                line_starts.push(i + 1);
            }
            len = i + 1;
        }
        Self { line_starts, len }
    }

    /// Convert a character offset to a 0-indexed (line, column) pair.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        Position {
            line: line as u32,
            character: (offset - self.line_starts[line]) as u32,
        }
    }

    /// Convert a (line, column) pair back to a character offset.
    pub fn offset(&self, position: Position) -> usize {
        let line = position.line as usize;
        match self.line_starts.get(line) {
            Some(start) => {
                let line_end = self
                    .line_starts
                    .get(line + 1)
                    .map(|next| next - 1)
                    .unwrap_or(self.len);
                (start + position.character as usize).min(line_end)
            }
            None => self.len,
        }
    }

    pub fn range(&self, span: Span) -> Range {
        Range {
            start: self.position(span.0),
            end: self.position(span.1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_index_ascii() {
        let index = CharIndex::new("on: push");
        assert_eq!(index.to_char(0), 0);
        assert_eq!(index.to_char(4), 4);
        assert_eq!(index.to_char(100), 8);
    }

    #[test]
    fn test_char_index_multibyte() {
        // 'é' is two bytes
        let index = CharIndex::new("a: é b");
        assert_eq!(index.to_char(3), 3);
        assert_eq!(index.to_char(5), 4);
        assert_eq!(index.to_char(6), 5);
        assert_eq!(index.len(), 6);
    }

    #[test]
    fn test_line_index_round_trip() {
        let index = LineIndex::new("line1\nline2\nline3");
        assert_eq!(index.position(0), Position::new(0, 0));
        assert_eq!(index.position(5), Position::new(0, 5));
        assert_eq!(index.position(6), Position::new(1, 0));
        assert_eq!(index.position(10), Position::new(1, 4));
        assert_eq!(index.offset(Position::new(1, 4)), 10);
        assert_eq!(index.offset(Position::new(2, 99)), 17);
    }

    #[test]
    fn test_span_helpers() {
        assert!(span_contains((3, 7), 3));
        assert!(span_contains((3, 7), 7));
        assert!(!span_contains((3, 7), 8));
        assert_eq!(char_offset("aé b", 4), 3);
    }
}

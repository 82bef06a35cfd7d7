//! `${{ ... }}` marker detection
//!
//! Scans scalar text for embedded expressions. The scanner tracks quote
//! state, so a `}}` inside a single-quoted string literal does not close the
//! marker early (e.g. `${{ format('{{0}}', x) }}`).

/// A complete `${{ ... }}` marker found in a scalar.
///
/// Offsets are byte offsets into the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker<'a> {
    /// Source between the delimiters, untrimmed
    pub expression: &'a str,
    /// Start of `${{`
    pub start: usize,
    /// End of `}}` (exclusive)
    pub end: usize,
}

impl Marker<'_> {
    /// Byte offset of [`Marker::expression`] within the scanned text.
    pub fn expression_offset(&self) -> usize {
        self.start + OPEN.len()
    }
}

/// A `${{` with no closing `}}`; spans to the end of the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unterminated {
    pub start: usize,
    pub end: usize,
}

const OPEN: &str = "${{";
const CLOSE: &[u8] = b"}}";

/// Lazily iterate over the markers in `text`.
///
/// The iterator is finite and cheap to clone; an unterminated marker is the
/// last item produced.
pub fn markers(text: &str) -> Markers<'_> {
    Markers {
        text,
        pos: 0,
        done: false,
    }
}

/// Whether `text` contains at least one marker opening.
pub fn has_markers(text: &str) -> bool {
    text.contains(OPEN)
}

#[derive(Debug, Clone)]
pub struct Markers<'a> {
    text: &'a str,
    pos: usize,
    done: bool,
}

impl<'a> Iterator for Markers<'a> {
    type Item = Result<Marker<'a>, Unterminated>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let start = match self.text[self.pos..].find(OPEN) {
            Some(found) => self.pos + found,
            None => {
                self.done = true;
                return None;
            }
        };

        match find_marker_end(self.text, start + OPEN.len()) {
            Some(end) => {
                self.pos = end;
                Some(Ok(Marker {
                    expression: &self.text[start + OPEN.len()..end - CLOSE.len()],
                    start,
                    end,
                }))
            }
            None => {
                self.done = true;
                Some(Err(Unterminated {
                    start,
                    end: self.text.len(),
                }))
            }
        }
    }
}

/// Find the end (exclusive) of the `}}` closing a marker whose body starts
/// at `from`. Single-quoted strings are skipped; `''` inside them is an
/// escaped quote.
fn find_marker_end(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut i = from;
    let mut in_string = false;

    while i < len {
        match bytes[i] {
            b'\'' if in_string => {
                if bytes.get(i + 1) == Some(&b'\'') {
                    // Escaped quote
                    i += 1;
                } else {
                    in_string = false;
                }
            }
            b'\'' => in_string = true,
            b'}' if !in_string && bytes.get(i + 1) == Some(&CLOSE[1]) => {
                return Some(i + CLOSE.len());
            }
            _ => {}
        }
        i += 1;
    }

    None
}

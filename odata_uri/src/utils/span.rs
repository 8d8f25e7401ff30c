//! Location tracking inside a single query option or path segment
//!
//! Query option text never spans lines, so a position is a byte offset plus a
//! 1-based character column. Columns are what gets reported back to callers.
use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in option text
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Position {
    /// Byte offset from start of input (0-based)
    pub offset: usize,
    /// Character column (1-based)
    pub column: u32,
}

impl Position {
    pub fn new(offset: usize, column: u32) -> Self {
        Self { offset, column }
    }

    pub fn start() -> Self {
        Self {
            offset: 0,
            column: 1,
        }
    }

    /// Advance position by one character
    pub fn advance(self, ch: char) -> Self {
        Self {
            offset: self.offset + ch.len_utf8(),
            column: self.column + 1,
        }
    }

    pub fn advance_str(self, s: &str) -> Self {
        s.chars().fold(self, |pos, ch| pos.advance(ch))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column {}", self.column)
    }
}

/// A span of option text from start (inclusive) to end (exclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        debug_assert!(
            start.offset <= end.offset,
            "Span start must not be after end"
        );
        Self { start, end }
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    /// Create a zero-width span at a position
    pub fn point(pos: Position) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    /// Merge two spans into one covering both
    pub fn merge(self, other: Self) -> Self {
        let start = if self.start.offset < other.start.offset {
            self.start
        } else {
            other.start
        };

        let end = if self.end.offset > other.end.offset {
            self.end
        } else {
            other.end
        };

        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.offset - self.start.offset
    }

    pub fn is_empty(&self) -> bool {
        self.start.offset == self.end.offset
    }

    /// Get the source text for this span, or an empty string if out of range
    pub fn slice<'a>(&self, input: &'a str) -> &'a str {
        input.get(self.start.offset..self.end.offset).unwrap_or("")
    }

    /// Span for generated nodes with no source text
    pub fn dummy() -> Self {
        Self {
            start: Position::start(),
            end: Position::start(),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "columns {}-{}", self.start.column, self.end.column)
    }
}

/// A value with its source location
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: Span) -> Self {
        Self { value, span }
    }

    /// Map the value while preserving the span
    pub fn map<U, F>(self, f: F) -> Spanned<U>
    where
        F: FnOnce(T) -> U,
    {
        Spanned {
            value: f(self.value),
            span: self.span,
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: fmt::Display> fmt::Display for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Format a message with the offending option text underlined
pub fn format_excerpt(source: &str, span: &Span, message: &str) -> String {
    let mut result = String::new();
    result.push_str(&format!("error: {}\n", message));
    result.push_str(&format!("  --> {}\n", span.start));
    result.push_str("   |\n");
    result.push_str(&format!("   | {}\n", source));

    let mut underline = String::from("   | ");
    for _ in 1..span.start.column {
        underline.push(' ');
    }
    let width = (span.end.column.saturating_sub(span.start.column)) as usize;
    for _ in 0..width.max(1) {
        underline.push('^');
    }
    result.push_str(&underline);
    result.push('\n');
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_advance_counts_characters() {
        let pos = Position::start().advance_str("Name,Zip");
        assert_eq!(pos.offset, 8);
        assert_eq!(pos.column, 9);

        let pos = Position::start().advance('é');
        assert_eq!(pos.offset, 2);
        assert_eq!(pos.column, 2);
    }

    #[test]
    fn test_span_merge_and_slice() {
        let source = "Districts($select=Name)";
        let a = Span::new(Position::new(0, 1), Position::new(9, 10));
        let b = Span::new(Position::new(18, 19), Position::new(22, 23));
        let merged = a.merge(b);
        assert_eq!(merged.slice(source), "Districts($select=Name");
        assert_eq!(merged.len(), 22);
        assert!(!merged.is_empty());
    }

    #[test]
    fn test_slice_out_of_range_is_empty() {
        let span = Span::new(Position::new(4, 5), Position::new(40, 41));
        assert_eq!(span.slice("abc"), "");
    }

    #[test]
    fn test_format_excerpt_underlines_span() {
        let span = Span::new(Position::new(5, 6), Position::new(8, 9));
        let rendered = format_excerpt("Name,Zi$", &span, "unexpected token");
        assert!(rendered.contains("error: unexpected token"));
        assert!(rendered.contains("column 6"));
        assert!(rendered.contains("^^^"));
    }
}

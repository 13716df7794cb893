//! Source locations
//!
//! AST nodes and tokens carry plain byte spans ([`Span`]). Line and column positions are
//! only needed when something is reported to a person, so the conversion is done lazily by
//! [`SourceLocation`] when diagnostics are rendered.

use serde::Serialize;
use std::fmt;
use std::ops::Range as ByteRange;

/// Byte offsets into the MLM source.
pub type Span = ByteRange<usize>;

/// A zero-based line:column position in source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Displayed one-based, like editors do
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// Fast conversion from byte offsets to line/column positions.
pub struct SourceLocation {
    /// Byte offsets where each line starts
    line_starts: Vec<usize>,
}

impl SourceLocation {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (byte_pos, ch) in source.char_indices() {
            if ch == '\n' {
                line_starts.push(byte_pos + 1);
            }
        }
        Self { line_starts }
    }

    pub fn byte_to_position(&self, byte_offset: usize) -> Position {
        let line = self
            .line_starts
            .binary_search(&byte_offset)
            .unwrap_or_else(|i| i - 1);
        Position::new(line, byte_offset - self.line_starts[line])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_to_position_multiline() {
        let loc = SourceLocation::new("title: a;;\nlogic:\n  conclude true;;");
        assert_eq!(loc.byte_to_position(0), Position::new(0, 0));
        assert_eq!(loc.byte_to_position(11), Position::new(1, 0));
        assert_eq!(loc.byte_to_position(20), Position::new(2, 2));
    }

    #[test]
    fn test_position_display_is_one_based() {
        assert_eq!(Position::new(0, 4).to_string(), "1:5");
        let loc = SourceLocation::new("ab\ncd");
        assert_eq!(loc.byte_to_position(5).to_string(), "2:3");
    }
}

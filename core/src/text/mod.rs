use std::fmt;

use serde::{Deserialize, Serialize};

/// Zero-based line / character position. `character` counts UTF-16 code units,
/// matching what editors send over the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }

    pub fn start() -> Self {
        Self { line: 0, character: 0 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.character + 1)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn single(pos: Position) -> Self {
        Self { start: pos, end: pos }
    }

    /// Range covering `start..end` columns of one line.
    pub fn on_line(line: u32, start: u32, end: u32) -> Self {
        Self {
            start: Position::new(line, start),
            end: Position::new(line, end),
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(
                f,
                "{}:{}-{}",
                self.start.line + 1,
                self.start.character + 1,
                self.end.character + 1
            )
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Length of `text` in UTF-16 code units.
pub fn utf16_len(text: &str) -> u32 {
    text.chars().map(|c| c.len_utf16() as u32).sum()
}

/// Byte offset inside `text` for a UTF-16 column, clamped to the end of the text.
/// A column that lands inside a surrogate pair snaps back to the start of that char.
pub fn byte_offset_at(text: &str, column: u32) -> usize {
    if text.is_ascii() {
        return (column as usize).min(text.len());
    }
    let mut seen = 0u32;
    for (idx, ch) in text.char_indices() {
        let width = ch.len_utf16() as u32;
        if seen + width > column {
            return idx;
        }
        seen += width;
    }
    text.len()
}

/// UTF-16 column of a byte offset inside `text`.
pub fn column_at(text: &str, byte_offset: usize) -> u32 {
    let end = byte_offset.min(text.len());
    match text.get(..end) {
        Some(prefix) => utf16_len(prefix),
        None => utf16_len(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_columns_clamp_to_line_end() {
        assert_eq!(byte_offset_at("TEST.VALUE:", 4), 4);
        assert_eq!(byte_offset_at("TEST.", 40), 5);
    }

    #[test]
    fn wide_chars_count_two_units() {
        let line = "-- 😀 note";
        // the emoji occupies columns 3 and 4
        assert_eq!(byte_offset_at(line, 3), 3);
        assert_eq!(byte_offset_at(line, 4), 3);
        assert_eq!(byte_offset_at(line, 5), 7);
        assert_eq!(column_at(line, 7), 5);
        assert_eq!(utf16_len(line), 10);
    }

    #[test]
    fn range_display_is_one_based() {
        let range = Range::on_line(2, 0, 5);
        assert_eq!(range.to_string(), "3:1-6");
    }
}

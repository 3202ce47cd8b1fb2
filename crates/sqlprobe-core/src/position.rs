//! Source positions and line/column to byte-offset arithmetic
//!
//! Positions are 1-based and end-inclusive. A coordinate of zero or below
//! means "unknown". All offset math here is character-aware: columns count
//! characters, returned indexes are byte offsets into the text.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a line/column coordinate does not map into the text it is
/// supposed to describe. This indicates a bug upstream (or here), not a
/// legitimate test outcome, so callers abort the current check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("line {line} is out of range for the text")]
    LineOutOfRange { line: i32 },

    #[error("column {column} is out of range on line {line}")]
    ColumnOutOfRange { line: i32, column: i32 },

    #[error("position [{0}] does not describe a span in the text")]
    InvalidSpan(SourcePosition),
}

/// A span in query text.
///
/// `(start_line, start_column)` through `(end_line, end_column)`, 1-based,
/// end-inclusive. The parser-error end sentinel (line 100, column 99) is a
/// valid-but-unknown end marker and is distinct from "no position at all".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    pub start_line: i32,
    pub start_column: i32,
    pub end_line: i32,
    pub end_column: i32,
}

impl SourcePosition {
    /// The absent position: all coordinates unknown.
    pub const NONE: SourcePosition = SourcePosition {
        start_line: -1,
        start_column: -1,
        end_line: -1,
        end_column: -1,
    };

    pub fn new(start_line: i32, start_column: i32, end_line: i32, end_column: i32) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// A zero-width position: start and end at the same character.
    pub fn point(line: i32, column: i32) -> Self {
        Self::new(line, column, line, column)
    }

    /// True when all four coordinates are resolved.
    pub fn is_valid(&self) -> bool {
        self.start_line > 0 && self.start_column > 0 && self.end_line > 0 && self.end_column > 0
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {} col {} thru line {} col {}",
            self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}

/// Byte offset of the character at 1-based `(line, column)` in `text`.
///
/// A column one past the end of a line is allowed and addresses the line
/// terminator (or end of text on the last line); exclusive span ends rely
/// on this.
pub fn line_col_to_index(text: &str, line: i32, column: i32) -> Result<usize, PositionError> {
    if line <= 0 {
        return Err(PositionError::LineOutOfRange { line });
    }
    if column <= 0 {
        return Err(PositionError::ColumnOutOfRange { line, column });
    }

    let mut offset = 0usize;
    for _ in 1..line {
        match text[offset..].find('\n') {
            Some(nl) => offset += nl + 1,
            None => return Err(PositionError::LineOutOfRange { line }),
        }
    }

    let mut col = 1;
    for (i, ch) in text[offset..].char_indices() {
        if col == column {
            return Ok(offset + i);
        }
        if ch == '\n' {
            return Err(PositionError::ColumnOutOfRange { line, column });
        }
        col += 1;
    }
    // One past the last character of the final line.
    if col == column {
        Ok(text.len())
    } else {
        Err(PositionError::ColumnOutOfRange { line, column })
    }
}

/// Inverse of [`line_col_to_index`]: 1-based line/column of the character
/// starting at byte `index`. Indexes past the end of the text clamp to one
/// past the last character.
pub fn index_to_line_col(text: &str, index: usize) -> (i32, i32) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in text.char_indices() {
        if i >= index {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// Byte range of an end-inclusive position within `text`. The returned
/// range end is one past the last character of the span.
pub fn span_to_byte_range(text: &str, pos: SourcePosition) -> Result<Range<usize>, PositionError> {
    if !pos.is_valid() {
        return Err(PositionError::InvalidSpan(pos));
    }
    let start = line_col_to_index(text, pos.start_line, pos.start_column)?;
    let last = line_col_to_index(text, pos.end_line, pos.end_column)?;
    let last_char = text[last..]
        .chars()
        .next()
        .ok_or(PositionError::ColumnOutOfRange {
            line: pos.end_line,
            column: pos.end_column,
        })?;
    let end = last + last_char.len_utf8();
    if end <= start {
        return Err(PositionError::InvalidSpan(pos));
    }
    Ok(start..end)
}

/// Renders `text` with `^` markers around the span from
/// `(start_line, start_col)` to `(end_line, end_col)`, where the end column
/// is EXCLUSIVE. Start == end renders a single caret. Coordinates that fall
/// outside the text clamp to its end, so the unresolved-end sentinel still
/// renders something usable in a diagnostic.
pub fn add_carets(
    text: &str,
    start_line: i32,
    start_col: i32,
    end_line: i32,
    end_col: i32,
) -> String {
    let clamp = |line: i32, col: i32| line_col_to_index(text, line, col).unwrap_or(text.len());
    let start = clamp(start_line, start_col);
    if (start_line, start_col) == (end_line, end_col) {
        return format!("{}^{}", &text[..start], &text[start..]);
    }
    let end = clamp(end_line, end_col).max(start);
    format!("{}^{}^{}", &text[..start], &text[start..end], &text[end..])
}

//! Caret-annotated query fixtures
//!
//! Test inputs mark the expected error span with `^...^`. Stripping the
//! carets must leave every other character offset untouched, so the
//! recorded position can later be compared against what the engine reports
//! on the stripped text.

use thiserror::Error;

use crate::position::{index_to_line_col, SourcePosition};

/// A malformed fixture. This is a broken test, not a test failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaretError {
    #[error("query contains more than one caret span: [{0}]")]
    MultipleSpans(String),
}

/// Query text with its caret markers stripped and the marked span recorded.
///
/// No carets means no expected position. A lone caret (or the degenerate
/// `^^`) marks a zero-width point position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedQuery {
    /// The query with carets removed.
    pub sql: String,

    /// The span the carets delimited, if any. End-inclusive.
    pub pos: Option<SourcePosition>,
}

impl AnnotatedQuery {
    pub fn parse(text: &str) -> Result<Self, CaretError> {
        let Some(first) = text.find('^') else {
            return Ok(Self {
                sql: text.to_string(),
                pos: None,
            });
        };
        let Some(offset) = text[first + 1..].find('^') else {
            let sql = format!("{}{}", &text[..first], &text[first + 1..]);
            let (line, column) = index_to_line_col(&sql, first);
            return Ok(Self {
                sql,
                pos: Some(SourcePosition::point(line, column)),
            });
        };
        let second = first + 1 + offset;
        if text[second + 1..].contains('^') {
            return Err(CaretError::MultipleSpans(text.to_string()));
        }

        let sql = format!(
            "{}{}{}",
            &text[..first],
            &text[first + 1..second],
            &text[second + 1..]
        );
        let (start_line, start_column) = index_to_line_col(&sql, first);
        let pos = if second == first + 1 {
            SourcePosition::point(start_line, start_column)
        } else {
            // In the stripped text the span occupies bytes first..second-1;
            // the inclusive end is the start of its last character.
            let span = &sql[first..second - 1];
            let last = second - 1 - span.chars().next_back().map_or(0, char::len_utf8);
            let (end_line, end_column) = index_to_line_col(&sql, last);
            SourcePosition::new(start_line, start_column, end_line, end_column)
        };
        Ok(Self {
            sql,
            pos: Some(pos),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::add_carets;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_carets_means_no_position() {
        let aq = AnnotatedQuery::parse("SELECT * FROM emp").unwrap();
        assert_eq!(aq.sql, "SELECT * FROM emp");
        assert_eq!(aq.pos, None);
    }

    #[test]
    fn caret_pair_records_an_inclusive_span() {
        let aq = AnnotatedQuery::parse("values (^foo^)").unwrap();
        assert_eq!(aq.sql, "values (foo)");
        assert_eq!(aq.pos, Some(SourcePosition::new(1, 9, 1, 11)));
    }

    #[test]
    fn single_caret_records_a_point() {
        let aq = AnnotatedQuery::parse("values (1 +^").unwrap();
        assert_eq!(aq.sql, "values (1 +");
        assert_eq!(aq.pos, Some(SourcePosition::point(1, 12)));
    }

    #[test]
    fn adjacent_carets_degenerate_to_a_point() {
        let aq = AnnotatedQuery::parse("values (^^1)").unwrap();
        assert_eq!(aq.sql, "values (1)");
        assert_eq!(aq.pos, Some(SourcePosition::point(1, 9)));
    }

    #[test]
    fn span_across_lines() {
        let aq = AnnotatedQuery::parse("select ^a,\nb^ from t").unwrap();
        assert_eq!(aq.sql, "select a,\nb from t");
        assert_eq!(aq.pos, Some(SourcePosition::new(1, 8, 2, 1)));
    }

    #[test]
    fn more_than_one_span_is_a_broken_fixture() {
        assert_eq!(
            AnnotatedQuery::parse("values (^1^ + ^2^)"),
            Err(CaretError::MultipleSpans(
                "values (^1^ + ^2^)".to_string()
            ))
        );
    }

    #[test]
    fn strip_then_rerender_is_byte_identical() {
        // Re-rendering carets at the recorded coordinates (end converted
        // back to exclusive) must reproduce the original annotated text.
        for text in [
            "values (^foo^)",
            "select ^a,\nb^ from t",
            "VALUES (^'déjà vu'^)",
            "values (1 +^",
        ] {
            let aq = AnnotatedQuery::parse(text).unwrap();
            let pos = aq.pos.unwrap();
            let (end_line, end_col) = if pos.start_line == pos.end_line
                && pos.start_column == pos.end_column
            {
                (pos.end_line, pos.end_column)
            } else {
                (pos.end_line, pos.end_column + 1)
            };
            let rendered = add_carets(
                &aq.sql,
                pos.start_line,
                pos.start_column,
                end_line,
                end_col,
            );
            assert_eq!(rendered, text);
        }
    }
}

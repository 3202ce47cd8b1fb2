//! Positional diagnostic verifier
//!
//! Given a raised error (or none), an expected message pattern, and a
//! caret-annotated query, decides whether the error is the one the fixture
//! expects. Position assertions are opt-in via caret markers, but once
//! present they must resolve exactly.

use std::error::Error as StdError;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use sqlprobe_core::{add_carets, AnnotatedQuery, SourcePosition};
use sqlprobe_sql::{ContextError, ParseError};

/// `At line L, column C` — a start with no known end.
static LINE_COL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^At line ([0-9]+), column ([0-9]+)$").expect("hard-coded regex")
});

/// `From line .. to line ..: msg` — a full span, with the real message in
/// the trailing group.
static LINE_COL_TWICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)^From line ([0-9]+), column ([0-9]+) to line ([0-9]+), column ([0-9]+): (.*)$",
    )
    .expect("hard-coded regex")
});

/// Sentinel end for "the error has a start but no known end". Valid as a
/// coordinate, deliberately distinct from "no position".
const UNKNOWN_END_LINE: i32 = 100;
const UNKNOWN_END_COLUMN: i32 = 99;

/// Message and position extracted from a raised error. Derived fresh per
/// check, never retained.
#[derive(Debug, Clone)]
pub struct DiagnosticOutcome {
    pub message: String,
    pub pos: SourcePosition,
}

/// A failed check, with enough context to read off what went wrong.
#[derive(Debug, Error)]
pub enum VerifyFailure {
    /// An error was expected; the query succeeded.
    #[error("expected query to throw exception, but it did not; query [{query}]; expected [{expected}]")]
    ExpectedException { query: String, expected: String },

    /// No error was expected; one was raised anyway.
    #[error("query threw unexpected exception; query [{query}]; exception [{message}]; pos [{pos}]")]
    UnexpectedException {
        query: String,
        message: String,
        pos: SourcePosition,
    },

    /// The expected pattern itself does not compile. A broken fixture, not
    /// a test outcome.
    #[error("expected message pattern [{pattern}] is not a valid regex: {source}")]
    BadPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The raised message does not match the expected pattern.
    /// `actual_as_regexp` is escaped and quoted for direct copy-paste into
    /// a new expected pattern.
    #[error(
        "query threw different exception than expected; query [{query}];\n expected pattern [{expected}];\n actual [{actual}];\n actual as regexp [{actual_as_regexp}];\n pos [{pos}]; sql [{sql_with_carets}]"
    )]
    MessageMismatch {
        query: String,
        expected: String,
        actual: String,
        actual_as_regexp: String,
        pos: SourcePosition,
        sql_with_carets: String,
    },

    /// Right message, wrong span.
    #[error(
        "query threw expected exception [{message}];\nbut at pos [{pos}], not the expected [{expected_pos}];\nactual sql [{sql_with_carets}];\nexpected sql [{expected_sql_with_carets}]"
    )]
    PositionMismatch {
        message: String,
        pos: SourcePosition,
        expected_pos: SourcePosition,
        sql_with_carets: String,
        expected_sql_with_carets: String,
    },

    /// The fixture carried carets but the error's position never resolved.
    #[error("expected error to have position, but actual error did not; actual pos [{pos}]")]
    MissingPosition { pos: SourcePosition },

    /// The error carried a position but the fixture never asked for one.
    #[error(
        "actual error had a position, but expected error did not; add error position carets to sql:\n{sql_with_carets}"
    )]
    UnexpectedPosition { sql_with_carets: String },
}

/// Checks whether a raised error matches the expected pattern and, if the
/// annotated query carries an error span, that the reported position lands
/// exactly on it.
pub fn verify(
    raised: Option<&(dyn StdError + 'static)>,
    expected_pattern: Option<&str>,
    annotated: &AnnotatedQuery,
) -> Result<(), VerifyFailure> {
    let Some(raised) = raised else {
        return match expected_pattern {
            None => Ok(()),
            Some(expected) => Err(VerifyFailure::ExpectedException {
                query: annotated.sql.clone(),
                expected: expected.to_string(),
            }),
        };
    };

    let outcome = locate(raised);
    debug!(pos = %outcome.pos, "resolved diagnostic outcome");

    let Some(expected) = expected_pattern else {
        return Err(VerifyFailure::UnexpectedException {
            query: annotated.sql.clone(),
            message: outcome.message,
            pos: outcome.pos,
        });
    };

    // Whole-string match, like the fixtures assume.
    let pattern =
        Regex::new(&format!("^(?:{expected})$")).map_err(|source| VerifyFailure::BadPattern {
            pattern: expected.to_string(),
            source,
        })?;

    let sql_with_carets = if outcome.pos.is_valid() {
        add_carets(
            &annotated.sql,
            outcome.pos.start_line,
            outcome.pos.start_column,
            outcome.pos.end_line,
            outcome.pos.end_column + 1,
        )
    } else {
        annotated.sql.clone()
    };

    if !pattern.is_match(&outcome.message) {
        return Err(VerifyFailure::MessageMismatch {
            query: annotated.sql.clone(),
            expected: expected.to_string(),
            actual: outcome.message.clone(),
            actual_as_regexp: format!("{:?}", regex::escape(&outcome.message)),
            pos: outcome.pos,
            sql_with_carets,
        });
    }

    match (annotated.pos, outcome.pos.is_valid()) {
        (Some(expected_pos), true) if expected_pos != outcome.pos => {
            Err(VerifyFailure::PositionMismatch {
                message: outcome.message,
                pos: outcome.pos,
                expected_pos,
                sql_with_carets,
                expected_sql_with_carets: add_carets(
                    &annotated.sql,
                    expected_pos.start_line,
                    expected_pos.start_column,
                    expected_pos.end_line,
                    expected_pos.end_column + 1,
                ),
            })
        }
        (Some(_), true) => Ok(()),
        (Some(_), false) => Err(VerifyFailure::MissingPosition { pos: outcome.pos }),
        (None, true) => Err(VerifyFailure::UnexpectedPosition { sql_with_carets }),
        (None, false) => Ok(()),
    }
}

/// Extracts the effective message and position from a raised error.
///
/// Preference order: a [`ContextError`] anywhere in the cause chain, then a
/// [`ParseError`] with its position set, then the two message-text
/// patterns. When the located error wraps a cause, the cause's message is
/// the one compared.
pub fn locate(raised: &(dyn StdError + 'static)) -> DiagnosticOutcome {
    let mut message = raised.to_string();
    let mut pos = SourcePosition::new(-1, -1, UNKNOWN_END_LINE, UNKNOWN_END_COLUMN);

    if let Some(ctx) = find_in_chain::<ContextError>(raised, |_| true) {
        pos = ctx.position();
        if let Some(cause) = ctx.source() {
            message = cause.to_string();
        }
    } else if let Some(parse) = find_in_chain::<ParseError>(raised, |p| p.pos.is_some()) {
        if let Some(parse_pos) = parse.pos {
            pos = parse_pos;
        }
        if let Some(cause) = parse.source() {
            message = cause.to_string();
        }
    } else {
        let raw = message;
        if let Some(caps) = LINE_COL_TWICE.captures(&raw) {
            pos = SourcePosition::new(
                group_num(&caps, 1),
                group_num(&caps, 2),
                group_num(&caps, 3),
                group_num(&caps, 4),
            );
            message = caps[5].to_string();
        } else {
            if let Some(caps) = LINE_COL.captures(&raw) {
                pos.start_line = group_num(&caps, 1);
                pos.start_column = group_num(&caps, 2);
            }
            message = raw;
        }
    }

    DiagnosticOutcome { message, pos }
}

fn group_num(caps: &regex::Captures<'_>, index: usize) -> i32 {
    caps[index].parse().unwrap_or(-1)
}

/// Walks the cause chain in raise order looking for a `T` accepted by
/// `pred`. Bounded by an identity check so a self-referential cause cannot
/// loop it forever.
fn find_in_chain<'a, T: StdError + 'static>(
    raised: &'a (dyn StdError + 'static),
    pred: impl Fn(&T) -> bool,
) -> Option<&'a T> {
    let mut current = raised;
    loop {
        if let Some(found) = current.downcast_ref::<T>() {
            if pred(found) {
                return Some(found);
            }
        }
        match current.source() {
            Some(next)
                if !std::ptr::addr_eq(
                    next as *const (dyn StdError + 'static),
                    current as *const (dyn StdError + 'static),
                ) =>
            {
                current = next;
            }
            _ => return None,
        }
    }
}

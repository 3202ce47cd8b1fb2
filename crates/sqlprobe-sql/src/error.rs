//! Engine-facing error types
//!
//! Parse failures and validation failures are both expected when testing
//! negative cases; the verifier tells them apart only by which type it
//! finds first walking the cause chain.

use std::error::Error as StdError;
use std::fmt;

use sqlprobe_core::SourcePosition;
use thiserror::Error;

/// A syntax error from the external parser, carrying the parser's position
/// when it reported one.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub pos: Option<SourcePosition>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, pos: Option<SourcePosition>) -> Self {
        Self {
            message: message.into(),
            pos,
            source: None,
        }
    }

    /// Attach the underlying failure.
    pub fn with_cause(mut self, cause: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        self.source = Some(cause.into());
        self
    }
}

/// A located failure the way validators report them: the position lives
/// here, the message usually lives in the wrapped cause.
#[derive(Debug)]
pub struct ContextError {
    pos: SourcePosition,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl ContextError {
    pub fn new(pos: SourcePosition) -> Self {
        Self { pos, source: None }
    }

    /// Attach the wrapped complaint.
    pub fn with_cause(mut self, cause: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        self.source = Some(cause.into());
        self
    }

    pub fn position(&self) -> SourcePosition {
        self.pos
    }
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "From line {}, column {} to line {}, column {}",
            self.pos.start_line, self.pos.start_column, self.pos.end_line, self.pos.end_column
        )?;
        if let Some(cause) = &self.source {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl StdError for ContextError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| &**e as &(dyn StdError + 'static))
    }
}

/// A plain validation complaint, used as the cause inside [`ContextError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

//! sqlprobe SQL bridge
//!
//! The narrow interface to the external SQL engine. Parse trees are lowered
//! into [`ExprNode`], a minimal tree exposing exactly what the oracle needs:
//! a source span, a node-kind discriminator, and operands. Engine failures
//! are modeled as [`ParseError`] (syntax, optional position) and
//! [`ContextError`] (a located wrapper around the real complaint).

pub mod ast;
pub mod error;
pub mod parser;

pub use ast::{ExprNode, LiteralClass, NodeKind};
pub use error::{ContextError, ParseError, ValidationError};
pub use parser::{SqlEngine, SqlParser};

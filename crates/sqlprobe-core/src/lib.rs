//! sqlprobe Core
//!
//! Position arithmetic and caret-annotated query fixtures shared by the
//! diagnostic verifier and the literal rewriter. Nothing here touches a
//! parser; this crate only deals in text, lines, and columns.

pub mod annotate;
pub mod config;
pub mod position;

pub use annotate::{AnnotatedQuery, CaretError};
pub use config::DialectConfig;
pub use position::{
    add_carets, index_to_line_col, line_col_to_index, span_to_byte_range, PositionError,
    SourcePosition,
};

//! sqlprobe Oracle
//!
//! The two test-oracle components. The verifier checks that a raised SQL
//! error matches an expected message pattern and lands exactly on the span
//! the fixture's caret markers describe. The rewriter turns a scalar
//! expression into an equivalent query with its literals promoted to
//! parameters, so the same expression is exercised under two structurally
//! different query shapes.
//!
//! Neither component decides pass/fail of a surrounding test; both return
//! structured outcomes for the driver to report.

pub mod rewriter;
pub mod verifier;

pub use rewriter::{Queries, QueryRewriter, RewriteError};
pub use verifier::{locate, verify, DiagnosticOutcome, VerifyFailure};

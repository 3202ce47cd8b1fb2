//! Lowered expression trees
//!
//! Every node carries its source span, a kind discriminator sufficient to
//! distinguish literals, casts, and calls, and its operand list. The tree
//! is read-only for the duration of one oracle call.

use sqlprobe_core::SourcePosition;

/// Static-type classification of a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralClass {
    /// Carries enough type information to be re-typed as a query column.
    Typed,

    /// The untyped NULL.
    Null,

    /// Grammar-internal symbols and placeholders. No re-typeable value.
    Symbol,
}

/// What a node is, as far as literal extraction cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A constant value.
    Literal(LiteralClass),

    /// An explicit `CAST(... AS type)`; the sole operand is the cast input.
    Cast,

    /// An operator or function application, identified by upper-cased name.
    Call(String),

    /// Anything else. Transparent to traversal.
    Other,
}

/// One node of a lowered expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprNode {
    pub kind: NodeKind,
    pub pos: SourcePosition,
    pub children: Vec<ExprNode>,
}

impl ExprNode {
    pub fn new(kind: NodeKind, pos: SourcePosition, children: Vec<ExprNode>) -> Self {
        Self {
            kind,
            pos,
            children,
        }
    }

    pub fn leaf(kind: NodeKind, pos: SourcePosition) -> Self {
        Self::new(kind, pos, Vec::new())
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self.kind, NodeKind::Literal(LiteralClass::Null))
    }
}

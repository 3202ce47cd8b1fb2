//! Literal-parameterization rewriter
//!
//! Rewrites a scalar expression into an equivalent query with every
//! literal promoted to a named parameter bound by a synthetic inline
//! relation: `1 < 5` becomes
//! `SELECT p0 < p1 FROM (VALUES (1, 5)) AS t(p0, p1)`.
//!
//! Null literals don't have enough type information to be extracted. We
//! push down `CAST(NULL AS type)` whole, but bare nulls such as
//! `CASE 1 WHEN 2 THEN 'a' ELSE NULL END` are left as is.

use thiserror::Error;
use tracing::debug;

use sqlprobe_core::{span_to_byte_range, PositionError};
use sqlprobe_sql::{ExprNode, LiteralClass, NodeKind, ParseError, SqlEngine};

/// Operators whose arguments must remain literal; never descended into.
const EXCLUDED_OPERATORS: &[&str] = &[
    "LITERAL_CHAIN",
    "LOCALTIME",
    "LOCALTIMESTAMP",
    "CURRENT_TIME",
    "CURRENT_TIMESTAMP",
];

const WRAP_PREFIX: &str = "VALUES (";

#[derive(Debug, Error)]
pub enum RewriteError {
    /// The expression does not parse. Reported unchanged, so callers see
    /// the original syntax error rather than a rewrite-stage artifact.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A node's recorded position does not map back into the query text.
    /// A bug in the parser bridge or in this crate, not a test outcome.
    #[error("literal position does not map into the query text: {0}")]
    Position(#[from] PositionError),
}

/// Builds the query shapes that evaluate one scalar expression.
pub struct QueryRewriter<E> {
    engine: E,
}

impl<E: SqlEngine> QueryRewriter<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// The queries that evaluate `expression`, lazily.
    ///
    /// The parameterizing rewrite is not attempted until the second
    /// element is requested, so a plain syntax error in the expression is
    /// discovered from the first element before any tree surgery runs.
    pub fn queries<'a>(&'a self, expression: &'a str) -> Queries<'a, E> {
        Queries {
            rewriter: self,
            expression,
            next: 0,
        }
    }

    /// The trivial wrapping: `VALUES (<expression>)`.
    pub fn wrap(expression: &str) -> String {
        format!("{WRAP_PREFIX}{expression})")
    }

    /// The rewrite: every extractable literal becomes a parameter bound by
    /// an inline relation.
    pub fn parameterize(&self, expression: &str) -> Result<String, RewriteError> {
        let sql = Self::wrap(expression);
        let tree = self.engine.parse_scalar(&sql)?;

        let mut nodes = Vec::new();
        collect_extractable(&tree, &mut nodes);
        // Splice back-to-front so earlier, unprocessed offsets are never
        // invalidated by a prior replacement.
        nodes.sort_by(|a, b| {
            (b.pos.start_line, b.pos.start_column).cmp(&(a.pos.start_line, a.pos.start_column))
        });
        debug!(count = nodes.len(), "collected extractable literals");

        let mut rewritten = sql.clone();
        let mut bindings = Vec::with_capacity(nodes.len().max(1));
        for (i, node) in nodes.iter().enumerate() {
            // Parameter numbering follows textual order: the leftmost
            // literal, replaced last, is p0.
            let param = format!("p{}", nodes.len() - 1 - i);
            let range = span_to_byte_range(&sql, node.pos)?;
            bindings.push((sql[range.clone()].to_string(), param.clone()));
            rewritten.replace_range(range, &param);
        }
        bindings.reverse();
        if bindings.is_empty() {
            // The inline relation must never be empty.
            bindings.push(("1".to_string(), "p0".to_string()));
        }

        let body = &rewritten[WRAP_PREFIX.len()..rewritten.len() - 1];
        let originals: Vec<&str> = bindings.iter().map(|(text, _)| text.as_str()).collect();
        let params: Vec<&str> = bindings.iter().map(|(_, name)| name.as_str()).collect();
        Ok(format!(
            "SELECT {body} FROM (VALUES ({})) AS t({})",
            originals.join(", "),
            params.join(", ")
        ))
    }
}

/// Lazy two-element sequence of query strings.
pub struct Queries<'a, E> {
    rewriter: &'a QueryRewriter<E>,
    expression: &'a str,
    next: u8,
}

impl<E: SqlEngine> Iterator for Queries<'_, E> {
    type Item = Result<String, RewriteError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = match self.next {
            0 => Ok(QueryRewriter::<E>::wrap(self.expression)),
            1 => self.rewriter.parameterize(self.expression),
            _ => return None,
        };
        self.next += 1;
        Some(item)
    }
}

/// Pre-order walk gathering extractable nodes. Excluded operators are not
/// descended into: their arguments must remain literal per the grammar.
fn collect_extractable<'t>(node: &'t ExprNode, out: &mut Vec<&'t ExprNode>) {
    match &node.kind {
        NodeKind::Literal(LiteralClass::Typed) => out.push(node),
        NodeKind::Literal(_) => {}
        NodeKind::Cast
            if node
                .children
                .first()
                .is_some_and(|operand| operand.is_null_literal()) =>
        {
            // The whole cast moves as one unit; it keeps the type
            // information a bare null would lose.
            out.push(node);
        }
        NodeKind::Call(op) if EXCLUDED_OPERATORS.contains(&op.as_str()) => {}
        _ => {
            for child in &node.children {
                collect_extractable(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlprobe_core::SourcePosition;
    use sqlprobe_sql::SqlParser;

    fn rewriter() -> QueryRewriter<SqlParser> {
        QueryRewriter::new(SqlParser::new())
    }

    #[test]
    fn first_element_is_the_trivial_wrapping() {
        let rewriter = rewriter();
        let mut queries = rewriter.queries("1 < 5");
        assert_eq!(queries.next().unwrap().unwrap(), "VALUES (1 < 5)");
    }

    #[test]
    fn leftmost_literal_gets_the_lowest_parameter() {
        let out = rewriter().parameterize("1 < 5").unwrap();
        assert_eq!(out, "SELECT p0 < p1 FROM (VALUES (1, 5)) AS t(p0, p1)");
    }

    #[test]
    fn rewrite_is_deterministic() {
        let rewriter = rewriter();
        assert_eq!(
            rewriter.parameterize("1 + 2").unwrap(),
            rewriter.parameterize("1 + 2").unwrap()
        );
    }

    #[test]
    fn repeated_literal_text_yields_distinct_parameters() {
        let out = rewriter().parameterize("1 + 1").unwrap();
        assert_eq!(out, "SELECT p0 + p1 FROM (VALUES (1, 1)) AS t(p0, p1)");
    }

    #[test]
    fn string_literals_keep_their_quotes() {
        let out = rewriter().parameterize("'a' || 'bc'").unwrap();
        assert_eq!(out, "SELECT p0 || p1 FROM (VALUES ('a', 'bc')) AS t(p0, p1)");
    }

    #[test]
    fn multiline_expression_orders_by_line_then_column() {
        let out = rewriter().parameterize("1 +\n2").unwrap();
        assert_eq!(out, "SELECT p0 +\np1 FROM (VALUES (1, 2)) AS t(p0, p1)");
    }

    #[test]
    fn no_literals_synthesizes_a_placeholder() {
        let out = rewriter().parameterize("CURRENT_TIME").unwrap();
        assert_eq!(out, "SELECT CURRENT_TIME FROM (VALUES (1)) AS t(p0)");
    }

    #[test]
    fn cast_of_null_moves_as_a_unit() {
        let out = rewriter().parameterize("CAST(NULL AS INTEGER)").unwrap();
        assert_eq!(
            out,
            "SELECT p0 FROM (VALUES (CAST(NULL AS INTEGER))) AS t(p0)"
        );
    }

    #[test]
    fn bare_null_is_left_in_place() {
        let out = rewriter()
            .parameterize("CASE 1 WHEN 2 THEN 'a' ELSE NULL END")
            .unwrap();
        assert_eq!(
            out,
            "SELECT CASE p0 WHEN p1 THEN p2 ELSE NULL END FROM (VALUES (1, 2, 'a')) AS t(p0, p1, p2)"
        );
    }

    #[test]
    fn syntax_error_propagates_unchanged() {
        let rewriter = rewriter();
        let mut queries = rewriter.queries("1 +");
        // The wrapping is pure text and always produced.
        assert_eq!(queries.next().unwrap().unwrap(), "VALUES (1 +)");
        // The rewrite surfaces the original parse failure.
        let err = queries.next().unwrap().unwrap_err();
        assert!(matches!(err, RewriteError::Parse(_)));
        assert!(queries.next().is_none());
    }

    /// Hands back a canned tree regardless of input, for driving the
    /// traversal rules directly.
    struct CannedEngine(ExprNode);

    impl SqlEngine for CannedEngine {
        fn parse_scalar(&self, _sql: &str) -> Result<ExprNode, ParseError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn excluded_operator_arguments_are_never_extracted() {
        // "VALUES ('a' 'b')" with the two literals chained; the chain's
        // arguments must stay literal, so the body comes back unchanged.
        let chain = ExprNode::new(
            NodeKind::Call("LITERAL_CHAIN".to_string()),
            SourcePosition::new(1, 9, 1, 15),
            vec![
                ExprNode::leaf(
                    NodeKind::Literal(LiteralClass::Typed),
                    SourcePosition::new(1, 9, 1, 11),
                ),
                ExprNode::leaf(
                    NodeKind::Literal(LiteralClass::Typed),
                    SourcePosition::new(1, 13, 1, 15),
                ),
            ],
        );
        let root = ExprNode::new(NodeKind::Other, SourcePosition::NONE, vec![chain]);
        let rewriter = QueryRewriter::new(CannedEngine(root));
        let out = rewriter.parameterize("'a' 'b'").unwrap();
        assert_eq!(out, "SELECT 'a' 'b' FROM (VALUES (1)) AS t(p0)");
    }

    #[test]
    fn symbol_literals_are_not_extracted() {
        let symbol = ExprNode::leaf(
            NodeKind::Literal(LiteralClass::Symbol),
            SourcePosition::new(1, 9, 1, 9),
        );
        let root = ExprNode::new(NodeKind::Other, SourcePosition::NONE, vec![symbol]);
        let rewriter = QueryRewriter::new(CannedEngine(root));
        let out = rewriter.parameterize("?").unwrap();
        assert_eq!(out, "SELECT ? FROM (VALUES (1)) AS t(p0)");
    }

    #[test]
    fn inconsistent_position_is_a_fatal_internal_error() {
        // A literal whose recorded span lies outside the query text.
        let broken = ExprNode::leaf(
            NodeKind::Literal(LiteralClass::Typed),
            SourcePosition::new(5, 1, 5, 3),
        );
        let root = ExprNode::new(NodeKind::Other, SourcePosition::NONE, vec![broken]);
        let rewriter = QueryRewriter::new(CannedEngine(root));
        let err = rewriter.parameterize("1").unwrap_err();
        assert!(matches!(err, RewriteError::Position(_)));
    }

    #[test]
    fn round_trip_reconstructs_original_literal_text() {
        // N extractable literals make an N-column inline relation whose
        // values, substituted back, rebuild the original text.
        let expression = "1 + 20 + 'x'";
        let out = rewriter().parameterize(expression).unwrap();
        assert_eq!(
            out,
            "SELECT p0 + p1 + p2 FROM (VALUES (1, 20, 'x')) AS t(p0, p1, p2)"
        );
        let mut body = "p0 + p1 + p2".to_string();
        for (param, original) in [("p0", "1"), ("p1", "20"), ("p2", "'x'")] {
            body = body.replacen(param, original, 1);
        }
        assert_eq!(body, expression);
    }
}

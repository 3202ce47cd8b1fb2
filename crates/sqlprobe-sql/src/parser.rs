//! SQL parsing behind the narrow engine interface
//!
//! Wraps the external parser with configurable dialect, and lowers its AST
//! into [`ExprNode`]. Lowering is also where parser span conventions are
//! normalized: token spans use an exclusive end column, ours are
//! end-inclusive.

use std::sync::LazyLock;

use regex::Regex;
use sqlparser::ast::{
    CastKind, Expr, FunctionArg, FunctionArgExpr, FunctionArguments, SetExpr, Spanned, Statement,
    Value,
};
use sqlparser::dialect::{
    BigQueryDialect, Dialect, GenericDialect, PostgreSqlDialect, SnowflakeDialect,
};
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Span;

use sqlprobe_core::{
    index_to_line_col, line_col_to_index, span_to_byte_range, DialectConfig, SourcePosition,
};

use crate::ast::{ExprNode, LiteralClass, NodeKind};
use crate::error::ParseError;

/// Position embedded in the parser's error messages.
static PARSER_POS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"at Line: ([0-9]+), Column: ([0-9]+)").expect("hard-coded regex"));

/// The engine surface the oracle consumes: parse a `VALUES (...)` wrapper
/// and hand back the lowered tree of its row expressions.
pub trait SqlEngine {
    fn parse_scalar(&self, sql: &str) -> Result<ExprNode, ParseError>;
}

/// SQL parser with configurable dialect.
pub struct SqlParser {
    dialect: Box<dyn Dialect>,
}

impl SqlParser {
    /// Create a new SQL parser with the default (generic) dialect.
    pub fn new() -> Self {
        Self {
            dialect: Box::new(GenericDialect {}),
        }
    }

    /// Create a SQL parser for BigQuery.
    pub fn bigquery() -> Self {
        Self {
            dialect: Box::new(BigQueryDialect {}),
        }
    }

    /// Create a SQL parser for PostgreSQL.
    pub fn postgres() -> Self {
        Self {
            dialect: Box::new(PostgreSqlDialect {}),
        }
    }

    /// Create a SQL parser for Snowflake.
    pub fn snowflake() -> Self {
        Self {
            dialect: Box::new(SnowflakeDialect {}),
        }
    }

    /// Create a parser from a dialect config.
    pub fn from_dialect(dialect: DialectConfig) -> Self {
        match dialect {
            DialectConfig::BigQuery => Self::bigquery(),
            DialectConfig::Snowflake => Self::snowflake(),
            DialectConfig::Postgres => Self::postgres(),
            DialectConfig::Ansi => Self::new(),
        }
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlEngine for SqlParser {
    fn parse_scalar(&self, sql: &str) -> Result<ExprNode, ParseError> {
        let statements =
            Parser::parse_sql(&*self.dialect, sql).map_err(|e| parse_error(e.to_string(), e))?;
        let rows = match statements.as_slice() {
            [Statement::Query(query)] => match query.body.as_ref() {
                SetExpr::Values(values) => &values.rows,
                _ => return Err(ParseError::new("expected a VALUES query", None)),
            },
            _ => return Err(ParseError::new("expected a single VALUES statement", None)),
        };
        let children = rows
            .iter()
            .flatten()
            .map(|expr| lower_expr(sql, expr))
            .collect();
        Ok(ExprNode::new(NodeKind::Other, SourcePosition::NONE, children))
    }
}

fn parse_error(message: String, cause: sqlparser::parser::ParserError) -> ParseError {
    // The parser reports positions only inside its message text.
    let pos = PARSER_POS.captures(&message).and_then(|caps| {
        let line = caps[1].parse().ok()?;
        let column = caps[2].parse().ok()?;
        Some(SourcePosition::point(line, column))
    });
    ParseError::new(message, pos).with_cause(cause)
}

fn lower_expr(sql: &str, expr: &Expr) -> ExprNode {
    match expr {
        Expr::Value(value) => ExprNode::leaf(
            NodeKind::Literal(classify_value(&value.value)),
            span_to_pos(sql, value.span),
        ),
        Expr::Cast {
            kind: CastKind::Cast,
            expr: inner,
            ..
        } => {
            let operand = lower_expr(sql, inner);
            let pos = cast_position(sql, operand.pos).unwrap_or(operand.pos);
            ExprNode::new(NodeKind::Cast, pos, vec![operand])
        }
        Expr::Cast { expr: inner, .. } => ExprNode::new(
            NodeKind::Other,
            span_to_pos(sql, expr.span()),
            vec![lower_expr(sql, inner)],
        ),
        Expr::Function(func) => {
            let children = match &func.args {
                FunctionArguments::List(list) => list
                    .args
                    .iter()
                    .filter_map(|arg| match arg {
                        FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => {
                            Some(lower_expr(sql, e))
                        }
                        FunctionArg::Named {
                            arg: FunctionArgExpr::Expr(e),
                            ..
                        } => Some(lower_expr(sql, e)),
                        FunctionArg::ExprNamed {
                            arg: FunctionArgExpr::Expr(e),
                            ..
                        } => Some(lower_expr(sql, e)),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };
            ExprNode::new(
                NodeKind::Call(func.name.to_string().to_uppercase()),
                span_to_pos(sql, expr.span()),
                children,
            )
        }
        Expr::BinaryOp { left, op, right } => ExprNode::new(
            NodeKind::Call(op.to_string()),
            span_to_pos(sql, expr.span()),
            vec![lower_expr(sql, left), lower_expr(sql, right)],
        ),
        Expr::UnaryOp { op, expr: inner } => ExprNode::new(
            NodeKind::Call(op.to_string()),
            span_to_pos(sql, expr.span()),
            vec![lower_expr(sql, inner)],
        ),
        Expr::Nested(inner) => ExprNode::new(
            NodeKind::Other,
            span_to_pos(sql, expr.span()),
            vec![lower_expr(sql, inner)],
        ),
        Expr::IsNull(inner)
        | Expr::IsNotNull(inner)
        | Expr::IsTrue(inner)
        | Expr::IsNotTrue(inner)
        | Expr::IsFalse(inner)
        | Expr::IsNotFalse(inner)
        | Expr::IsUnknown(inner)
        | Expr::IsNotUnknown(inner) => ExprNode::new(
            NodeKind::Other,
            span_to_pos(sql, expr.span()),
            vec![lower_expr(sql, inner)],
        ),
        Expr::Between {
            expr: inner,
            low,
            high,
            ..
        } => ExprNode::new(
            NodeKind::Other,
            span_to_pos(sql, expr.span()),
            vec![
                lower_expr(sql, inner),
                lower_expr(sql, low),
                lower_expr(sql, high),
            ],
        ),
        Expr::InList {
            expr: inner, list, ..
        } => {
            let mut children = vec![lower_expr(sql, inner)];
            children.extend(list.iter().map(|e| lower_expr(sql, e)));
            ExprNode::new(NodeKind::Other, span_to_pos(sql, expr.span()), children)
        }
        Expr::Like {
            expr: inner,
            pattern,
            ..
        }
        | Expr::ILike {
            expr: inner,
            pattern,
            ..
        }
        | Expr::SimilarTo {
            expr: inner,
            pattern,
            ..
        } => ExprNode::new(
            NodeKind::Other,
            span_to_pos(sql, expr.span()),
            vec![lower_expr(sql, inner), lower_expr(sql, pattern)],
        ),
        Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            let mut children = Vec::new();
            if let Some(operand) = operand {
                children.push(lower_expr(sql, operand));
            }
            for when in conditions {
                children.push(lower_expr(sql, &when.condition));
                children.push(lower_expr(sql, &when.result));
            }
            if let Some(else_result) = else_result {
                children.push(lower_expr(sql, else_result));
            }
            ExprNode::new(NodeKind::Other, span_to_pos(sql, expr.span()), children)
        }
        Expr::Tuple(items) => ExprNode::new(
            NodeKind::Other,
            span_to_pos(sql, expr.span()),
            items.iter().map(|e| lower_expr(sql, e)).collect(),
        ),
        // Identifiers, subqueries, intervals, typed strings and the rest:
        // nothing extractable below them for our purposes.
        _ => ExprNode::leaf(NodeKind::Other, span_to_pos(sql, expr.span())),
    }
}

fn classify_value(value: &Value) -> LiteralClass {
    match value {
        Value::Null => LiteralClass::Null,
        Value::Placeholder(_) => LiteralClass::Symbol,
        _ => LiteralClass::Typed,
    }
}

/// Converts a parser token span (exclusive end column) into an
/// end-inclusive [`SourcePosition`] resolved against `sql`.
fn span_to_pos(sql: &str, span: Span) -> SourcePosition {
    let (start_line, start_column) = (span.start.line as i32, span.start.column as i32);
    let (end_line, end_column) = (span.end.line as i32, span.end.column as i32);
    if start_line <= 0 || start_column <= 0 || end_line <= 0 || end_column <= 0 {
        return SourcePosition::NONE;
    }
    match inclusive_end(sql, end_line, end_column) {
        Some((line, column)) => SourcePosition::new(start_line, start_column, line, column),
        None => SourcePosition::NONE,
    }
}

/// Steps an exclusive end coordinate back one character.
fn inclusive_end(sql: &str, line: i32, column: i32) -> Option<(i32, i32)> {
    let end = line_col_to_index(sql, line, column).ok()?;
    let last = sql[..end].chars().next_back()?;
    Some(index_to_line_col(sql, end - last.len_utf8()))
}

/// The parser reports only the operand span for a CAST. Widen it over the
/// enclosing `CAST( ... )` text so the whole call is one spliceable unit.
fn cast_position(sql: &str, operand: SourcePosition) -> Option<SourcePosition> {
    let operand_range = span_to_byte_range(sql, operand).ok()?;
    let head = &sql[..operand_range.start];
    let open = head.rfind('(')?;
    // Only whitespace may sit between the paren and the operand.
    if !head[open + 1..].trim().is_empty() {
        return None;
    }
    let keyword = head[..open].trim_end();
    if !keyword.to_ascii_uppercase().ends_with("CAST") {
        return None;
    }
    let start = keyword.len() - "CAST".len();
    if keyword[..start]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
    {
        return None;
    }

    let mut depth = 1u32;
    let mut close = None;
    for (i, ch) in sql[operand_range.end..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(operand_range.end + i);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = close?;

    let (start_line, start_column) = index_to_line_col(sql, start);
    let (end_line, end_column) = index_to_line_col(sql, close);
    Some(SourcePosition::new(
        start_line,
        start_column,
        end_line,
        end_column,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn span_text(sql: &str, pos: SourcePosition) -> String {
        sql[span_to_byte_range(sql, pos).unwrap()].to_string()
    }

    #[test]
    fn lowers_binary_op_with_literal_spans() {
        let sql = "VALUES (1 + 25)";
        let tree = SqlParser::new().parse_scalar(sql).unwrap();
        assert_eq!(tree.children.len(), 1);

        let call = &tree.children[0];
        assert_eq!(call.kind, NodeKind::Call("+".to_string()));
        assert_eq!(call.children.len(), 2);
        assert_eq!(
            call.children[0].kind,
            NodeKind::Literal(LiteralClass::Typed)
        );
        assert_eq!(span_text(sql, call.children[0].pos), "1");
        assert_eq!(span_text(sql, call.children[1].pos), "25");
    }

    #[test]
    fn lowers_string_literals_with_quotes_in_span() {
        let sql = "VALUES ('a' || 'bc')";
        let tree = SqlParser::new().parse_scalar(sql).unwrap();
        let call = &tree.children[0];
        assert_eq!(call.kind, NodeKind::Call("||".to_string()));
        assert_eq!(span_text(sql, call.children[0].pos), "'a'");
        assert_eq!(span_text(sql, call.children[1].pos), "'bc'");
    }

    #[test]
    fn lowers_null_as_untyped_literal() {
        let tree = SqlParser::new().parse_scalar("VALUES (NULL)").unwrap();
        assert!(tree.children[0].is_null_literal());
    }

    #[test]
    fn lowers_niladic_time_function_as_call() {
        let tree = SqlParser::new()
            .parse_scalar("VALUES (CURRENT_TIME)")
            .unwrap();
        let call = &tree.children[0];
        assert_eq!(call.kind, NodeKind::Call("CURRENT_TIME".to_string()));
        assert!(call.children.is_empty());
    }

    #[test]
    fn widens_cast_span_over_the_whole_call() {
        let sql = "VALUES (CAST(NULL AS DECIMAL(4,2)))";
        let tree = SqlParser::new().parse_scalar(sql).unwrap();
        let cast = &tree.children[0];
        assert_eq!(cast.kind, NodeKind::Cast);
        assert!(cast.children[0].is_null_literal());
        assert_eq!(span_text(sql, cast.pos), "CAST(NULL AS DECIMAL(4,2))");
    }

    #[test]
    fn cast_widening_rejects_other_keywords() {
        // Looks like a cast operand but the keyword is wrong.
        assert_eq!(
            cast_position("MYCAST(NULL)", SourcePosition::new(1, 8, 1, 11)),
            None
        );
    }

    #[test]
    fn syntax_error_surfaces_with_position() {
        let err = SqlParser::new().parse_scalar("VALUES (1 +").unwrap_err();
        let pos = err.pos.expect("parser should report a position");
        assert_eq!(pos.start_line, 1);
    }

    #[test]
    fn non_values_statement_is_rejected() {
        let err = SqlParser::new().parse_scalar("SELECT 1").unwrap_err();
        assert!(err.message.contains("VALUES"));
    }

    #[test]
    fn all_dialects_parse_a_simple_row() {
        for config in [
            DialectConfig::Ansi,
            DialectConfig::Postgres,
            DialectConfig::BigQuery,
            DialectConfig::Snowflake,
        ] {
            let parser = SqlParser::from_dialect(config);
            assert!(parser.parse_scalar("VALUES (1)").is_ok());
        }
    }
}

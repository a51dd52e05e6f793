//! Filter compilation.
//!
//! Translates a WHERE expression into a [`LogicalExpression`] tree of
//! column filters combined by `and`/`or`. Negation is normalized onto
//! the node it applies to: `NOT (leaf)` sets the leaf's flag, `NOT
//! (a AND b)` sets the combinator's flag, and double negation cancels.
//! No De Morgan rewriting happens; PostgREST renders negated
//! combinators directly.

use sqlparser::ast::{BinaryOperator, Expr, Value};

use super::column::{parse_column_ref, strip_nested, CastRule};
use super::relations::{RelationRef, RelationTable};
use crate::error::{Error, Result};
use crate::statement::{
    ColumnExpression, ColumnOperator, FilterColumn, FilterValue, LogicalExpression,
    LogicalOperator,
};

/// Compile a WHERE expression into a logical tree.
pub(crate) fn compile_filter(
    expr: &Expr,
    relations: &RelationTable,
) -> Result<LogicalExpression> {
    walk(expr, false, relations)
}

fn walk(expr: &Expr, negate: bool, relations: &RelationTable) -> Result<LogicalExpression> {
    match expr {
        Expr::Nested(inner) => walk(inner, negate, relations),
        Expr::UnaryOp {
            op: sqlparser::ast::UnaryOperator::Not,
            expr: inner,
        } => walk(inner, !negate, relations),
        Expr::BinaryOp {
            op: BinaryOperator::And,
            ..
        } => logical(LogicalOperator::And, expr, negate, relations),
        Expr::BinaryOp {
            op: BinaryOperator::Or,
            ..
        } => logical(LogicalOperator::Or, expr, negate, relations),
        other => leaf(other, negate, relations),
    }
}

/// Build an n-ary combinator from a left-associated operator chain.
/// Explicit parentheses arrive as `Expr::Nested` and stop the chain, so
/// user-written sub-trees survive as nested combinators.
fn logical(
    operator: LogicalOperator,
    expr: &Expr,
    negate: bool,
    relations: &RelationTable,
) -> Result<LogicalExpression> {
    let mut operands = Vec::new();
    collect_operands(expr, operator, &mut operands);

    let values = operands
        .into_iter()
        .map(|operand| walk(operand, false, relations))
        .collect::<Result<Vec<_>>>()?;

    Ok(LogicalExpression::Logical {
        operator,
        negate,
        values,
    })
}

fn collect_operands<'a>(expr: &'a Expr, operator: LogicalOperator, out: &mut Vec<&'a Expr>) {
    let matches_op = |op: &BinaryOperator| match operator {
        LogicalOperator::And => matches!(op, BinaryOperator::And),
        LogicalOperator::Or => matches!(op, BinaryOperator::Or),
    };
    match expr {
        Expr::BinaryOp { left, op, right } if matches_op(op) => {
            collect_operands(left, operator, out);
            collect_operands(right, operator, out);
        }
        other => out.push(other),
    }
}

fn leaf(expr: &Expr, negate: bool, relations: &RelationTable) -> Result<LogicalExpression> {
    match expr {
        Expr::BinaryOp { left, op, right } => {
            let (operator, flip) = map_operator(op)?;
            let column = filter_column(left, relations)?;
            let value = literal_value(right)?;
            Ok(column_expression(
                column,
                operator,
                FilterValue::Scalar(value),
                negate ^ flip,
            ))
        }

        Expr::Like {
            negated,
            expr: column,
            pattern,
            escape_char,
        } => like(
            ColumnOperator::Like,
            column,
            pattern,
            *escape_char,
            negate ^ negated,
            relations,
        ),
        Expr::ILike {
            negated,
            expr: column,
            pattern,
            escape_char,
        } => like(
            ColumnOperator::ILike,
            column,
            pattern,
            *escape_char,
            negate ^ negated,
            relations,
        ),

        Expr::InList {
            expr: column,
            list,
            negated,
        } => {
            let column = filter_column(column, relations)?;
            let values = list
                .iter()
                .map(literal_value)
                .collect::<Result<Vec<_>>>()?;
            Ok(column_expression(
                column,
                ColumnOperator::In,
                FilterValue::List(values),
                negate ^ negated,
            ))
        }

        Expr::IsNull(column) => is_test(column, "null", negate, relations),
        Expr::IsNotNull(column) => is_test(column, "null", !negate, relations),
        Expr::IsTrue(column) => is_test(column, "true", negate, relations),
        Expr::IsNotTrue(column) => is_test(column, "true", !negate, relations),
        Expr::IsFalse(column) => is_test(column, "false", negate, relations),
        Expr::IsNotFalse(column) => is_test(column, "false", !negate, relations),
        Expr::IsUnknown(column) => is_test(column, "unknown", negate, relations),
        Expr::IsNotUnknown(column) => is_test(column, "unknown", !negate, relations),

        Expr::IsDistinctFrom(..) | Expr::IsNotDistinctFrom(..) => {
            Err(Error::UnsupportedOperator(format!(
                "IS DISTINCT FROM: {expr}"
            )))
        }
        Expr::SimilarTo { .. } => Err(Error::UnsupportedOperator(format!("SIMILAR TO: {expr}"))),

        Expr::Between { .. } => Err(Error::UnsupportedExpression(format!(
            "BETWEEN is not supported, use two comparisons: {expr}"
        ))),
        Expr::InSubquery { .. } | Expr::Exists { .. } | Expr::Subquery(_) => {
            Err(Error::UnsupportedExpression(format!(
                "subqueries are not supported: {expr}"
            )))
        }

        other => Err(Error::UnsupportedExpression(other.to_string())),
    }
}

fn like(
    operator: ColumnOperator,
    column: &Expr,
    pattern: &Expr,
    escape_char: Option<char>,
    negate: bool,
    relations: &RelationTable,
) -> Result<LogicalExpression> {
    if escape_char.is_some() {
        return Err(Error::UnsupportedExpression(format!(
            "LIKE ... ESCAPE is not supported: {pattern}"
        )));
    }
    let column = filter_column(column, relations)?;
    let pattern = match strip_nested(pattern) {
        Expr::Value(Value::SingleQuotedString(pattern)) => pattern,
        other => {
            return Err(Error::UnsupportedExpression(format!(
                "LIKE pattern must be a string literal: {other}"
            )))
        }
    };
    Ok(column_expression(
        column,
        operator,
        FilterValue::Scalar(translate_like_pattern(pattern)),
        negate,
    ))
}

fn is_test(
    column: &Expr,
    value: &str,
    negate: bool,
    relations: &RelationTable,
) -> Result<LogicalExpression> {
    let column = filter_column(column, relations)?;
    Ok(column_expression(
        column,
        ColumnOperator::Is,
        FilterValue::scalar(value),
        negate,
    ))
}

fn column_expression(
    column: FilterColumn,
    operator: ColumnOperator,
    value: FilterValue,
    negate: bool,
) -> LogicalExpression {
    LogicalExpression::Column(ColumnExpression {
        column,
        operator,
        value,
        negate,
    })
}

/// Map a SQL comparison operator onto a PostgREST operator; the bool
/// marks operators that carry their own negation (`!~` and friends).
fn map_operator(op: &BinaryOperator) -> Result<(ColumnOperator, bool)> {
    match op {
        BinaryOperator::Eq => Ok((ColumnOperator::Eq, false)),
        BinaryOperator::NotEq => Ok((ColumnOperator::Neq, false)),
        BinaryOperator::Gt => Ok((ColumnOperator::Gt, false)),
        BinaryOperator::GtEq => Ok((ColumnOperator::Gte, false)),
        BinaryOperator::Lt => Ok((ColumnOperator::Lt, false)),
        BinaryOperator::LtEq => Ok((ColumnOperator::Lte, false)),
        BinaryOperator::PGRegexMatch => Ok((ColumnOperator::Match, false)),
        BinaryOperator::PGRegexNotMatch => Ok((ColumnOperator::Match, true)),
        BinaryOperator::PGRegexIMatch => Ok((ColumnOperator::IMatch, false)),
        BinaryOperator::PGRegexNotIMatch => Ok((ColumnOperator::IMatch, true)),
        other => Err(Error::UnsupportedOperator(other.to_string())),
    }
}

/// Resolve the column side of a filter leaf. Unqualified references bind
/// to the primary relation; qualified references are routed through the
/// embed tree.
fn filter_column(expr: &Expr, relations: &RelationTable) -> Result<FilterColumn> {
    let column = parse_column_ref(expr, CastRule::Forbid)?;
    let path = match column.relation.as_deref() {
        None => Vec::new(),
        Some(reference) => match relations.resolve(reference) {
            Some(RelationRef::Primary) => Vec::new(),
            Some(RelationRef::Embed(idx)) => relations.path_to(idx),
            None => {
                return Err(Error::ForeignColumnWithoutJoin(format!(
                    "{reference}.{}",
                    column.column
                )))
            }
        },
    };
    Ok(FilterColumn {
        path,
        column: column.column,
        json_path: column.json_path,
    })
}

/// Render a literal operand into PostgREST value syntax.
fn literal_value(expr: &Expr) -> Result<String> {
    match strip_nested(expr) {
        Expr::Value(Value::Number(number, _)) => Ok(number.clone()),
        Expr::Value(Value::SingleQuotedString(text)) => Ok(text.clone()),
        Expr::Value(Value::Boolean(boolean)) => Ok(boolean.to_string()),
        Expr::Value(Value::Null) => Err(Error::UnsupportedExpression(
            "comparison against NULL is not representable, use IS NULL".into(),
        )),
        Expr::UnaryOp {
            op: sqlparser::ast::UnaryOperator::Minus,
            expr: inner,
        } => match strip_nested(inner) {
            Expr::Value(Value::Number(number, _)) => Ok(format!("-{number}")),
            other => Err(Error::UnsupportedExpression(other.to_string())),
        },
        other => Err(Error::UnsupportedExpression(format!(
            "filter values must be literals: {other}"
        ))),
    }
}

/// Rewrite a SQL LIKE pattern into PostgREST's form: `%` becomes `*`,
/// `_` stays, backslash escapes pass through untouched.
fn translate_like_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push('\\');
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '%' => out.push('*'),
            other => out.push(other),
        }
    }
    out
}

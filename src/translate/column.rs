//! Column reference parsing shared by the translator stages.
//!
//! A *column-like* expression is a bare or qualified column reference,
//! optionally wrapped in a single cast and/or a chain of `->`/`->>`
//! JSON path steps. Targets allow the cast; filters, sorts, and grouping
//! forbid it.

use sqlparser::ast::{DataType, Expr, JsonOperator, Value};

use crate::error::{Error, Result};
use crate::statement::{JsonOperand, JsonOperation, JsonPath};

/// Whether a cast is legal in the clause being parsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CastRule {
    /// Select-list position: a single cast is allowed.
    Allow,
    /// WHERE / ORDER BY / GROUP BY: any cast fails `CastOutsideTarget`.
    Forbid,
}

/// A parsed column-like expression, not yet resolved to a relation.
#[derive(Clone, Debug)]
pub(crate) struct ColumnRef {
    pub relation: Option<String>,
    pub column: String,
    pub json_path: JsonPath,
    pub cast: Option<String>,
}

/// Parse a column reference with optional cast and JSON path.
pub(crate) fn parse_column_ref(expr: &Expr, casts: CastRule) -> Result<ColumnRef> {
    let mut current = strip_nested(expr);

    let mut cast = None;
    if let Expr::Cast {
        expr: inner,
        data_type,
        ..
    } = current
    {
        if casts == CastRule::Forbid {
            return Err(Error::CastOutsideTarget(expr.to_string()));
        }
        cast = Some(cast_name(data_type));
        current = strip_nested(inner);
        if matches!(current, Expr::Cast { .. }) {
            return Err(Error::UnsupportedExpression(format!(
                "multiple casts are not supported: {expr}"
            )));
        }
    }

    // JSON access parses left-nested; unwind it into source order.
    let mut json_path = Vec::new();
    while let Expr::JsonAccess {
        left,
        operator,
        right,
    } = current
    {
        let operand = json_operand(right)?;
        let step = match operator {
            JsonOperator::Arrow => JsonOperation::Arrow(operand),
            JsonOperator::LongArrow => JsonOperation::DoubleArrow(operand),
            _ => return Err(Error::InvalidJsonPath(expr.to_string())),
        };
        json_path.push(step);
        current = strip_nested(left);
    }
    json_path.reverse();

    let (relation, column) = match current {
        Expr::Identifier(ident) => (None, ident.value.clone()),
        Expr::CompoundIdentifier(idents) if idents.len() == 2 => {
            (Some(idents[0].value.clone()), idents[1].value.clone())
        }
        Expr::CompoundIdentifier(_) => {
            return Err(Error::UnsupportedExpression(format!(
                "column references may be qualified by at most one relation: {expr}"
            )))
        }
        Expr::Cast { .. } => {
            return Err(Error::UnsupportedExpression(format!(
                "casts inside a JSON path are not supported: {expr}"
            )))
        }
        _ if !json_path.is_empty() => return Err(Error::InvalidJsonPath(expr.to_string())),
        other => {
            return Err(Error::UnsupportedExpression(other.to_string()));
        }
    };

    Ok(ColumnRef {
        relation,
        column,
        json_path,
        cast,
    })
}

/// JSON path operands must be string or integer literals.
fn json_operand(expr: &Expr) -> Result<JsonOperand> {
    match strip_nested(expr) {
        Expr::Value(Value::SingleQuotedString(key)) => Ok(JsonOperand::Key(key.clone())),
        Expr::Value(Value::Number(n, _)) => n
            .parse::<i64>()
            .map(JsonOperand::Idx)
            .map_err(|_| Error::InvalidJsonPath(expr.to_string())),
        other => Err(Error::InvalidJsonPath(other.to_string())),
    }
}

/// Render a cast target the way it appears in a PostgREST select string.
/// Built-in type names are lowercased; custom types pass through as
/// written.
pub(crate) fn cast_name(data_type: &DataType) -> String {
    match data_type {
        DataType::Custom(..) => data_type.to_string(),
        _ => data_type.to_string().to_ascii_lowercase(),
    }
}

pub(crate) fn strip_nested(expr: &Expr) -> &Expr {
    let mut current = expr;
    while let Expr::Nested(inner) = current {
        current = inner;
    }
    current
}

//! Sort, limit, and offset compilation.

use sqlparser::ast::{Expr, Offset, OrderByExpr, Value};

use super::column::{parse_column_ref, CastRule};
use super::relations::{RelationRef, RelationTable};
use crate::error::{Error, Result};
use crate::statement::{Sort, SortDirection, SortNulls};

/// Compile ORDER BY terms. Each must be a plain (optionally qualified)
/// column reference; qualified terms become sorted embeds.
pub(crate) fn compile_sorts(
    order_by: &[OrderByExpr],
    relations: &RelationTable,
) -> Result<Vec<Sort>> {
    order_by
        .iter()
        .map(|item| compile_sort(item, relations))
        .collect()
}

fn compile_sort(item: &OrderByExpr, relations: &RelationTable) -> Result<Sort> {
    let column = parse_column_ref(&item.expr, CastRule::Forbid)?;

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

    Ok(Sort {
        path,
        column: column.column,
        json_path: column.json_path,
        direction: item.asc.map(|asc| {
            if asc {
                SortDirection::Asc
            } else {
                SortDirection::Desc
            }
        }),
        nulls: item.nulls_first.map(|first| {
            if first {
                SortNulls::First
            } else {
                SortNulls::Last
            }
        }),
    })
}

/// LIMIT must be a non-negative integer literal.
pub(crate) fn compile_limit(limit: Option<&Expr>) -> Result<Option<u64>> {
    limit
        .map(|expr| integer_literal(expr).ok_or_else(|| Error::InvalidLimit(expr.to_string())))
        .transpose()
}

/// OFFSET must be a non-negative integer literal.
pub(crate) fn compile_offset(offset: Option<&Offset>) -> Result<Option<u64>> {
    offset
        .map(|offset| {
            integer_literal(&offset.value)
                .ok_or_else(|| Error::InvalidOffset(offset.value.to_string()))
        })
        .transpose()
}

fn integer_literal(expr: &Expr) -> Option<u64> {
    match expr {
        Expr::Value(Value::Number(number, _)) => number.parse().ok(),
        _ => None,
    }
}

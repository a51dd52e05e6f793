//! Parser adapter over [`sqlparser`].
//!
//! The translator consumes a parsed query tree and never inspects raw
//! SQL text; this module is the only place the parser is invoked. It
//! accepts exactly one statement and peels it down to the SELECT query
//! the translator understands.

use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::error::{Error, Result};

/// Parse `sql` into a single SELECT query.
pub fn parse_select(sql: &str) -> Result<Box<Query>> {
    let mut statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)?;

    if statements.len() != 1 {
        return Err(Error::UnsupportedExpression(format!(
            "expected a single statement, found {}",
            statements.len()
        )));
    }

    match statements.remove(0) {
        Statement::Query(query) => {
            validate_query_shape(&query)?;
            Ok(query)
        }
        other => Err(Error::UnsupportedExpression(format!(
            "only SELECT statements are supported, found: {other}"
        ))),
    }
}

/// Reject query-level features outside the subset before translation.
fn validate_query_shape(query: &Query) -> Result<()> {
    if let Some(with) = &query.with {
        return Err(Error::UnsupportedExpression(format!(
            "common table expressions are not supported: {with}"
        )));
    }
    if let Some(fetch) = &query.fetch {
        return Err(Error::UnsupportedExpression(format!(
            "FETCH is not supported: {fetch}"
        )));
    }
    if !query.locks.is_empty() {
        return Err(Error::UnsupportedExpression(
            "row locking clauses are not supported".into(),
        ));
    }

    match query.body.as_ref() {
        SetExpr::Select(_) => Ok(()),
        SetExpr::SetOperation { op, .. } => Err(Error::UnsupportedExpression(format!(
            "set operations are not supported: {op}"
        ))),
        other => Err(Error::UnsupportedExpression(format!(
            "only plain SELECT queries are supported, found: {other}"
        ))),
    }
}

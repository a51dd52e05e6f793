//! The validator-transpiler: parsed SQL AST to [`Statement`] IR.
//!
//! The pipeline runs leaves-first: join resolution, target-list
//! processing, filter compilation, sort/limit/offset compilation, then
//! assembly with the GROUP BY rules enforced. The first violation aborts
//! the whole translation; there are no warnings and no recovery.

mod column;
mod filter;
mod relations;
mod sort;
mod targets;

use sqlparser::ast::{Expr, Query, Select, SetExpr};

use crate::error::{Error, Result};
use crate::statement::{FilterColumn, SelectStatement, Statement, Target};
use column::{parse_column_ref, CastRule};
use relations::{RelationRef, RelationTable};

/// Translate raw SQL into the Statement IR.
///
/// Convenience entry that runs the parser adapter first; see
/// [`translate_query`] for the AST-level entry point.
pub fn translate(sql: &str) -> Result<Statement> {
    let query = crate::parser::parse_select(sql)?;
    translate_query(&query)
}

/// Translate a parsed SELECT query into the Statement IR.
pub fn translate_query(query: &Query) -> Result<Statement> {
    let select = match query.body.as_ref() {
        SetExpr::Select(select) => select,
        other => {
            return Err(Error::UnsupportedExpression(format!(
                "only plain SELECT queries are supported, found: {other}"
            )))
        }
    };

    validate_select_shape(select)?;

    let relations = RelationTable::from_clause(&select.from)?;
    tracing::debug!(relation = %relations.primary.name, "translating SELECT statement");

    let forest = targets::process_targets(&select.projection, &relations)?;
    let filter = select
        .selection
        .as_ref()
        .map(|expr| filter::compile_filter(expr, &relations))
        .transpose()?;
    let sorts = sort::compile_sorts(&query.order_by, &relations)?;
    let limit = sort::compile_limit(query.limit.as_ref())?;
    let offset = sort::compile_offset(query.offset.as_ref())?;

    let targets = forest.into_targets(&relations);
    validate_group_by(&select.group_by, &targets, &relations)?;

    tracing::trace!(
        targets = targets.len(),
        sorts = sorts.len(),
        filtered = filter.is_some(),
        "assembled statement"
    );

    Ok(Statement::Select(SelectStatement {
        from: relations.primary,
        targets,
        filter,
        sorts,
        limit,
        offset,
    }))
}

fn validate_select_shape(select: &Select) -> Result<()> {
    if select.distinct.is_some() {
        return Err(Error::UnsupportedExpression(
            "DISTINCT is not supported".into(),
        ));
    }
    if select.into.is_some() {
        return Err(Error::UnsupportedExpression(
            "SELECT INTO is not supported".into(),
        ));
    }
    if select.having.is_some() {
        return Err(Error::HavingUnsupported);
    }
    Ok(())
}

/// Enforce the GROUP BY contract: grouping is only legal when at least
/// one aggregate is projected and the grouping columns match the
/// non-aggregate column targets exactly (both directions). PostgREST
/// infers grouping from the select list, so nothing is rendered; this
/// only validates.
fn validate_group_by(
    group_by: &[Expr],
    targets: &[Target],
    relations: &RelationTable,
) -> Result<()> {
    if group_by.is_empty() {
        return Ok(());
    }

    if !contains_aggregate(targets) {
        return Err(Error::GroupByWithoutAggregate);
    }

    let mut plain_columns = Vec::new();
    let mut star = false;
    collect_plain_columns(targets, &mut Vec::new(), &mut plain_columns, &mut star);
    if star {
        return Err(Error::GroupByMissingTarget(
            "a * projection cannot be matched by GROUP BY".into(),
        ));
    }

    let mut grouped = Vec::new();
    for expr in group_by {
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
        grouped.push(FilterColumn {
            path,
            column: column.column,
            json_path: column.json_path,
        });
    }

    for column in &grouped {
        if !plain_columns.contains(column) {
            return Err(Error::GroupByMissingTarget(format!(
                "grouping column {} is not a select target",
                column.key()
            )));
        }
    }
    for column in &plain_columns {
        if !grouped.contains(column) {
            return Err(Error::GroupByMissingTarget(format!(
                "select column {} is missing from GROUP BY",
                column.key()
            )));
        }
    }

    Ok(())
}

fn contains_aggregate(targets: &[Target]) -> bool {
    targets.iter().any(|target| match target {
        Target::Aggregate(_) => true,
        Target::Embedded(embed) => contains_aggregate(&embed.targets),
        _ => false,
    })
}

/// Collect every non-aggregate column target with its embed path, in a
/// shape comparable against resolved GROUP BY columns.
fn collect_plain_columns(
    targets: &[Target],
    path: &mut Vec<String>,
    out: &mut Vec<FilterColumn>,
    star: &mut bool,
) {
    for target in targets {
        match target {
            Target::Star => *star = true,
            Target::Column(column) => out.push(FilterColumn {
                path: path.clone(),
                column: column.column.clone(),
                json_path: column.json_path.clone(),
            }),
            Target::Aggregate(_) => {}
            Target::Embedded(embed) => {
                path.push(
                    embed
                        .alias
                        .clone()
                        .unwrap_or_else(|| embed.relation.clone()),
                );
                collect_plain_columns(&embed.targets, path, out, star);
                path.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_accepts_matching_targets() {
        let statement = translate(
            "select title, count(*) from books group by title",
        )
        .unwrap();
        let Statement::Select(select) = statement;
        assert_eq!(select.targets.len(), 2);
    }

    #[test]
    fn test_group_by_without_aggregate() {
        let err = translate("select title from books group by title").unwrap_err();
        assert_eq!(err.code(), "group_by_without_aggregate");
    }

    #[test]
    fn test_group_by_missing_target_both_directions() {
        let err = translate(
            "select title, count(*) from books group by description",
        )
        .unwrap_err();
        assert_eq!(err.code(), "group_by_missing_target");

        let err = translate(
            "select title, description, count(*) from books group by title",
        )
        .unwrap_err();
        assert_eq!(err.code(), "group_by_missing_target");
    }

    #[test]
    fn test_group_by_with_star_rejected() {
        let err = translate("select *, count(*) from books group by title").unwrap_err();
        assert_eq!(err.code(), "group_by_missing_target");
    }

    #[test]
    fn test_having_rejected() {
        let err = translate(
            "select title, count(*) from books group by title having count(*) > 1",
        )
        .unwrap_err();
        assert_eq!(err.code(), "having_unsupported");
    }

    #[test]
    fn test_distinct_rejected() {
        let err = translate("select distinct title from books").unwrap_err();
        assert_eq!(err.code(), "unsupported_expression");
    }

    #[test]
    fn test_implicit_grouping_allowed() {
        // PostgREST groups by the plain columns when aggregates are present.
        translate("select title, count(*) from books").unwrap();
    }

    #[test]
    fn test_missing_from_clause() {
        let err = translate("select title").unwrap_err();
        assert_eq!(err.code(), "missing_from_clause");
    }
}

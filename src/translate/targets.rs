//! Target-list processing.
//!
//! Walks the SELECT projection into [`Target`] values, lifting columns
//! and aggregates that belong to joined relations into the embed slot of
//! that relation. Embeds surface in the select list at the position of
//! their first referenced column; joins never referenced by a target are
//! appended afterwards in declaration order so their join semantics
//! survive.

use sqlparser::ast::{Expr, Function, FunctionArg, FunctionArgExpr, SelectItem};

use super::column::{parse_column_ref, strip_nested, CastRule, ColumnRef};
use super::relations::{RelationRef, RelationTable};
use crate::error::{Error, Result};
use crate::statement::{
    AggregateFunction, AggregateTarget, ColumnTarget, EmbeddedTarget, Target,
};

/// The processed projection: top-level entries plus one slot per joined
/// relation, kept flat until assembly.
pub(crate) struct TargetForest {
    top: Vec<TargetEntry>,
    slots: Vec<EmbedSlot>,
}

enum TargetEntry {
    Target(Target),
    Embed(usize),
}

#[derive(Default)]
struct EmbedSlot {
    entries: Vec<TargetEntry>,
    linked: bool,
}

impl TargetForest {
    /// Materialize the forest into the final nested target list.
    pub fn into_targets(mut self, relations: &RelationTable) -> Vec<Target> {
        let top = std::mem::take(&mut self.top);
        self.build_entries(top, relations)
    }

    fn build_entries(
        &mut self,
        entries: Vec<TargetEntry>,
        relations: &RelationTable,
    ) -> Vec<Target> {
        entries
            .into_iter()
            .map(|entry| match entry {
                TargetEntry::Target(target) => target,
                TargetEntry::Embed(idx) => {
                    let children = std::mem::take(&mut self.slots[idx].entries);
                    let targets = self.build_entries(children, relations);
                    let node = &relations.embeds[idx];
                    Target::Embedded(EmbeddedTarget {
                        relation: node.relation.clone(),
                        // An alias spelled the same as the relation adds
                        // nothing to the rendered embed.
                        alias: node.alias.clone().filter(|alias| *alias != node.relation),
                        join_type: node.join_type,
                        qualifier: node.qualifier.clone(),
                        targets,
                    })
                }
            })
            .collect()
    }

    fn place(&mut self, destination: Option<usize>, target: Target, relations: &RelationTable) {
        match destination {
            None => self.top.push(TargetEntry::Target(target)),
            Some(idx) => {
                self.link(idx, relations);
                self.slots[idx].entries.push(TargetEntry::Target(target));
            }
        }
    }

    /// Make the embed (and its ancestors) visible in the select list at
    /// the point of first reference.
    fn link(&mut self, idx: usize, relations: &RelationTable) {
        if self.slots[idx].linked {
            return;
        }
        self.slots[idx].linked = true;
        match relations.embeds[idx].parent {
            None => self.top.push(TargetEntry::Embed(idx)),
            Some(parent) => {
                self.link(parent, relations);
                self.slots[parent].entries.push(TargetEntry::Embed(idx));
            }
        }
    }
}

/// Process the SELECT projection into a target forest.
pub(crate) fn process_targets(
    projection: &[SelectItem],
    relations: &RelationTable,
) -> Result<TargetForest> {
    let mut forest = TargetForest {
        top: Vec::new(),
        slots: relations.embeds.iter().map(|_| EmbedSlot::default()).collect(),
    };

    for item in projection {
        match item {
            SelectItem::Wildcard(_) => forest.top.push(TargetEntry::Target(Target::Star)),
            SelectItem::QualifiedWildcard(name, _) => {
                let reference = match name.0.as_slice() {
                    [ident] => ident.value.as_str(),
                    _ => {
                        return Err(Error::UnsupportedExpression(format!(
                            "unsupported wildcard qualifier: {name}.*"
                        )))
                    }
                };
                match relations.resolve(reference) {
                    Some(RelationRef::Primary) => {
                        forest.top.push(TargetEntry::Target(Target::Star))
                    }
                    Some(RelationRef::Embed(idx)) => {
                        forest.place(Some(idx), Target::Star, relations)
                    }
                    None => return Err(Error::UnknownRelation(reference.to_string())),
                }
            }
            SelectItem::UnnamedExpr(expr) => process_expr(&mut forest, expr, None, relations)?,
            SelectItem::ExprWithAlias { expr, alias } => {
                process_expr(&mut forest, expr, Some(alias.value.clone()), relations)?
            }
        }
    }

    // Joins that never contributed a column still change row semantics;
    // surface them after the explicit targets.
    for idx in 0..relations.embeds.len() {
        forest.link(idx, relations);
    }

    Ok(forest)
}

fn process_expr(
    forest: &mut TargetForest,
    expr: &Expr,
    alias: Option<String>,
    relations: &RelationTable,
) -> Result<()> {
    let stripped = strip_nested(expr);

    // An aggregate call, possibly with an outer cast on the result.
    if let Expr::Cast {
        expr: inner,
        data_type,
        ..
    } = stripped
    {
        if let Expr::Function(function) = strip_nested(inner) {
            let cast = super::column::cast_name(data_type);
            return process_aggregate(forest, function, Some(cast), alias, relations);
        }
    }
    if let Expr::Function(function) = stripped {
        return process_aggregate(forest, function, None, alias, relations);
    }

    let column = parse_column_ref(stripped, CastRule::Allow)?;
    let (destination, relation) = resolve_target_relation(&column, relations)?;

    let mut target = ColumnTarget {
        relation,
        column: column.column,
        json_path: column.json_path,
        alias: None,
        cast: column.cast,
    };
    target.alias = alias.filter(|alias| alias != target.exposed_name());

    forest.place(destination, Target::Column(target), relations);
    Ok(())
}

fn process_aggregate(
    forest: &mut TargetForest,
    function: &Function,
    output_cast: Option<String>,
    alias: Option<String>,
    relations: &RelationTable,
) -> Result<()> {
    let name = function
        .name
        .0
        .last()
        .map(|ident| ident.value.as_str())
        .unwrap_or_default();
    let Some(aggregate) = AggregateFunction::from_name(name) else {
        return Err(Error::UnsupportedAggregate(function.name.to_string()));
    };

    if function.over.is_some() {
        return Err(Error::AggregateArgumentShape(format!(
            "window frames are not supported: {function}"
        )));
    }
    if function.distinct {
        return Err(Error::AggregateArgumentShape(format!(
            "DISTINCT aggregates are not supported: {function}"
        )));
    }

    let arg = match function.args.as_slice() {
        [arg] => arg,
        _ => {
            return Err(Error::AggregateArgumentShape(format!(
                "expected exactly one argument: {function}"
            )))
        }
    };

    let input = match arg {
        FunctionArg::Unnamed(FunctionArgExpr::Wildcard) => {
            if aggregate != AggregateFunction::Count {
                return Err(Error::AggregateArgumentShape(format!(
                    "only count accepts *: {function}"
                )));
            }
            None
        }
        FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => {
            if matches!(strip_nested(expr), Expr::Function(_)) {
                return Err(Error::AggregateArgumentShape(format!(
                    "aggregates cannot be nested: {function}"
                )));
            }
            Some(parse_column_ref(expr, CastRule::Allow).map_err(|err| match err {
                Error::UnsupportedExpression(detail) => Error::AggregateArgumentShape(detail),
                other => other,
            })?)
        }
        _ => {
            return Err(Error::AggregateArgumentShape(function.to_string()));
        }
    };

    let (destination, target) = build_aggregate_target(input, aggregate, relations)?;
    let mut target = AggregateTarget {
        output_cast,
        alias: None,
        ..target
    };
    target.alias = alias.filter(|alias| alias != target.function.as_str());

    forest.place(destination, Target::Aggregate(target), relations);
    Ok(())
}

fn build_aggregate_target(
    input: Option<ColumnRef>,
    function: AggregateFunction,
    relations: &RelationTable,
) -> Result<(Option<usize>, AggregateTarget)> {
    let Some(column) = input else {
        // count(*): no input column, always on the primary relation.
        return Ok((
            None,
            AggregateTarget {
                function,
                input: None,
                input_cast: None,
                output_cast: None,
                alias: None,
            },
        ));
    };

    let (destination, relation) = resolve_target_relation(&column, relations)?;
    let target = AggregateTarget {
        function,
        input: Some(ColumnTarget {
            relation,
            column: column.column,
            json_path: column.json_path,
            alias: None,
            cast: None,
        }),
        input_cast: column.cast,
        output_cast: None,
        alias: None,
    };
    Ok((destination, target))
}

/// Route a parsed column to the primary relation or an embed slot.
fn resolve_target_relation(
    column: &ColumnRef,
    relations: &RelationTable,
) -> Result<(Option<usize>, Option<String>)> {
    match column.relation.as_deref() {
        None => Ok((None, None)),
        Some(reference) => match relations.resolve(reference) {
            Some(RelationRef::Primary) => Ok((None, None)),
            Some(RelationRef::Embed(idx)) => {
                Ok((Some(idx), Some(relations.embeds[idx].reference_name().to_string())))
            }
            None => Err(Error::UnknownRelation(reference.to_string())),
        },
    }
}

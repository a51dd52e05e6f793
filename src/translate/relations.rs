//! Join resolution.
//!
//! Reads the FROM clause and its join list into a *relation table*: the
//! primary relation plus one node per joined relation, each validated
//! against the subset PostgREST embedding can express (LEFT/INNER joins
//! tied to an ancestor by a single column equality).

use sqlparser::ast::{
    Expr, Join, JoinConstraint, JoinOperator, ObjectName, TableFactor, TableWithJoins,
};

use crate::error::{Error, Result};
use crate::statement::{JoinQualifier, JoinType, QualifiedColumn, Relation};

/// Resolution result for a relation reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RelationRef {
    Primary,
    Embed(usize),
}

/// One joined relation, linked to its parent in the embed tree.
#[derive(Clone, Debug)]
pub(crate) struct EmbedNode {
    pub relation: String,
    pub alias: Option<String>,
    pub join_type: JoinType,
    pub qualifier: JoinQualifier,
    /// `None` when joined directly to the primary relation.
    pub parent: Option<usize>,
}

impl EmbedNode {
    /// The name this embed is referred to by (alias wins over name).
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.relation)
    }
}

/// The primary relation plus every joined relation, in declaration order.
#[derive(Clone, Debug)]
pub(crate) struct RelationTable {
    pub primary: Relation,
    pub embeds: Vec<EmbedNode>,
}

impl RelationTable {
    /// Build the relation table from a parsed FROM clause.
    pub fn from_clause(from: &[TableWithJoins]) -> Result<Self> {
        let table = match from {
            [] => return Err(Error::MissingFromClause),
            [table] => table,
            _ => return Err(Error::MultipleFromRelations(from.len())),
        };

        let (name, alias) = relation_parts(&table.relation)?;
        let mut relations = Self {
            primary: Relation { name, alias },
            embeds: Vec::new(),
        };

        for join in &table.joins {
            relations.add_join(join)?;
        }

        tracing::trace!(
            primary = %relations.primary.name,
            embeds = relations.embeds.len(),
            "resolved FROM clause"
        );
        Ok(relations)
    }

    /// Resolve a relation reference by alias-or-name. Once a relation is
    /// aliased its original name no longer resolves.
    pub fn resolve(&self, name: &str) -> Option<RelationRef> {
        if self.primary.reference_name() == name {
            return Some(RelationRef::Primary);
        }
        self.embeds
            .iter()
            .position(|embed| embed.reference_name() == name)
            .map(RelationRef::Embed)
    }

    /// The embed path from the primary relation down to `idx`, as the
    /// reference names PostgREST keys are built from.
    pub fn path_to(&self, idx: usize) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = Some(idx);
        while let Some(i) = current {
            let node = &self.embeds[i];
            path.push(node.reference_name().to_string());
            current = node.parent;
        }
        path.reverse();
        path
    }

    fn add_join(&mut self, join: &Join) -> Result<()> {
        let (join_type, constraint) = match &join.join_operator {
            JoinOperator::Inner(constraint) => (JoinType::Inner, constraint),
            JoinOperator::LeftOuter(constraint) => (JoinType::Left, constraint),
            other => return Err(Error::UnsupportedJoinType(join_operator_name(other).into())),
        };

        let (name, alias) = relation_parts(&join.relation)?;
        let reference = alias.as_deref().unwrap_or(&name).to_string();

        if self.resolve(&reference).is_some() {
            return Err(Error::UnsupportedExpression(format!(
                "duplicate relation name or alias: {reference}"
            )));
        }

        // A join back onto the primary table (or any joined table) is a
        // self-join PostgREST embedding cannot express without hints.
        if name == self.primary.name || self.embeds.iter().any(|e| e.relation == name) {
            return Err(Error::SelfJoinUnsupported(name));
        }

        let condition = match constraint {
            JoinConstraint::On(expr) => expr,
            JoinConstraint::Using(_) => {
                return Err(Error::UnsupportedExpression(
                    "JOIN ... USING is not supported, use an ON equality".into(),
                ))
            }
            JoinConstraint::Natural => {
                return Err(Error::UnsupportedExpression(
                    "NATURAL JOIN is not supported, use an ON equality".into(),
                ))
            }
            JoinConstraint::None => {
                return Err(Error::NonEquiJoin(format!(
                    "join on {reference} is missing an ON equality"
                )))
            }
        };

        let qualifier = self.resolve_qualifier(condition, &reference)?;
        self.embeds.push(EmbedNode {
            relation: name,
            alias,
            join_type,
            qualifier: qualifier.qualifier,
            parent: qualifier.parent,
        });
        Ok(())
    }

    /// Validate the ON expression of a join against the new relation and
    /// locate the parent it ties the relation to.
    fn resolve_qualifier(&self, condition: &Expr, joined: &str) -> Result<ResolvedQualifier> {
        let (left, right) = match strip_nested(condition) {
            Expr::BinaryOp {
                left,
                op: sqlparser::ast::BinaryOperator::Eq,
                right,
            } => (strip_nested(left), strip_nested(right)),
            other => return Err(Error::NonEquiJoin(other.to_string())),
        };

        let left = column_side(left)?;
        let right = column_side(right)?;

        let left_is_joined = left.relation.as_deref() == Some(joined);
        let right_is_joined = right.relation.as_deref() == Some(joined);

        let (child, parent_side) = match (left_is_joined, right_is_joined) {
            (true, true) => return Err(Error::SelfJoinUnsupported(condition.to_string())),
            (true, false) => (left, right),
            (false, true) => (right, left),
            (false, false) => {
                return Err(Error::UnknownRelation(format!(
                    "join condition \"{condition}\" does not reference \"{joined}\""
                )))
            }
        };

        let (parent, parent_name) = match parent_side.relation.as_deref() {
            None => (None, self.primary.reference_name().to_string()),
            Some(rel) => match self.resolve(rel) {
                Some(RelationRef::Primary) => (None, rel.to_string()),
                Some(RelationRef::Embed(idx)) => (Some(idx), rel.to_string()),
                None => return Err(Error::UnknownRelation(rel.to_string())),
            },
        };

        Ok(ResolvedQualifier {
            parent,
            qualifier: JoinQualifier {
                parent: QualifiedColumn {
                    relation: parent_name,
                    column: parent_side.column,
                },
                child: QualifiedColumn {
                    relation: joined.to_string(),
                    column: child.column,
                },
            },
        })
    }
}

struct ResolvedQualifier {
    parent: Option<usize>,
    qualifier: JoinQualifier,
}

/// One side of a join equality, reduced to a column reference.
struct JoinSide {
    relation: Option<String>,
    column: String,
}

fn column_side(expr: &Expr) -> Result<JoinSide> {
    match expr {
        Expr::Identifier(ident) => Ok(JoinSide {
            relation: None,
            column: ident.value.clone(),
        }),
        Expr::CompoundIdentifier(idents) if idents.len() == 2 => Ok(JoinSide {
            relation: Some(idents[0].value.clone()),
            column: idents[1].value.clone(),
        }),
        Expr::Value(_) => Err(Error::ConstantInJoin(expr.to_string())),
        Expr::UnaryOp { .. } => Err(Error::ConstantInJoin(expr.to_string())),
        other => Err(Error::NonEquiJoin(other.to_string())),
    }
}

/// Extract the relation name (last segment of a possibly schema-qualified
/// name) and alias of a FROM/JOIN table factor.
fn relation_parts(factor: &TableFactor) -> Result<(String, Option<String>)> {
    match factor {
        TableFactor::Table { name, alias, .. } => {
            let name = object_name_tail(name)?;
            let alias = match alias {
                None => None,
                Some(alias) if alias.columns.is_empty() => Some(alias.name.value.clone()),
                Some(alias) => {
                    return Err(Error::UnsupportedExpression(format!(
                        "column aliases on relations are not supported: {alias}"
                    )))
                }
            };
            Ok((name, alias))
        }
        other => Err(Error::UnsupportedExpression(format!(
            "only plain table references are supported in FROM: {other}"
        ))),
    }
}

fn object_name_tail(name: &ObjectName) -> Result<String> {
    name.0
        .last()
        .map(|ident| ident.value.clone())
        .ok_or_else(|| Error::UnsupportedExpression("empty relation name".into()))
}

fn join_operator_name(op: &JoinOperator) -> &'static str {
    match op {
        JoinOperator::Inner(_) => "INNER JOIN",
        JoinOperator::LeftOuter(_) => "LEFT OUTER JOIN",
        JoinOperator::RightOuter(_) => "RIGHT OUTER JOIN",
        JoinOperator::FullOuter(_) => "FULL OUTER JOIN",
        JoinOperator::CrossJoin => "CROSS JOIN",
        _ => "non-standard join",
    }
}

fn strip_nested(expr: &Expr) -> &Expr {
    let mut current = expr;
    while let Expr::Nested(inner) = current {
        current = inner;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_select;
    use sqlparser::ast::SetExpr;

    fn relations(sql: &str) -> Result<RelationTable> {
        let query = parse_select(sql).unwrap();
        let SetExpr::Select(select) = query.body.as_ref() else {
            unreachable!()
        };
        RelationTable::from_clause(&select.from)
    }

    #[test]
    fn test_primary_relation_with_alias() {
        let table = relations("select * from books b").unwrap();
        assert_eq!(table.primary.name, "books");
        assert_eq!(table.primary.reference_name(), "b");
        assert!(table.embeds.is_empty());
    }

    #[test]
    fn test_schema_qualified_name_uses_tail() {
        let table = relations("select * from public.books").unwrap();
        assert_eq!(table.primary.name, "books");
    }

    #[test]
    fn test_join_binds_to_primary() {
        let table =
            relations("select * from books join authors on author_id = authors.id").unwrap();
        assert_eq!(table.embeds.len(), 1);
        let embed = &table.embeds[0];
        assert_eq!(embed.relation, "authors");
        assert_eq!(embed.join_type, JoinType::Inner);
        assert_eq!(embed.parent, None);
        assert_eq!(embed.qualifier.child.column, "id");
        assert_eq!(embed.qualifier.parent.column, "author_id");
    }

    #[test]
    fn test_nested_join_attaches_to_ancestor() {
        let table = relations(
            "select * from books \
             join authors on author_id = authors.id \
             left join publishers on authors.publisher_id = publishers.id",
        )
        .unwrap();
        assert_eq!(table.embeds.len(), 2);
        assert_eq!(table.embeds[1].parent, Some(0));
        assert_eq!(table.embeds[1].join_type, JoinType::Left);
        assert_eq!(table.path_to(1), vec!["authors", "publishers"]);
    }

    #[test]
    fn test_alias_shadows_original_name() {
        let err = relations(
            "select * from books \
             join authors a on authors.id = author_id",
        )
        .unwrap_err();
        assert_eq!(err.code(), "unknown_relation");
    }

    #[test]
    fn test_unsupported_join_types() {
        let err =
            relations("select * from books right join authors on author_id = authors.id")
                .unwrap_err();
        assert_eq!(err.code(), "unsupported_join_type");

        let err = relations("select * from books cross join authors").unwrap_err();
        assert_eq!(err.code(), "unsupported_join_type");
    }

    #[test]
    fn test_non_equi_join() {
        let err = relations("select * from books join authors on author_id > authors.id")
            .unwrap_err();
        assert_eq!(err.code(), "non_equi_join");

        let err = relations(
            "select * from books join authors on author_id = authors.id and 1 = 1",
        )
        .unwrap_err();
        assert_eq!(err.code(), "non_equi_join");
    }

    #[test]
    fn test_constant_in_join() {
        let err = relations("select * from books join authors on authors.id = 1").unwrap_err();
        assert_eq!(err.code(), "constant_in_join");
    }

    #[test]
    fn test_self_join_rejected() {
        let err = relations("select * from books join books b on b.id = parent_id").unwrap_err();
        assert_eq!(err.code(), "self_join_unsupported");

        let err = relations(
            "select * from books join authors on authors.id = authors.editor_id",
        )
        .unwrap_err();
        assert_eq!(err.code(), "self_join_unsupported");
    }

    #[test]
    fn test_qualifier_must_reference_joined_relation() {
        let err = relations(
            "select * from books join authors on books.id = books.author_id",
        )
        .unwrap_err();
        assert_eq!(err.code(), "unknown_relation");
    }

    #[test]
    fn test_multiple_from_relations() {
        let err = relations("select * from books, authors").unwrap_err();
        assert_eq!(err.code(), "multiple_from_relations");
    }
}

//! Error types for the SQL to PostgREST translator.
//!
//! Every rejection carries a machine-readable kind (see [`Error::code`]),
//! a human-readable message, and, where one exists, the offending SQL
//! fragment rendered from the AST node that triggered it.

use thiserror::Error;

/// Result type for translation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the translator.
///
/// The translator never recovers: the first violation aborts the whole
/// translation. The renderer produces no errors at all; an IR shape it
/// cannot serialize is a translator bug.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Parser adapter
    // ========================================================================
    #[error("failed to parse SQL: {0}")]
    Parse(#[from] sqlparser::parser::ParserError),

    // ========================================================================
    // Target list
    // ========================================================================
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    #[error("the query has no FROM clause")]
    MissingFromClause,

    #[error("the FROM clause must contain exactly one relation, found {0}")]
    MultipleFromRelations(usize),

    #[error("casts are only supported in the select list: {0}")]
    CastOutsideTarget(String),

    #[error("unsupported aggregate function: {0}")]
    UnsupportedAggregate(String),

    #[error("aggregate argument must be a single column: {0}")]
    AggregateArgumentShape(String),

    #[error("invalid JSON path: {0}")]
    InvalidJsonPath(String),

    // ========================================================================
    // Join resolution
    // ========================================================================
    #[error("unsupported join type: {0}")]
    UnsupportedJoinType(String),

    #[error("join condition must be a single equality between two columns: {0}")]
    NonEquiJoin(String),

    #[error("join condition must not compare against a constant: {0}")]
    ConstantInJoin(String),

    #[error("join condition must not reference the joined relation on both sides: {0}")]
    SelfJoinUnsupported(String),

    #[error("unknown relation: {0}")]
    UnknownRelation(String),

    #[error("column \"{0}\" references a relation that is not joined")]
    ForeignColumnWithoutJoin(String),

    // ========================================================================
    // Filters
    // ========================================================================
    #[error("operator cannot be expressed as a PostgREST filter: {0}")]
    UnsupportedOperator(String),

    // ========================================================================
    // Grouping
    // ========================================================================
    #[error("GROUP BY requires at least one aggregate in the select list")]
    GroupByWithoutAggregate,

    #[error("GROUP BY must match the non-aggregate select columns exactly: {0}")]
    GroupByMissingTarget(String),

    #[error("HAVING is not supported")]
    HavingUnsupported,

    // ========================================================================
    // Pagination
    // ========================================================================
    #[error("LIMIT must be a non-negative integer literal: {0}")]
    InvalidLimit(String),

    #[error("OFFSET must be a non-negative integer literal: {0}")]
    InvalidOffset(String),
}

impl Error {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse_error",
            Self::UnsupportedExpression(_) => "unsupported_expression",
            Self::MissingFromClause => "missing_from_clause",
            Self::MultipleFromRelations(_) => "multiple_from_relations",
            Self::CastOutsideTarget(_) => "cast_outside_target",
            Self::UnsupportedAggregate(_) => "unsupported_aggregate",
            Self::AggregateArgumentShape(_) => "aggregate_argument_shape",
            Self::InvalidJsonPath(_) => "invalid_json_path",
            Self::UnsupportedJoinType(_) => "unsupported_join_type",
            Self::NonEquiJoin(_) => "non_equi_join",
            Self::ConstantInJoin(_) => "constant_in_join",
            Self::SelfJoinUnsupported(_) => "self_join_unsupported",
            Self::UnknownRelation(_) => "unknown_relation",
            Self::ForeignColumnWithoutJoin(_) => "foreign_column_without_join",
            Self::UnsupportedOperator(_) => "unsupported_operator",
            Self::GroupByWithoutAggregate => "group_by_without_aggregate",
            Self::GroupByMissingTarget(_) => "group_by_missing_target",
            Self::HavingUnsupported => "having_unsupported",
            Self::InvalidLimit(_) => "invalid_limit",
            Self::InvalidOffset(_) => "invalid_offset",
        }
    }
}

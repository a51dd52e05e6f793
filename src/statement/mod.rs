//! The Statement intermediate representation.
//!
//! A [`Statement`] is the contract between the translator and the HTTP
//! renderer: an immutable, serializable description of a SELECT in terms
//! the PostgREST URL grammar can express. All values are constructed by
//! the translator and never mutated afterwards; the renderer only reads.

use serde::{Deserialize, Serialize};

// ============================================================================
// Statement
// ============================================================================

/// A translated SQL statement.
///
/// Only SELECT is representable in this subset; the tag survives in the
/// JSON form as `"type": "select"`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Statement {
    Select(SelectStatement),
}

/// The SELECT variant: primary relation, projection, filter tree,
/// ordering, and pagination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectStatement {
    /// Primary relation (the URL path is derived from its name).
    pub from: Relation,
    /// Ordered projection list.
    pub targets: Vec<Target>,
    /// Optional WHERE tree.
    pub filter: Option<LogicalExpression>,
    /// Ordered ORDER BY terms.
    pub sorts: Vec<Sort>,
    /// LIMIT, when present.
    pub limit: Option<u64>,
    /// OFFSET, when present.
    pub offset: Option<u64>,
}

/// A relation reference with its optional alias.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    pub alias: Option<String>,
}

impl Relation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }

    /// The name this relation is referred to by: the alias when one is
    /// declared, the relation name otherwise.
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

// ============================================================================
// JSON paths
// ============================================================================

/// Operand of a JSON path step.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JsonOperand {
    /// Object key access: `->'key'`
    Key(String),
    /// Array index access: `->0`
    Idx(i64),
}

impl std::fmt::Display for JsonOperand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(key) => write!(f, "{key}"),
            Self::Idx(idx) => write!(f, "{idx}"),
        }
    }
}

/// A single JSON path step.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JsonOperation {
    /// Returns JSON: `->`
    Arrow(JsonOperand),
    /// Returns text: `->>`
    DoubleArrow(JsonOperand),
}

impl JsonOperation {
    pub fn operand(&self) -> &JsonOperand {
        match self {
            Self::Arrow(operand) | Self::DoubleArrow(operand) => operand,
        }
    }
}

impl std::fmt::Display for JsonOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Arrow(operand) => write!(f, "->{operand}"),
            Self::DoubleArrow(operand) => write!(f, "->>{operand}"),
        }
    }
}

/// A path into a JSON column; keys are stored unquoted.
pub type JsonPath = Vec<JsonOperation>;

// ============================================================================
// Targets
// ============================================================================

/// An entry in the projection list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Target {
    /// All columns of the primary relation.
    Star,
    /// A plain column, possibly cast or reached through a JSON path.
    Column(ColumnTarget),
    /// An aggregate over a single column.
    Aggregate(AggregateTarget),
    /// A spread projection of a joined relation.
    Embedded(EmbeddedTarget),
}

/// A column of the primary or a joined relation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnTarget {
    /// Set when the column was lifted into an embedded relation; `None`
    /// for columns of the primary relation.
    pub relation: Option<String>,
    pub column: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub json_path: JsonPath,
    pub alias: Option<String>,
    pub cast: Option<String>,
}

impl ColumnTarget {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            relation: None,
            column: column.into(),
            json_path: Vec::new(),
            alias: None,
            cast: None,
        }
    }

    /// The name PostgREST exposes this target under when no alias is
    /// given: the last JSON path key, or the column name itself.
    pub fn exposed_name(&self) -> &str {
        match self.json_path.last().map(JsonOperation::operand) {
            Some(JsonOperand::Key(key)) => key,
            _ => &self.column,
        }
    }
}

/// Aggregate functions PostgREST understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Avg,
    Count,
    Max,
    Min,
    Sum,
}

impl AggregateFunction {
    /// Parse a (case-insensitive) SQL function name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "avg" => Some(Self::Avg),
            "count" => Some(Self::Count),
            "max" => Some(Self::Max),
            "min" => Some(Self::Min),
            "sum" => Some(Self::Sum),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avg => "avg",
            Self::Count => "count",
            Self::Max => "max",
            Self::Min => "min",
            Self::Sum => "sum",
        }
    }
}

/// An aggregate projection: `amount.sum()::float`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateTarget {
    pub function: AggregateFunction,
    /// The aggregated column. `None` only for `count(*)`, which renders
    /// as a bare `count()`.
    pub input: Option<ColumnTarget>,
    /// Cast applied to the argument inside the call.
    pub input_cast: Option<String>,
    /// Cast applied to the aggregate result.
    pub output_cast: Option<String>,
    pub alias: Option<String>,
}

/// Join type of an embedded relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    /// LEFT JOIN: all parent rows (PostgREST's default, no marker).
    #[default]
    Left,
    /// INNER JOIN: only matching rows, rendered `!inner`.
    Inner,
}

/// A column qualified by the relation it lives on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifiedColumn {
    pub relation: String,
    pub column: String,
}

/// The validated `ON` equality tying an embedded relation to its parent.
///
/// PostgREST discovers join conditions from foreign keys, so this is IR
/// metadata only; the renderer never serializes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinQualifier {
    /// The column on the parent (or ancestor) side.
    pub parent: QualifiedColumn,
    /// The column on the embedded relation.
    pub child: QualifiedColumn,
}

/// A spread projection of a joined relation, rendered `...rel(cols)`.
///
/// Every embed this subset can produce flattens the joined row into the
/// parent's row, so there is no separate spread flag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedTarget {
    pub relation: String,
    pub alias: Option<String>,
    pub join_type: JoinType,
    pub qualifier: JoinQualifier,
    /// Nested projection; may itself contain embedded targets.
    pub targets: Vec<Target>,
}

// ============================================================================
// Filters
// ============================================================================

/// PostgREST column operators.
///
/// The SQL filter compiler produces the subset `eq..in`; the remaining
/// operators are constructible through the IR and render identically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    Match,
    IMatch,
    Is,
    In,
    Fts,
    Plfts,
    Phfts,
    Wfts,
    Cs,
    Cd,
    Ov,
    Sl,
    Sr,
    Nxr,
    Nxl,
    Adj,
}

impl ColumnOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::ILike => "ilike",
            Self::Match => "match",
            Self::IMatch => "imatch",
            Self::Is => "is",
            Self::In => "in",
            Self::Fts => "fts",
            Self::Plfts => "plfts",
            Self::Phfts => "phfts",
            Self::Wfts => "wfts",
            Self::Cs => "cs",
            Self::Cd => "cd",
            Self::Ov => "ov",
            Self::Sl => "sl",
            Self::Sr => "sr",
            Self::Nxr => "nxr",
            Self::Nxl => "nxl",
            Self::Adj => "adj",
        }
    }
}

/// The column a filter applies to: an embed path (empty for the primary
/// relation), the column name, and an optional JSON path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterColumn {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    pub column: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub json_path: JsonPath,
}

impl FilterColumn {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            column: column.into(),
            json_path: Vec::new(),
        }
    }

    /// The parameter key: embed path, column, and JSON path joined the
    /// way PostgREST expects (`authors.name`, `address->city->>code`).
    pub fn key(&self) -> String {
        let mut key = String::new();
        for segment in &self.path {
            key.push_str(segment);
            key.push('.');
        }
        key.push_str(&self.column);
        for step in &self.json_path {
            key.push_str(&step.to_string());
        }
        key
    }
}

/// A filter operand, already translated into PostgREST's value syntax
/// (LIKE wildcards rewritten, `is` values lowercased).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Scalar(String),
    List(Vec<String>),
}

impl FilterValue {
    pub fn scalar(value: impl Into<String>) -> Self {
        Self::Scalar(value.into())
    }
}

/// A single column filter: `{column} {operator} {value}`, possibly
/// negated (rendered `not.<op>`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnExpression {
    pub column: FilterColumn,
    pub operator: ColumnOperator,
    pub value: FilterValue,
    pub negate: bool,
}

/// Boolean combinators of the target grammar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// A finite tree of filters combined by `and`/`or`, with negation kept
/// on the node it applies to (no De Morgan rewriting).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogicalExpression {
    Column(ColumnExpression),
    Logical {
        operator: LogicalOperator,
        negate: bool,
        values: Vec<LogicalExpression>,
    },
}

impl LogicalExpression {
    pub fn and(values: Vec<LogicalExpression>) -> Self {
        Self::Logical {
            operator: LogicalOperator::And,
            negate: false,
            values,
        }
    }

    pub fn or(values: Vec<LogicalExpression>) -> Self {
        Self::Logical {
            operator: LogicalOperator::Or,
            negate: false,
            values,
        }
    }
}

// ============================================================================
// Sorting
// ============================================================================

/// Sort direction; absence means the PostgREST default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// NULL ordering; absence means the PostgREST default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortNulls {
    First,
    Last,
}

impl SortNulls {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "nullsfirst",
            Self::Last => "nullslast",
        }
    }
}

/// An ORDER BY term; `path` is non-empty for sorted embeds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    pub column: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub json_path: JsonPath,
    pub direction: Option<SortDirection>,
    pub nulls: Option<SortNulls>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_function_from_name() {
        assert_eq!(AggregateFunction::from_name("SUM"), Some(AggregateFunction::Sum));
        assert_eq!(AggregateFunction::from_name("avg"), Some(AggregateFunction::Avg));
        assert_eq!(AggregateFunction::from_name("array_agg"), None);
    }

    #[test]
    fn test_filter_column_key() {
        let mut column = FilterColumn::new("address");
        column.json_path = vec![
            JsonOperation::Arrow(JsonOperand::Key("city".into())),
            JsonOperation::DoubleArrow(JsonOperand::Key("code".into())),
        ];
        assert_eq!(column.key(), "address->city->>code");

        let mut column = FilterColumn::new("name");
        column.path = vec!["authors".into()];
        assert_eq!(column.key(), "authors.name");
    }

    #[test]
    fn test_exposed_name_prefers_last_json_key() {
        let mut target = ColumnTarget::new("address");
        assert_eq!(target.exposed_name(), "address");

        target.json_path = vec![JsonOperation::DoubleArrow(JsonOperand::Key("city".into()))];
        assert_eq!(target.exposed_name(), "city");

        target.json_path = vec![JsonOperation::Arrow(JsonOperand::Idx(0))];
        assert_eq!(target.exposed_name(), "address");
    }

    #[test]
    fn test_statement_serializes_with_type_tag() {
        let statement = Statement::Select(SelectStatement {
            from: Relation::new("books"),
            targets: vec![Target::Star],
            filter: None,
            sorts: vec![],
            limit: None,
            offset: None,
        });
        let json = serde_json::to_value(&statement).unwrap();
        assert_eq!(json["type"], "select");
        assert_eq!(json["from"]["name"], "books");
    }
}

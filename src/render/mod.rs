//! HTTP rendering: [`Statement`] to a PostgREST request.
//!
//! The renderer is a pure, infallible serializer. Parameters come out in
//! a fixed order (`select`, filters in source order, `order`, `limit`,
//! `offset`) and values are emitted un-encoded; percent-encoding is the
//! caller's step via [`HttpRequest::encoded_path`].

use http::Method;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::statement::{
    AggregateTarget, ColumnExpression, ColumnTarget, EmbeddedTarget, JoinType,
    LogicalExpression, LogicalOperator, Sort, Statement, Target,
};

/// Characters escaped by [`HttpRequest::encoded_path`] on top of the
/// URL-hostile controls.
const QUERY_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'&')
    .add(b'+')
    .add(b'%');

/// A rendered PostgREST request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    /// Always `GET` for the SELECT subset.
    pub method: Method,
    /// `/` followed by the primary relation name (never its alias).
    pub path: String,
    /// Ordered query parameters; duplicate keys are legal.
    pub params: Vec<(String, String)>,
    /// `path?params`, un-encoded.
    pub full_path: String,
}

impl HttpRequest {
    /// The full path with keys and values percent-encoded.
    pub fn encoded_path(&self) -> String {
        if self.params.is_empty() {
            return self.path.clone();
        }
        let query = self
            .params
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(key, QUERY_ENCODE),
                    utf8_percent_encode(value, QUERY_ENCODE)
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }
}

/// Render a statement into its HTTP request form.
pub fn render(statement: &Statement) -> HttpRequest {
    let Statement::Select(select) = statement;

    let path = format!("/{}", select.from.name);
    let mut params = Vec::new();

    if let Some(value) = select_param(&select.targets) {
        params.push(("select".to_string(), value));
    }
    if let Some(filter) = &select.filter {
        push_filter_params(filter, &mut params);
    }
    if !select.sorts.is_empty() {
        params.push(("order".to_string(), order_param(&select.sorts)));
    }
    if let Some(limit) = select.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    if let Some(offset) = select.offset {
        params.push(("offset".to_string(), offset.to_string()));
    }

    let full_path = if params.is_empty() {
        path.clone()
    } else {
        let query = params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{path}?{query}")
    };

    HttpRequest {
        method: Method::GET,
        path,
        params,
        full_path,
    }
}

// ============================================================================
// Select string
// ============================================================================

/// Build the `select=` value; a lone `*` projection needs no parameter.
fn select_param(targets: &[Target]) -> Option<String> {
    if matches!(targets, [Target::Star]) {
        return None;
    }
    Some(
        targets
            .iter()
            .map(render_target)
            .collect::<Vec<_>>()
            .join(","),
    )
}

fn render_target(target: &Target) -> String {
    match target {
        Target::Star => "*".to_string(),
        Target::Column(column) => render_column(column),
        Target::Aggregate(aggregate) => render_aggregate(aggregate),
        Target::Embedded(embed) => render_embed(embed),
    }
}

/// `[alias:]name[->jsonpath][::cast]`
fn render_column(column: &ColumnTarget) -> String {
    let mut out = String::new();
    if let Some(alias) = &column.alias {
        out.push_str(alias);
        out.push(':');
    }
    out.push_str(&column.column);
    for step in &column.json_path {
        out.push_str(&step.to_string());
    }
    if let Some(cast) = &column.cast {
        out.push_str("::");
        out.push_str(cast);
    }
    out
}

/// `[alias:]column[::inputCast].fn()[::outputCast]`, or a bare `fn()`
/// for `count(*)`.
fn render_aggregate(aggregate: &AggregateTarget) -> String {
    let mut out = String::new();
    if let Some(alias) = &aggregate.alias {
        out.push_str(alias);
        out.push(':');
    }
    if let Some(input) = &aggregate.input {
        out.push_str(&input.column);
        for step in &input.json_path {
            out.push_str(&step.to_string());
        }
        if let Some(cast) = &aggregate.input_cast {
            out.push_str("::");
            out.push_str(cast);
        }
        out.push('.');
    }
    out.push_str(aggregate.function.as_str());
    out.push_str("()");
    if let Some(cast) = &aggregate.output_cast {
        out.push_str("::");
        out.push_str(cast);
    }
    out
}

/// `...[alias:]name[!inner](childSelect)`; left joins carry no marker.
fn render_embed(embed: &EmbeddedTarget) -> String {
    let mut out = String::from("...");
    if let Some(alias) = &embed.alias {
        out.push_str(alias);
        out.push(':');
    }
    out.push_str(&embed.relation);
    if embed.join_type == JoinType::Inner {
        out.push_str("!inner");
    }
    out.push('(');
    let children = embed
        .targets
        .iter()
        .map(render_target)
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&children);
    out.push(')');
    out
}

// ============================================================================
// Filters
// ============================================================================

/// Emit top-level filter parameters in source order. A non-negated
/// `and` spreads into one parameter per child; every other combinator
/// collapses into a single `[not.]and`/`[not.]or` parameter.
fn push_filter_params(filter: &LogicalExpression, params: &mut Vec<(String, String)>) {
    match filter {
        LogicalExpression::Column(column) => {
            params.push((column.column.key(), top_level_value(column)));
        }
        LogicalExpression::Logical {
            operator: LogicalOperator::And,
            negate: false,
            values,
        } => {
            for value in values {
                push_filter_params(value, params);
            }
        }
        LogicalExpression::Logical {
            operator,
            negate,
            values,
        } => {
            let key = combinator_key(*operator, *negate);
            params.push((key, group_value(values)));
        }
    }
}

/// Top-level leaf value: `[not.]op.value`.
fn top_level_value(column: &ColumnExpression) -> String {
    let mut out = String::new();
    if column.negate {
        out.push_str("not.");
    }
    out.push_str(column.operator.as_str());
    out.push('.');
    out.push_str(&render_filter_value(column, false));
    out
}

/// `(c1,c2,…)` with every child in nested form.
fn group_value(values: &[LogicalExpression]) -> String {
    debug_assert!(!values.is_empty(), "combinator without operands");
    let children = values
        .iter()
        .map(render_nested)
        .collect::<Vec<_>>()
        .join(",");
    format!("({children})")
}

/// Inside a combinator: leaves are `column.[not.]op.value`, nested
/// combinators are `[not.]op(…)`.
fn render_nested(filter: &LogicalExpression) -> String {
    match filter {
        LogicalExpression::Column(column) => {
            let mut out = column.column.key();
            out.push('.');
            if column.negate {
                out.push_str("not.");
            }
            out.push_str(column.operator.as_str());
            out.push('.');
            out.push_str(&render_filter_value(column, true));
            out
        }
        LogicalExpression::Logical {
            operator,
            negate,
            values,
        } => {
            let mut out = combinator_key(*operator, *negate);
            out.push_str(&group_value(values));
            out
        }
    }
}

fn combinator_key(operator: LogicalOperator, negate: bool) -> String {
    if negate {
        format!("not.{}", operator.as_str())
    } else {
        operator.as_str().to_string()
    }
}

fn render_filter_value(column: &ColumnExpression, in_group: bool) -> String {
    match &column.value {
        crate::statement::FilterValue::Scalar(value) => {
            if in_group {
                quote_reserved(value)
            } else {
                value.clone()
            }
        }
        crate::statement::FilterValue::List(items) => {
            let rendered = items
                .iter()
                .map(|item| quote_reserved(item))
                .collect::<Vec<_>>()
                .join(",");
            format!("({rendered})")
        }
    }
}

/// Double-quote values PostgREST would misparse inside a parenthesized
/// list, escaping embedded quotes and backslashes.
fn quote_reserved(value: &str) -> String {
    let needs_quoting = value.is_empty()
        || value.starts_with(' ')
        || value.ends_with(' ')
        || value
            .chars()
            .any(|c| matches!(c, ',' | '(' | ')' | '"' | '\\'));
    if !needs_quoting {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

// ============================================================================
// Ordering
// ============================================================================

/// `[rel.]col[.asc|.desc][.nullsfirst|.nullslast]`, comma separated.
fn order_param(sorts: &[Sort]) -> String {
    sorts
        .iter()
        .map(render_sort)
        .collect::<Vec<_>>()
        .join(",")
}

fn render_sort(sort: &Sort) -> String {
    let mut out = String::new();
    for segment in &sort.path {
        out.push_str(segment);
        out.push('.');
    }
    out.push_str(&sort.column);
    for step in &sort.json_path {
        out.push_str(&step.to_string());
    }
    if let Some(direction) = sort.direction {
        out.push('.');
        out.push_str(direction.as_str());
    }
    if let Some(nulls) = sort.nulls {
        out.push('.');
        out.push_str(nulls.as_str());
    }
    out
}

//! sqlrest - translate a subset of SQL SELECT statements into
//! PostgREST-style HTTP requests.
//!
//! # Architecture
//!
//! The translation pipeline:
//!
//! 1. **Parser adapter** (`parser`) - Parse raw SQL with `sqlparser`'s
//!    PostgreSQL dialect
//! 2. **Validator-transpiler** (`translate`) - Resolve joins, process the
//!    target list, compile filters and sorts, assemble the [`Statement`] IR
//! 3. **HTTP rendering** (`render`) - Serialize the IR into a method,
//!    path, and ordered query parameters
//!
//! Everything is pure and synchronous: no I/O, no shared state, no
//! schema introspection. SQL outside the supported subset is rejected
//! with a typed [`Error`], never approximated.
//!
//! # Example
//!
//! ```
//! use sqlrest::translate_to_http;
//!
//! let request = translate_to_http(
//!     "select title, description from books where title ilike '%cheese%'",
//! )?;
//!
//! assert_eq!(
//!     request.full_path,
//!     "/books?select=title,description&title=ilike.*cheese*",
//! );
//! # Ok::<(), sqlrest::Error>(())
//! ```

pub mod error;
pub mod parser;
pub mod render;
pub mod statement;
pub mod translate;

// Re-export main types
pub use error::{Error, Result};
pub use render::{render, HttpRequest};
pub use statement::{
    AggregateFunction, AggregateTarget, ColumnExpression, ColumnOperator, ColumnTarget,
    EmbeddedTarget, FilterColumn, FilterValue, JoinQualifier, JoinType, JsonOperand,
    JsonOperation, JsonPath, LogicalExpression, LogicalOperator, QualifiedColumn, Relation,
    SelectStatement, Sort, SortDirection, SortNulls, Statement, Target,
};
pub use translate::{translate, translate_query};

/// Translate raw SQL straight to its rendered HTTP request.
pub fn translate_to_http(sql: &str) -> Result<HttpRequest> {
    Ok(render(&translate(sql)?))
}

/// Prelude for common imports.
pub mod prelude {
    pub use super::error::{Error, Result};
    pub use super::render::{render, HttpRequest};
    pub use super::statement::{LogicalExpression, Statement, Target};
    pub use super::translate::{translate, translate_query};
    pub use super::translate_to_http;
}

//! End-to-end translation scenarios: SQL in, full PostgREST path out.

use http::Method;
use pretty_assertions::assert_eq;
use sqlrest::{translate, translate_to_http, Statement, Target};

fn full_path(sql: &str) -> String {
    translate_to_http(sql).unwrap().full_path
}

fn error_code(sql: &str) -> &'static str {
    translate_to_http(sql).unwrap_err().code()
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[test]
fn test_plain_projection() {
    assert_eq!(
        full_path("select title, description from books"),
        "/books?select=title,description"
    );
}

#[test]
fn test_filters_in_source_order() {
    assert_eq!(
        full_path("select * from books where title = 'Cheese' and description ilike '%salsa%'"),
        "/books?title=eq.Cheese&description=ilike.*salsa*"
    );
}

#[test]
fn test_negated_or_group() {
    assert_eq!(
        full_path("select * from books where not (title = 'Cheese' or title = 'Salsa')"),
        "/books?not.or=(title.eq.Cheese,title.eq.Salsa)"
    );
}

#[test]
fn test_inner_join_embed() {
    assert_eq!(
        full_path("select *, authors.name from books join authors on author_id = authors.id"),
        "/books?select=*,...authors!inner(name)"
    );
}

#[test]
fn test_aggregate_with_output_cast() {
    assert_eq!(
        full_path("select sum(amount)::float from orders"),
        "/orders?select=amount.sum()::float"
    );
}

#[test]
fn test_order_limit_offset() {
    assert_eq!(
        full_path("select * from books order by title desc nulls last limit 5 offset 10"),
        "/books?order=title.desc.nullslast&limit=5&offset=10"
    );
}

#[test]
fn test_json_path_strips_quotes() {
    assert_eq!(
        full_path("select address->'city'->>'name' from books"),
        "/books?select=address->city->>name"
    );
}

// ============================================================================
// Supplemental scenarios
// ============================================================================

#[test]
fn test_left_join_has_no_marker() {
    assert_eq!(
        full_path(
            "select title, authors.name from books \
             left join authors on author_id = authors.id"
        ),
        "/books?select=title,...authors(name)"
    );
}

#[test]
fn test_nested_embeds() {
    assert_eq!(
        full_path(
            "select title, authors.name, publishers.name from books \
             join authors on author_id = authors.id \
             join publishers on authors.publisher_id = publishers.id"
        ),
        "/books?select=title,...authors!inner(name,...publishers!inner(name))"
    );
}

#[test]
fn test_aliased_join_renders_alias() {
    assert_eq!(
        full_path("select a.name from books join authors a on author_id = a.id"),
        "/books?select=...a:authors!inner(name)"
    );
}

#[test]
fn test_unreferenced_join_appended() {
    assert_eq!(
        full_path("select title from books join authors on author_id = authors.id"),
        "/books?select=title,...authors!inner()"
    );
}

#[test]
fn test_qualified_star_embed() {
    assert_eq!(
        full_path("select authors.* from books join authors on author_id = authors.id"),
        "/books?select=...authors!inner(*)"
    );
}

#[test]
fn test_count_star() {
    assert_eq!(
        full_path("select count(*) from books"),
        "/books?select=count()"
    );
}

#[test]
fn test_aggregate_input_cast_and_alias() {
    assert_eq!(
        full_path("select sum(amount::bigint) as total from orders"),
        "/orders?select=total:amount::bigint.sum()"
    );
}

#[test]
fn test_embedded_aggregate() {
    assert_eq!(
        full_path(
            "select title, sum(orders.amount) from books \
             join orders on orders.book_id = id"
        ),
        "/books?select=title,...orders!inner(amount.sum())"
    );
}

#[test]
fn test_group_by_validates_but_does_not_render() {
    assert_eq!(
        full_path("select title, count(*) from books group by title"),
        "/books?select=title,count()"
    );
}

#[test]
fn test_json_path_filter_key() {
    assert_eq!(
        full_path("select * from books where address->>'city' = 'Berlin'"),
        "/books?address->>city=eq.Berlin"
    );
}

#[test]
fn test_embed_path_filter_and_sort() {
    assert_eq!(
        full_path(
            "select title from books join authors on author_id = authors.id \
             where authors.name like 'A%' order by authors.name desc"
        ),
        "/books?select=title,...authors!inner()&authors.name=like.A*&order=authors.name.desc"
    );
}

#[test]
fn test_in_list() {
    assert_eq!(
        full_path("select * from books where id in (1, 2, 3)"),
        "/books?id=in.(1,2,3)"
    );
}

#[test]
fn test_not_in_list() {
    assert_eq!(
        full_path("select * from books where id not in (1, 2)"),
        "/books?id=not.in.(1,2)"
    );
}

#[test]
fn test_boolean_is_tests() {
    assert_eq!(
        full_path("select * from books where available is true"),
        "/books?available=is.true"
    );
    assert_eq!(
        full_path("select * from books where available is not false"),
        "/books?available=not.is.false"
    );
}

#[test]
fn test_mixed_and_with_nested_group() {
    assert_eq!(
        full_path("select * from books where a = 1 and (b = 2 or c = 3)"),
        "/books?a=eq.1&or=(b.eq.2,c.eq.3)"
    );
}

#[test]
fn test_regex_match() {
    assert_eq!(
        full_path("select * from books where title ~* '^the'"),
        "/books?title=imatch.^the"
    );
}

#[test]
fn test_reserved_value_quoted_in_group() {
    assert_eq!(
        full_path("select * from books where title = 'a,b' or title = 'c'"),
        "/books?or=(title.eq.\"a,b\",title.eq.c)"
    );
}

#[test]
fn test_column_alias() {
    assert_eq!(
        full_path("select title as name from books"),
        "/books?select=name:title"
    );
}

#[test]
fn test_column_cast() {
    assert_eq!(
        full_path("select price::text from books"),
        "/books?select=price::text"
    );
}

// ============================================================================
// Universal properties
// ============================================================================

#[test]
fn test_determinism() {
    let sql = "select *, authors.name from books join authors on author_id = authors.id \
               where title = 'x' order by title limit 3";
    assert_eq!(full_path(sql), full_path(sql));
}

#[test]
fn test_path_ignores_alias() {
    let request = translate_to_http("select b.title from books b").unwrap();
    assert_eq!(request.path, "/books");
    assert_eq!(request.full_path, "/books?select=title");
}

#[test]
fn test_select_order_matches_source() {
    assert_eq!(
        full_path("select description, title from books"),
        "/books?select=description,title"
    );
}

#[test]
fn test_alias_matching_column_elided() {
    assert_eq!(
        full_path("select title as title from books"),
        "/books?select=title"
    );
}

#[test]
fn test_double_negation_is_identity() {
    assert_eq!(
        full_path("select * from books where not (not (title = 'x'))"),
        full_path("select * from books where title = 'x'")
    );
}

#[test]
fn test_method_is_always_get() {
    let request = translate_to_http("select * from books").unwrap();
    assert_eq!(request.method, Method::GET);
    assert_eq!(request.full_path, "/books");
}

#[test]
fn test_statement_ir_serializes() {
    let statement = translate("select title from books").unwrap();
    let json = serde_json::to_value(&statement).unwrap();
    assert_eq!(json["type"], "select");
    assert_eq!(json["from"]["name"], "books");

    let Statement::Select(select) = statement;
    assert!(matches!(select.targets[0], Target::Column(_)));
}

// ============================================================================
// Rejection fixtures, one per error kind
// ============================================================================

#[test]
fn test_rejections() {
    for (sql, code) in [
        ("select 1 + 1 from books", "unsupported_expression"),
        ("select title", "missing_from_clause"),
        ("select * from books, authors", "multiple_from_relations"),
        (
            "select * from books right join authors on author_id = authors.id",
            "unsupported_join_type",
        ),
        (
            "select * from books join authors on author_id > authors.id",
            "non_equi_join",
        ),
        (
            "select * from books join authors on authors.id = 42",
            "constant_in_join",
        ),
        (
            "select * from books join authors on authors.id = authors.editor_id",
            "self_join_unsupported",
        ),
        ("select publishers.name from books", "unknown_relation"),
        (
            "select * from books where authors.name = 'x'",
            "foreign_column_without_join",
        ),
        (
            "select * from books where title::text = 'x'",
            "cast_outside_target",
        ),
        ("select array_agg(title) from books", "unsupported_aggregate"),
        ("select sum(title, 2) from books", "aggregate_argument_shape"),
        (
            "select title from books group by title",
            "group_by_without_aggregate",
        ),
        (
            "select title, count(*) from books group by description",
            "group_by_missing_target",
        ),
        (
            "select title, count(*) from books group by title having count(*) > 1",
            "having_unsupported",
        ),
        ("select * from books limit -1", "invalid_limit"),
        ("select * from books offset -1", "invalid_offset"),
        (
            "select * from books where title is distinct from 'x'",
            "unsupported_operator",
        ),
        ("select address->title from books", "invalid_json_path"),
    ] {
        assert_eq!(error_code(sql), code, "for SQL: {sql}");
    }
}

#[test]
fn test_error_messages_are_human_readable() {
    let err = translate_to_http("select * from books where title between 'a' and 'b'")
        .unwrap_err();
    assert!(err.to_string().contains("BETWEEN"));

    let err = translate_to_http("select * from books cross join authors").unwrap_err();
    assert!(err.to_string().contains("CROSS JOIN"));
}

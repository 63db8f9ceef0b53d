//! End-to-end tests from query string to compiled SQL.

use restbase_query::{
    FilterValue, Operator, PaginationPolicy, ParamSink, QueryCompiler, QueryError,
    QueryStringParser, SqlValue, build_where_clause, normalize,
};

fn compile_where(query: &str) -> (String, Vec<SqlValue>) {
    let params = QueryStringParser::parse(query).expect("query should parse");
    let mut sink = ParamSink::new();
    let sql = build_where_clause(&params.filters, &mut sink)
        .expect("filters should compile")
        .unwrap_or_default();
    (sql, sink.into_params())
}

fn placeholder_count(sql: &str) -> usize {
    sql.matches('$').count()
}

#[test]
fn equality_binds_one_text_param() {
    let (sql, params) = compile_where("name.eq=John");
    assert_eq!(sql, r#""name" = $1"#);
    assert_eq!(params, vec![SqlValue::Text("John".into())]);
}

#[test]
fn in_list_binds_single_array_param() {
    let (sql, params) = compile_where("status.in=queued,running");
    assert_eq!(sql, r#""status" = ANY($1)"#);
    assert_eq!(
        params,
        vec![SqlValue::TextArray(vec!["queued".into(), "running".into()])]
    );
}

#[test]
fn is_null_binds_nothing() {
    let (sql, params) = compile_where("deleted_at.is=null");
    assert_eq!(sql, r#""deleted_at" IS NULL"#);
    assert!(params.is_empty());
}

#[test]
fn json_text_path_ordering_casts_to_numeric() {
    let (sql, params) = compile_where("metadata->stats->>count.gt=10");
    assert_eq!(sql, r#"("metadata"->'stats'->>'count')::numeric > $1"#);
    assert_eq!(params, vec![SqlValue::Integer(10)]);
}

#[test]
fn offset_near_total_cap_shrinks_limit() {
    let policy = PaginationPolicy {
        max_page_size: 1000,
        max_total_results: 10_000,
        default_page_size: -1,
    };
    let params = QueryStringParser::parse("offset=9500&limit=1000")
        .unwrap()
        .paginate(&policy);
    assert_eq!(params.limit, Some(500));
    assert_eq!(params.offset, Some(9500));

    let page = normalize(Some(1000), Some(9500), &policy);
    assert_eq!(page.limit, Some(500));
    assert_eq!(page.offset, 9500);
}

#[test]
fn or_group_renders_parenthesized_disjunction() {
    let params = QueryStringParser::parse("or=(name.eq.John,name.eq.Jane)").unwrap();
    assert_eq!(params.filters.len(), 2);
    assert!(params.filters.iter().all(|f| f.is_or()));
    assert_eq!(params.filters[0].or_group, params.filters[1].or_group);

    let (sql, params) = compile_where("or=(name.eq.John,name.eq.Jane)");
    assert_eq!(sql, r#"("name" = $1 OR "name" = $2)"#);
    assert_eq!(
        params,
        vec![SqlValue::Text("John".into()), SqlValue::Text("Jane".into())]
    );
}

#[test]
fn every_operator_binds_one_placeholder() {
    let cases = [
        ("a.eq=1", 1),
        ("a.neq=1", 1),
        ("a.gt=1", 1),
        ("a.gte=1", 1),
        ("a.lt=1", 1),
        ("a.lte=1", 1),
        ("a.like=x%25", 1),
        ("a.ilike=x%25", 1),
        ("a.is=true", 1),
        ("a.is=null", 0),
        ("a.in=x,y,z", 1),
    ];
    for (query, expected) in cases {
        let (sql, params) = compile_where(query);
        assert_eq!(placeholder_count(&sql), expected, "{query}: {sql}");
        assert_eq!(params.len(), expected, "{query}");
    }
}

#[test]
fn st_dwithin_binds_geometry_and_distance() {
    let query = "location.st_dwithin=250,%7B%22type%22%3A%22Point%22%2C%22coordinates%22%3A%5B1%2C2%5D%7D";
    let (sql, params) = compile_where(query);
    assert_eq!(
        sql,
        r#"ST_DWithin("location", ST_GeomFromGeoJSON($1), $2)"#
    );
    assert_eq!(
        params[0],
        SqlValue::Text(r#"{"type":"Point","coordinates":[1,2]}"#.into())
    );
    assert_eq!(params[1], SqlValue::Float(250.0));
}

#[test]
fn repeated_keys_make_a_range() {
    let params = QueryStringParser::parse("price=gte.10&price=lte.20").unwrap();
    assert_eq!(params.filters.len(), 2);
    assert_eq!(params.filters[0].operator, Operator::Gte);
    assert_eq!(params.filters[1].operator, Operator::Lte);
    assert_eq!(params.filters[0].value, FilterValue::from("10"));

    let (sql, _) = compile_where("price=gte.10&price=lte.20");
    assert_eq!(sql, r#""price" >= $1 AND "price" <= $2"#);
}

#[test]
fn nested_or_groups_never_collapse() {
    let (sql, params) = compile_where("and=(or(x.lt.10,x.gt.20),or(y.lt.1,y.gt.2))");
    assert_eq!(
        sql,
        r#"("x" < $1 OR "x" > $2) AND ("y" < $3 OR "y" > $4)"#
    );
    assert_eq!(sql.matches(" OR ").count(), 2);
    assert_eq!(params.len(), 4);
}

#[test]
fn mixed_groups_and_plain_filters() {
    let (sql, _) = compile_where("status.eq=open&or=(priority.eq.high,owner.is.null)");
    assert_eq!(
        sql,
        r#""status" = $1 AND ("priority" = $2 OR "owner" IS NULL)"#
    );
}

#[test]
fn compiling_twice_is_identical() {
    let params = QueryStringParser::parse(
        "select=id,meta:data->meta&or=(a.eq.1,b.gt.2)&data->>n.lte=5&order=id.desc&limit=5",
    )
    .unwrap();
    let compiler = QueryCompiler::new("items");
    let first = compiler.compile(&params).unwrap();
    let second = compiler.compile(&params).unwrap();
    assert_eq!(first, second);
}

#[test]
fn full_select_statement() {
    let params = QueryStringParser::parse(
        "select=region,total:sum(amount),count(*)&status.eq=paid&order=total.desc&limit=10",
    )
    .unwrap();
    let query = QueryCompiler::new("orders").compile(&params).unwrap();
    assert_eq!(
        query.sql,
        r#"SELECT "region", SUM("amount") AS "total", COUNT(*) AS "count" FROM "orders" WHERE "status" = $1 GROUP BY "region" ORDER BY "total" DESC LIMIT 10"#
    );
    assert_eq!(query.params, vec![SqlValue::Text("paid".into())]);
}

#[test]
fn identifiers_cannot_break_out() {
    let (sql, params) = compile_where("na%22me.eq=x%27%3B%20DROP%20TABLE%20users%3B--");
    assert_eq!(sql, r#""na""me" = $1"#);
    assert_eq!(
        params,
        vec![SqlValue::Text("x'; DROP TABLE users;--".into())]
    );

    let (sql, _) = compile_where("data->>it%27s.eq=1");
    assert_eq!(sql, r#""data"->>'it''s' = $1"#);
}

#[test]
fn malformed_queries_are_client_errors() {
    for query in [
        "or=(a.eq.1",
        "or=(a.eq.1,)",
        "and=(a.eq.1))",
        "name=John",
        "limit=ten",
        "=eq.1",
    ] {
        let err = QueryStringParser::parse(query).expect_err(query);
        assert!(QueryError::from(err).is_client_error(), "{query}");
    }
}

#[test]
fn validation_errors_are_client_errors() {
    let params = QueryStringParser::parse("loc.st_dwithin=-10,%7B%7D").unwrap();
    let err = QueryCompiler::new("places").compile(&params).unwrap_err();
    assert!(err.is_client_error());
}

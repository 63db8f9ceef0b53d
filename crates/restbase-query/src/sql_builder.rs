//! SQL compiler for parsed queries.
//!
//! Renders a [`QueryParams`] into a parameterized statement. Identifiers go
//! through [`quote_identifier`] / [`ColumnPath`]; values go through
//! [`ParamSink`], the only place placeholders are produced. No caller value
//! is ever written into SQL text.
//!
//! ```
//! use restbase_query::{QueryCompiler, QueryStringParser, SqlValue};
//!
//! let params = QueryStringParser::parse("name.eq=John").unwrap();
//! let query = QueryCompiler::new("users").compile(&params).unwrap();
//! assert_eq!(query.sql, r#"SELECT * FROM "users" WHERE "name" = $1"#);
//! assert_eq!(query.params, vec![SqlValue::Text("John".into())]);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{CompileError, Result, ValidationError};
use crate::ident::{ColumnPath, quote_identifier, quote_table};
use crate::params::{
    AggregateFunction, Aggregation, Filter, NullsOrder, Operator, OrderBy, QueryParams,
    SelectColumn,
};
use crate::schema::{ColumnInfo, TableInfo, validate_columns};
use crate::value::{FilterValue, SqlValue};

/// Maximum number of filters in one query.
pub const MAX_FILTERS: usize = 100;

/// Accumulates bind parameters and hands out their placeholders.
#[derive(Debug, Default)]
pub struct ParamSink {
    params: Vec<SqlValue>,
}

impl ParamSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return its placeholder (`$n`, or `$n::vector`).
    pub fn push(&mut self, value: SqlValue) -> String {
        self.push_cast(value, None)
    }

    /// Bind a value whose placeholder is cast to `cast` (`$n::integer`).
    ///
    /// `cast` must be a vetted type name, see [`ColumnInfo::cast_type`].
    /// Vector values always cast to `vector`.
    pub fn push_cast(&mut self, value: SqlValue, cast: Option<&str>) -> String {
        let cast = if value.is_vector() { Some("vector") } else { cast };
        self.params.push(value);
        let n = self.params.len();
        match cast {
            Some(cast) => format!("${n}::{cast}"),
            None => format!("${n}"),
        }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn into_params(self) -> Vec<SqlValue> {
        self.params
    }
}

/// A compiled statement and its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

/// Compiles queries against one table.
///
/// With [`TableInfo`] attached, every referenced column is checked before
/// compiling and placeholders compared with plain columns carry the
/// column's type. Without it, scalar values bind as `text`, numbers as
/// `bigint`/`double precision`, and the server resolves the comparison.
#[derive(Debug, Clone)]
pub struct QueryCompiler {
    schema: Option<String>,
    table: String,
    table_info: Option<Arc<TableInfo>>,
}

impl QueryCompiler {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            schema: None,
            table: table.into(),
            table_info: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_table_info(mut self, info: impl Into<Arc<TableInfo>>) -> Self {
        self.table_info = Some(info.into());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn table_info(&self) -> Option<&TableInfo> {
        self.table_info.as_deref()
    }

    /// Check every column `params` references against the attached
    /// metadata. A no-op without metadata.
    pub fn validate_columns(&self, params: &QueryParams) -> Result<()> {
        if let Some(info) = self.table_info() {
            validate_columns(params, info)?;
        }
        Ok(())
    }

    fn check_columns<'a>(&self, columns: impl IntoIterator<Item = &'a str>) -> Result<()> {
        if let Some(info) = self.table_info() {
            for column in columns {
                info.check_column(column)?;
            }
        }
        Ok(())
    }

    fn column_cast(&self, column: &str) -> Option<&str> {
        self.table_info()
            .and_then(|info| info.column(column))
            .and_then(ColumnInfo::cast_type)
    }

    fn table_sql(&self) -> Result<String> {
        Ok(quote_table(self.schema.as_deref(), &self.table)?)
    }

    fn validate(filters: &[Filter]) -> Result<()> {
        if filters.len() > MAX_FILTERS {
            return Err(ValidationError::QueryTooComplex(format!(
                "Too many filters: {} (max {MAX_FILTERS})",
                filters.len()
            ))
            .into());
        }
        Ok(())
    }

    /// Compile the full SELECT statement.
    pub fn compile(&self, params: &QueryParams) -> Result<CompiledQuery> {
        let query = self.compile_select(params, &[])?;
        tracing::debug!(sql = %query.sql, params = query.params.len(), "compiled select");
        Ok(query)
    }

    /// SELECT returning one `jsonb` object per row, in the requested order.
    ///
    /// Each ORDER BY key is also projected as a hidden `_order_n` column so
    /// the outer query can re-apply the order; the keys are removed from
    /// the returned objects.
    pub fn compile_rows(&self, params: &QueryParams) -> Result<CompiledQuery> {
        let mut keys = Vec::with_capacity(params.order.len());
        let mut outer_order = Vec::with_capacity(params.order.len());
        for (i, term) in params.order.iter().enumerate() {
            let name = format!("_order_{}", i + 1);
            keys.push((order_key_expr(params, term)?, name.clone()));
            outer_order.push(order_term_sql(&quote_identifier(&name)?, term));
        }

        let inner = self.compile_select(params, &keys)?;
        let mut sql = String::from("SELECT to_jsonb(_rows)");
        for (_, name) in &keys {
            sql.push_str(&format!(" - '{name}'"));
        }
        sql.push_str(&format!(" FROM ({}) AS _rows", inner.sql));
        if !outer_order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&outer_order.join(", "));
        }

        tracing::debug!(sql = %sql, params = inner.params.len(), "compiled json rows");
        Ok(CompiledQuery {
            sql,
            params: inner.params,
        })
    }

    /// SELECT with `extra` `(expression, alias)` pairs appended to the list.
    fn compile_select(
        &self,
        params: &QueryParams,
        extra: &[(String, String)],
    ) -> Result<CompiledQuery> {
        Self::validate(&params.filters)?;
        self.validate_columns(params)?;

        let mut sink = ParamSink::new();
        let mut select = build_select_clause(params)?;
        for (expr, alias) in extra {
            select.push_str(&format!(", {expr} AS {}", quote_identifier(alias)?));
        }
        let mut sql = format!("SELECT {select} FROM {}", self.table_sql()?);

        if let Some(where_sql) = where_clause(&params.filters, self.table_info(), &mut sink)? {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }

        sql.push_str(&build_group_by_clause(&params.grouping_keys())?);

        let order = build_order_clause(&params.order)?;
        if !order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }

        if let Some(limit) = params.limit {
            // LIMIT is a bigint; larger values mean no limit anyway
            sql.push_str(&format!(" LIMIT {}", limit.min(i64::MAX as u64)));
        }
        if let Some(offset) = params.offset.filter(|o| *o > 0) {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        Ok(CompiledQuery {
            sql,
            params: sink.into_params(),
        })
    }

    /// Exact total for the same filters, ignoring pagination and ordering.
    ///
    /// For aggregate queries this counts groups rather than rows.
    pub fn compile_count(&self, params: &QueryParams) -> Result<CompiledQuery> {
        Self::validate(&params.filters)?;
        self.validate_columns(params)?;

        let mut sink = ParamSink::new();
        let table = self.table_sql()?;
        let where_sql = where_clause(&params.filters, self.table_info(), &mut sink)?
            .map(|w| format!(" WHERE {w}"))
            .unwrap_or_default();

        let sql = if params.is_aggregate() {
            format!(
                "SELECT COUNT(*) AS total FROM (SELECT 1 FROM {table}{where_sql}{}) AS _groups",
                build_group_by_clause(&params.grouping_keys())?
            )
        } else {
            format!("SELECT COUNT(*) AS total FROM {table}{where_sql}")
        };

        tracing::debug!(sql = %sql, params = sink.len(), "compiled count");
        Ok(CompiledQuery {
            sql,
            params: sink.into_params(),
        })
    }

    /// `EXPLAIN (FORMAT JSON)` of the unpaginated query.
    ///
    /// The top plan node's `Plan Rows` is the planner's estimate of the
    /// total matching rows.
    pub fn compile_explain(&self, params: &QueryParams) -> Result<CompiledQuery> {
        let unpaginated = QueryParams {
            order: Vec::new(),
            limit: None,
            offset: None,
            ..params.clone()
        };
        let query = self.compile(&unpaginated)?;
        Ok(CompiledQuery {
            sql: format!("EXPLAIN (FORMAT JSON) {}", query.sql),
            params: query.params,
        })
    }

    /// `INSERT ... RETURNING *` for one row.
    pub fn compile_insert(&self, values: &[(String, SqlValue)]) -> Result<CompiledQuery> {
        let table = self.table_sql()?;
        if values.is_empty() {
            return Ok(CompiledQuery {
                sql: format!("INSERT INTO {table} DEFAULT VALUES RETURNING *"),
                params: Vec::new(),
            });
        }

        self.check_columns(values.iter().map(|(column, _)| column.as_str()))?;

        let mut sink = ParamSink::new();
        let mut columns = Vec::with_capacity(values.len());
        let mut placeholders = Vec::with_capacity(values.len());
        for (column, value) in values {
            columns.push(quote_identifier(column)?);
            placeholders.push(sink.push_cast(value.clone(), self.column_cast(column)));
        }

        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({}) RETURNING *",
            columns.join(", "),
            placeholders.join(", ")
        );
        tracing::debug!(sql = %sql, params = sink.len(), "compiled insert");
        Ok(CompiledQuery {
            sql,
            params: sink.into_params(),
        })
    }

    /// `UPDATE ... SET ... WHERE ... RETURNING *`.
    pub fn compile_update(
        &self,
        values: &[(String, SqlValue)],
        filters: &[Filter],
    ) -> Result<CompiledQuery> {
        if values.is_empty() {
            return Err(ValidationError::EmptyUpdate.into());
        }
        Self::validate(filters)?;
        self.check_columns(
            values
                .iter()
                .map(|(column, _)| column.as_str())
                .chain(filters.iter().map(|f| f.column.as_str())),
        )?;

        let mut sink = ParamSink::new();
        let mut assignments = Vec::with_capacity(values.len());
        for (column, value) in values {
            let placeholder = sink.push_cast(value.clone(), self.column_cast(column));
            assignments.push(format!("{} = {placeholder}", quote_identifier(column)?));
        }

        let mut sql = format!(
            "UPDATE {} SET {}",
            self.table_sql()?,
            assignments.join(", ")
        );
        if let Some(where_sql) = where_clause(filters, self.table_info(), &mut sink)? {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
        sql.push_str(" RETURNING *");

        tracing::debug!(sql = %sql, params = sink.len(), "compiled update");
        Ok(CompiledQuery {
            sql,
            params: sink.into_params(),
        })
    }

    /// `DELETE ... WHERE ... RETURNING *`.
    pub fn compile_delete(&self, filters: &[Filter]) -> Result<CompiledQuery> {
        Self::validate(filters)?;
        self.check_columns(filters.iter().map(|f| f.column.as_str()))?;

        let mut sink = ParamSink::new();
        let mut sql = format!("DELETE FROM {}", self.table_sql()?);
        if let Some(where_sql) = where_clause(filters, self.table_info(), &mut sink)? {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
        sql.push_str(" RETURNING *");

        tracing::debug!(sql = %sql, params = sink.len(), "compiled delete");
        Ok(CompiledQuery {
            sql,
            params: sink.into_params(),
        })
    }
}

/// Compile `params` into a SELECT over `table`.
pub fn compile(params: &QueryParams, table: &str) -> Result<CompiledQuery> {
    QueryCompiler::new(table).compile(params)
}

/// Columns for insert/update from a JSON object.
pub fn row_values(row: &serde_json::Map<String, Value>) -> Vec<(String, SqlValue)> {
    row.iter()
        .map(|(column, value)| (column.clone(), SqlValue::from_json(value)))
        .collect()
}

/// Render the SELECT list (without the `SELECT` keyword).
///
/// Plain columns come first, then aggregations as `FUNC(arg) AS "alias"`.
/// When aggregating, plain columns are grouping keys; if none were
/// selected the explicit `group_by` columns are projected instead.
pub fn build_select_clause(params: &QueryParams) -> Result<String> {
    let mut items = Vec::new();

    if params.is_aggregate() {
        let keys: Vec<&SelectColumn> = params
            .select
            .iter()
            .filter(|c| !c.is_wildcard())
            .collect();
        if keys.is_empty() {
            for column in &params.group_by {
                items.push(render_select_column(&SelectColumn::new(column.as_str()))?);
            }
        } else {
            for column in keys {
                items.push(render_select_column(column)?);
            }
        }
        for aggregation in &params.aggregations {
            items.push(render_aggregation(aggregation)?);
        }
    } else {
        for column in &params.select {
            items.push(render_select_column(column)?);
        }
    }

    if items.is_empty() {
        return Ok("*".to_string());
    }
    Ok(items.join(", "))
}

fn render_select_column(column: &SelectColumn) -> Result<String> {
    if column.is_wildcard() {
        return Ok("*".to_string());
    }

    let path = ColumnPath::parse(&column.column)?;
    let sql = path.to_sql();
    match (&column.alias, path.is_json()) {
        (Some(alias), _) => Ok(format!("{sql} AS {}", quote_identifier(alias)?)),
        (None, true) => Ok(format!("{sql} AS {}", quote_identifier(&path.output_name())?)),
        (None, false) => Ok(sql),
    }
}

fn render_aggregation(aggregation: &Aggregation) -> Result<String> {
    Ok(format!(
        "{} AS {}",
        aggregate_expr(aggregation)?,
        quote_identifier(&aggregation.output_alias())?
    ))
}

/// `FUNC(arg)` without an alias.
fn aggregate_expr(aggregation: &Aggregation) -> Result<String> {
    let argument = match (aggregation.function, &aggregation.column) {
        (AggregateFunction::CountAll, _) => "*".to_string(),
        (function, None) => {
            return Err(CompileError::MissingAggregateColumn(function.name().to_string()).into());
        }
        (function, Some(column)) => {
            let path = ColumnPath::parse(column)?;
            if function.is_arithmetic() && path.extracts_text() {
                format!("({})::numeric", path.to_sql())
            } else {
                path.to_sql()
            }
        }
    };

    Ok(format!("{}({argument})", aggregation.function.as_sql()))
}

/// Render ` GROUP BY "c1", "c2"`, or an empty string for no columns.
pub fn build_group_by_clause(columns: &[&str]) -> Result<String> {
    if columns.is_empty() {
        return Ok(String::new());
    }

    let rendered = columns
        .iter()
        .map(|column| ColumnPath::parse(column).map(|path| path.to_sql()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(format!(" GROUP BY {}", rendered.join(", ")))
}

/// Render ORDER BY terms (without the keyword), or an empty string.
pub fn build_order_clause(order: &[OrderBy]) -> Result<String> {
    let mut terms = Vec::with_capacity(order.len());
    for term in order {
        let path = ColumnPath::parse(&term.column)?;
        terms.push(order_term_sql(&path.to_sql(), term));
    }
    Ok(terms.join(", "))
}

fn order_term_sql(key: &str, term: &OrderBy) -> String {
    let mut sql = format!("{key} {}", if term.desc { "DESC" } else { "ASC" });
    match term.nulls {
        Some(NullsOrder::First) => sql.push_str(" NULLS FIRST"),
        Some(NullsOrder::Last) => sql.push_str(" NULLS LAST"),
        None => {}
    }
    sql
}

/// The expression an ORDER BY name refers to: an aggregate or select
/// alias first, as PostgreSQL resolves output names, then a column.
fn order_key_expr(params: &QueryParams, term: &OrderBy) -> Result<String> {
    if let Some(aggregation) = params
        .aggregations
        .iter()
        .find(|a| a.output_alias() == term.column)
    {
        return aggregate_expr(aggregation);
    }
    for column in params.select.iter().filter(|c| !c.is_wildcard()) {
        let path = ColumnPath::parse(&column.column)?;
        let output = match &column.alias {
            Some(alias) => alias.clone(),
            None => path.output_name(),
        };
        if output == term.column {
            return Ok(path.to_sql());
        }
    }
    Ok(ColumnPath::parse(&term.column)?.to_sql())
}

/// Render the WHERE condition (without the keyword).
///
/// Filters are partitioned by OR group in first-appearance order. Each group
/// renders as `(a OR b)`; groups and ungrouped filters are joined with
/// ` AND `. Parameters are numbered in rendering order.
pub fn build_where_clause(filters: &[Filter], sink: &mut ParamSink) -> Result<Option<String>> {
    where_clause(filters, None, sink)
}

fn where_clause(
    filters: &[Filter],
    table: Option<&TableInfo>,
    sink: &mut ParamSink,
) -> Result<Option<String>> {
    if filters.is_empty() {
        return Ok(None);
    }

    enum Part<'a> {
        Single(&'a Filter),
        Group(Vec<&'a Filter>),
    }

    let mut parts: Vec<Part<'_>> = Vec::new();
    let mut group_index: HashMap<u32, usize> = HashMap::new();
    for filter in filters {
        match filter.or_group {
            Some(group) => match group_index.get(&group) {
                Some(&idx) => {
                    if let Part::Group(members) = &mut parts[idx] {
                        members.push(filter);
                    }
                }
                None => {
                    group_index.insert(group, parts.len());
                    parts.push(Part::Group(vec![filter]));
                }
            },
            None => parts.push(Part::Single(filter)),
        }
    }

    let mut rendered = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            Part::Single(filter) => rendered.push(render_filter(filter, table, sink)?),
            Part::Group(members) => {
                let mut alternatives = Vec::with_capacity(members.len());
                for filter in members {
                    alternatives.push(render_filter(filter, table, sink)?);
                }
                rendered.push(format!("({})", alternatives.join(" OR ")));
            }
        }
    }

    Ok(Some(rendered.join(" AND ")))
}

/// Render one predicate, binding its value(s).
///
/// Placeholders compared with a plain column of known type are cast to
/// that type, so `id=eq.1` on an integer column compares integers.
fn render_filter(
    filter: &Filter,
    table: Option<&TableInfo>,
    sink: &mut ParamSink,
) -> Result<String> {
    let path = ColumnPath::parse(&filter.column)?;
    let lhs = path.to_sql();
    let column = if path.is_json() {
        None
    } else {
        table.and_then(|t| t.column(path.column()))
    };
    let invalid = |message: &str| {
        ValidationError::invalid_value(&filter.column, filter.operator.as_str(), message)
    };

    match filter.operator {
        Operator::Is => match &filter.value {
            FilterValue::Null => Ok(format!("{lhs} IS NULL")),
            FilterValue::Bool(b) => Ok(format!(
                "{lhs} IS NOT DISTINCT FROM {}",
                sink.push(SqlValue::Boolean(*b))
            )),
            _ => Err(invalid("expected null, true or false").into()),
        },

        Operator::In => {
            let items = match &filter.value {
                FilterValue::StringArray(items) => items.clone(),
                FilterValue::String(s) => s.split(',').map(|i| i.trim().to_string()).collect(),
                FilterValue::Number(n) => vec![n.to_string()],
                FilterValue::Bool(_) | FilterValue::Null => {
                    return Err(invalid("expected a list of values").into());
                }
            };
            let lhs = if path.extracts_json() { json_as_text(&lhs) } else { lhs };
            let cast = column
                .filter(|c| !c.is_array())
                .and_then(ColumnInfo::cast_type)
                .map(|t| format!("{t}[]"));
            Ok(format!(
                "{lhs} = ANY({})",
                sink.push_cast(SqlValue::TextArray(items), cast.as_deref())
            ))
        }

        Operator::StDWithin => {
            let FilterValue::String(raw) = &filter.value else {
                return Err(ValidationError::InvalidGeoFilter(
                    "expected 'distance,geojson'".to_string(),
                )
                .into());
            };
            let (distance, geometry) = parse_geo_value(raw)?;
            let geometry = sink.push(SqlValue::Text(geometry));
            let distance = sink.push(SqlValue::Float(distance));
            Ok(format!(
                "ST_DWithin({lhs}, ST_GeomFromGeoJSON({geometry}), {distance})"
            ))
        }

        operator => {
            let Some(op_sql) = operator.as_sql() else {
                return Err(CompileError::Invariant(format!(
                    "operator {operator} has no binary form"
                ))
                .into());
            };

            match &filter.value {
                FilterValue::Null => match operator {
                    Operator::Eq => Ok(format!("{lhs} IS NULL")),
                    Operator::Neq => Ok(format!("{lhs} IS NOT NULL")),
                    _ => Err(invalid("null is only comparable with eq, neq or is").into()),
                },
                FilterValue::StringArray(_) => {
                    Err(invalid("lists are only accepted by in").into())
                }
                value => {
                    let (lhs, param) = comparison_operands(&path, lhs, operator, value);
                    // LIKE patterns stay text
                    let cast = column
                        .filter(|_| !matches!(operator, Operator::Like | Operator::ILike))
                        .and_then(ColumnInfo::cast_type);
                    Ok(format!("{lhs} {op_sql} {}", sink.push_cast(param, cast)))
                }
            }
        }
    }
}

/// Left-hand side and bind value for a scalar comparison.
///
/// Ordering comparisons on `->>` paths with numeric-looking values compare
/// as `numeric`; this is decided from the value's shape alone.
fn comparison_operands(
    path: &ColumnPath,
    lhs: String,
    operator: Operator,
    value: &FilterValue,
) -> (String, SqlValue) {
    if path.extracts_text() && operator.is_ordering() && value.is_numeric() {
        let param = match value {
            FilterValue::Number(n) => SqlValue::from_number(n),
            other => other
                .as_text()
                .and_then(|s| SqlValue::numeric(&s))
                .unwrap_or_else(|| SqlValue::Text(other.as_text().unwrap_or_default())),
        };
        return (format!("({lhs})::numeric"), param);
    }

    if path.extracts_json() {
        if matches!(operator, Operator::Like | Operator::ILike) {
            return (json_as_text(&lhs), SqlValue::Text(value.as_text().unwrap_or_default()));
        }
        let param = match value {
            FilterValue::String(s) => {
                SqlValue::Json(serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone())))
            }
            FilterValue::Number(n) => SqlValue::Json(Value::Number(n.clone())),
            FilterValue::Bool(b) => SqlValue::Json(Value::Bool(*b)),
            FilterValue::Null | FilterValue::StringArray(_) => SqlValue::Json(Value::Null),
        };
        return (lhs, param);
    }

    if path.is_json() {
        return (lhs, SqlValue::Text(value.as_text().unwrap_or_default()));
    }

    let param = match value {
        FilterValue::Number(n) => SqlValue::from_number(n),
        FilterValue::Bool(b) => SqlValue::Boolean(*b),
        other => SqlValue::Text(other.as_text().unwrap_or_default()),
    };
    (lhs, param)
}

/// Unwrap a scalar `jsonb` value to text.
fn json_as_text(lhs: &str) -> String {
    format!("({lhs} #>> '{{}}')")
}

/// Split an `st_dwithin` value of the form `distance,geojson`.
fn parse_geo_value(raw: &str) -> std::result::Result<(f64, String), ValidationError> {
    let (distance, geometry) = raw.split_once(',').ok_or_else(|| {
        ValidationError::InvalidGeoFilter("expected 'distance,geojson'".to_string())
    })?;

    let distance_raw = distance.trim();
    let distance: f64 = distance_raw.parse().map_err(|_| {
        ValidationError::InvalidGeoFilter(format!("invalid distance '{distance_raw}'"))
    })?;
    if !distance.is_finite() {
        return Err(ValidationError::InvalidGeoFilter(format!(
            "invalid distance '{distance_raw}'"
        )));
    }
    if distance < 0.0 {
        return Err(ValidationError::NegativeDistance(distance));
    }

    let geometry = geometry.trim();
    if geometry.is_empty() {
        return Err(ValidationError::InvalidGeoFilter(
            "missing GeoJSON geometry".to_string(),
        ));
    }
    let parsed: Value = serde_json::from_str(geometry)
        .map_err(|e| ValidationError::InvalidGeoFilter(format!("malformed GeoJSON: {e}")))?;
    if !parsed.is_object() {
        return Err(ValidationError::InvalidGeoFilter(
            "GeoJSON geometry must be an object".to_string(),
        ));
    }

    Ok((distance, geometry.to_string()))
}

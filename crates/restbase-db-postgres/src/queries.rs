//! Running compiled statements on a transaction's connection.
//!
//! These functions take the connection handed out by
//! [`RlsExecutor`](crate::RlsExecutor), so they always run after the
//! security context has been applied.

use restbase_query::{CompiledQuery, CountMode, QueryCompiler, QueryParams};
use serde::Serialize;
use serde_json::Value;
use sqlx_core::query::query_with;
use sqlx_core::query_scalar::query_scalar_with;
use sqlx_postgres::{PgArguments, PgConnection, Postgres};
use tracing::debug;

use crate::bind::to_arguments;
use crate::error::{Result, RlsError};

/// Planner estimates at or below this are replaced by an exact count for
/// [`CountMode::Estimated`].
pub const ESTIMATED_EXACT_THRESHOLD: i64 = 1000;

/// One page of rows plus the requested total, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub rows: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}

/// Run a compiled SELECT or `... RETURNING *` statement, returning each row
/// as a JSON object.
///
/// Row order is not guaranteed; use [`fetch_json_rows`] with
/// [`QueryCompiler::compile_rows`] for ordered results.
pub async fn fetch_rows(conn: &mut PgConnection, query: &CompiledQuery) -> Result<Vec<Value>> {
    let sql = format!(
        "WITH _rows AS ({}) SELECT to_jsonb(_rows) FROM _rows",
        query.sql
    );
    let args = to_arguments(&query.params)?;
    let rows = query_scalar_with::<Postgres, Value, PgArguments>(&sql, args)
        .fetch_all(&mut *conn)
        .await?;

    debug!(rows = rows.len(), "fetched rows");
    Ok(rows)
}

/// Run a statement compiled by [`QueryCompiler::compile_rows`], which
/// already yields one ordered `jsonb` value per row.
pub async fn fetch_json_rows(conn: &mut PgConnection, query: &CompiledQuery) -> Result<Vec<Value>> {
    let args = to_arguments(&query.params)?;
    let rows = query_scalar_with::<Postgres, Value, PgArguments>(&query.sql, args)
        .fetch_all(&mut *conn)
        .await?;

    debug!(rows = rows.len(), "fetched rows");
    Ok(rows)
}

/// Run a statement compiled by [`QueryCompiler::compile_count`].
pub async fn fetch_count(conn: &mut PgConnection, query: &CompiledQuery) -> Result<i64> {
    let args = to_arguments(&query.params)?;
    let total = query_scalar_with::<Postgres, i64, PgArguments>(&query.sql, args)
        .fetch_one(&mut *conn)
        .await?;
    Ok(total)
}

/// Run a statement compiled by [`QueryCompiler::compile_explain`] and read
/// the planner's row estimate.
pub async fn fetch_planned_count(conn: &mut PgConnection, query: &CompiledQuery) -> Result<i64> {
    let args = to_arguments(&query.params)?;
    let plan = query_scalar_with::<Postgres, Value, PgArguments>(&query.sql, args)
        .fetch_one(&mut *conn)
        .await?;

    plan_rows(&plan).ok_or_else(|| {
        RlsError::Database(sqlx_core::error::Error::Protocol(
            "EXPLAIN output has no \"Plan Rows\"".to_string(),
        ))
    })
}

/// `Plan Rows` of the top plan node in `EXPLAIN (FORMAT JSON)` output.
fn plan_rows(plan: &Value) -> Option<i64> {
    let rows = plan.get(0)?.get("Plan")?.get("Plan Rows")?;
    rows.as_i64().or_else(|| rows.as_f64().map(|f| f.round() as i64))
}

/// Run a statement and return the number of affected rows.
pub async fn execute(conn: &mut PgConnection, query: &CompiledQuery) -> Result<u64> {
    let args = to_arguments(&query.params)?;
    let result = query_with::<Postgres, PgArguments>(&query.sql, args)
        .execute(&mut *conn)
        .await?;

    debug!(rows_affected = result.rows_affected(), "executed statement");
    Ok(result.rows_affected())
}

/// Fetch a page and, depending on `params.count`, its total.
///
/// Rows come back in the requested order. When the compiler carries table
/// metadata, unknown columns fail before anything runs.
pub async fn fetch_page(
    conn: &mut PgConnection,
    compiler: &QueryCompiler,
    params: &QueryParams,
) -> Result<Page> {
    compiler.validate_columns(params)?;
    let rows = fetch_json_rows(conn, &compiler.compile_rows(params)?).await?;

    let total = match params.count {
        CountMode::None => None,
        CountMode::Exact => Some(fetch_count(conn, &compiler.compile_count(params)?).await?),
        CountMode::Planned => {
            Some(fetch_planned_count(conn, &compiler.compile_explain(params)?).await?)
        }
        CountMode::Estimated => {
            let planned = fetch_planned_count(conn, &compiler.compile_explain(params)?).await?;
            if planned <= ESTIMATED_EXACT_THRESHOLD {
                Some(fetch_count(conn, &compiler.compile_count(params)?).await?)
            } else {
                Some(planned)
            }
        }
    };

    Ok(Page { rows, total })
}

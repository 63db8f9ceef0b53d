use anyhow::{Context, Result};
use restbase_db_postgres::{
    PostgresConfig, RlsConfig, RlsExecutor, SecurityContext, create_pool, test_connection,
};
use restbase_query::{PaginationPolicy, parse};
use serde_json::Value;

use super::compiler_for;
use crate::cli::{OutputFormat, QueryArgs};
use crate::output::{print_rows, print_success};

pub async fn query(
    args: &QueryArgs,
    pg: &PostgresConfig,
    rls: RlsConfig,
    policy: &PaginationPolicy,
    format: OutputFormat,
) -> Result<()> {
    let params = parse(&args.query)?.paginate(policy);
    let claims: Option<Value> = args
        .claims
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .context("--claims must be a JSON object")?;

    let compiler = compiler_for(&args.table, args.schema.as_deref(), &args.columns)?;

    let pool = create_pool(pg).await?;
    let context = SecurityContext::from_claims(claims, &rls);
    let executor = RlsExecutor::new(pool, rls);

    let page = executor.fetch_page(context, compiler, params).await?;
    print_rows(&page.rows, page.total, format);
    Ok(())
}

pub async fn ping(pg: &PostgresConfig) -> Result<()> {
    let pool = create_pool(pg).await?;
    test_connection(&pool).await?;
    print_success("database reachable");
    Ok(())
}

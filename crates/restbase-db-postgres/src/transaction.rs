//! Row-level-security scoped transactions.
//!
//! Every request runs in its own transaction:
//!
//! 1. acquire a pooled connection and `BEGIN`
//! 2. apply the caller's identity with transaction-local `set_config`
//! 3. run the handler's statements
//! 4. `COMMIT`, or `ROLLBACK` on any error
//!
//! The settings are local to the transaction, so a connection returned to
//! the pool carries no identity into the next request. A dropped or timed
//! out future drops the open transaction, which rolls it back.

use std::time::Duration;

use futures_util::future::BoxFuture;
use restbase_query::{CompiledQuery, QueryCompiler, QueryParams};
use serde_json::Value;
use sqlx_core::arguments::Arguments;
use sqlx_core::error::Error as SqlxError;
use sqlx_core::query::query_with;
use sqlx_postgres::{PgArguments, PgConnection, PgPool, Postgres};
use tracing::{debug, instrument, warn};

use crate::compensation::Compensations;
use crate::config::RlsConfig;
use crate::context::{SecurityContext, set_config_statement};
use crate::error::{Result, RlsError};
use crate::queries::{self, Page};

/// Runs request work inside RLS-scoped transactions.
#[derive(Debug, Clone)]
pub struct RlsExecutor {
    pool: PgPool,
    config: RlsConfig,
}

impl RlsExecutor {
    pub fn new(pool: PgPool, config: RlsConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &RlsConfig {
        &self.config
    }

    /// Run `f` in a transaction scoped to `context`.
    ///
    /// `f` receives the transaction's connection; everything it executes
    /// sees the caller's role and claims. The transaction commits only if
    /// `f` returns `Ok`.
    pub async fn run<T, F>(&self, context: SecurityContext, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T>> + Send,
        T: Send,
    {
        self.run_compensated(context, Compensations::new(), f).await
    }

    /// Like [`run`](Self::run), running `compensations` unless the
    /// transaction commits.
    #[instrument(
        skip_all,
        fields(role = %context.role(), anonymous = context.is_anonymous())
    )]
    pub async fn run_compensated<T, F>(
        &self,
        context: SecurityContext,
        mut compensations: Compensations,
        f: F,
    ) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T>> + Send,
        T: Send,
    {
        let timeout_ms = self.config.transaction_timeout_ms;
        let result = match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.transact(context, f),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms, "transaction timed out; rolled back");
                Err(RlsError::Timeout { timeout_ms })
            }
        };

        match result {
            Ok(value) => {
                compensations.disarm();
                Ok(value)
            }
            Err(error) => {
                if !compensations.is_empty() {
                    let failed = compensations.run().await;
                    warn!(error = %error, failed, "transaction failed; compensations run");
                }
                Err(error)
            }
        }
    }

    async fn transact<T, F>(&self, context: SecurityContext, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T>> + Send,
        T: Send,
    {
        let mut tx = self.pool.begin().await.map_err(|e| {
            warn!(error = %e, "could not open transaction");
            RlsError::unavailable(e.to_string())
        })?;

        // The context is consumed here and never outlives this transaction.
        apply_context(&mut *tx, context, &self.config).await?;

        match f(&mut *tx).await {
            Ok(value) => {
                tx.commit().await?;
                debug!("transaction committed");
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "explicit rollback failed; connection will discard it");
                }
                debug!(error = %error, "transaction rolled back");
                Err(error)
            }
        }
    }

    /// Run a compiled SELECT (or `RETURNING` statement) and return its rows.
    pub async fn fetch(&self, context: SecurityContext, query: CompiledQuery) -> Result<Vec<Value>> {
        self.run(context, move |conn| {
            Box::pin(async move { queries::fetch_rows(conn, &query).await })
        })
        .await
    }

    /// Fetch a page of `params` from the compiler's table, with its total
    /// when `params.count` asks for one.
    ///
    /// With [`TableInfo`](restbase_query::TableInfo) attached to the
    /// compiler, referenced columns are checked before a connection is
    /// taken.
    pub async fn fetch_page(
        &self,
        context: SecurityContext,
        compiler: QueryCompiler,
        params: QueryParams,
    ) -> Result<Page> {
        compiler.validate_columns(&params)?;
        self.run(context, move |conn| {
            Box::pin(async move { queries::fetch_page(conn, &compiler, &params).await })
        })
        .await
    }

    /// Run a statement and return the number of affected rows.
    pub async fn execute(&self, context: SecurityContext, query: CompiledQuery) -> Result<u64> {
        self.run(context, move |conn| {
            Box::pin(async move { queries::execute(conn, &query).await })
        })
        .await
    }
}

/// Run `f` in a transaction on `pool` scoped to `context`.
///
/// Convenience for handlers that do not keep an [`RlsExecutor`].
pub async fn run_in_rls_transaction<T, F>(
    pool: &PgPool,
    config: &RlsConfig,
    context: SecurityContext,
    f: F,
) -> Result<T>
where
    F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T>> + Send,
    T: Send,
{
    RlsExecutor::new(pool.clone(), config.clone())
        .run(context, f)
        .await
}

/// Apply the caller's identity to the open transaction in one statement.
async fn apply_context(
    conn: &mut PgConnection,
    context: SecurityContext,
    config: &RlsConfig,
) -> Result<()> {
    let settings = context.settings(config);
    let sql = set_config_statement(settings.len());

    let mut args = PgArguments::default();
    for (name, value) in settings {
        args.add(name).map_err(SqlxError::Encode)?;
        args.add(value).map_err(SqlxError::Encode)?;
    }

    query_with::<Postgres, PgArguments>(&sql, args)
        .execute(&mut *conn)
        .await?;

    debug!(
        role = context.role(),
        user_id = context.user_id().unwrap_or("-"),
        "security context applied"
    );
    Ok(())
}

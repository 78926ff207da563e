//! Transactional application of migration files.

use crate::client::run_cancellable;
use crate::error::{ShiftError, ShiftResult};
use crate::ledger::INSERT_MIGRATION_VERSION;
use crate::migration::MigrationFile;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Caller-provided work to run on the open connection before the first
/// migration (the vault-secret upsert seam). Its failures are not
/// attributed to any statement.
#[async_trait]
pub trait ApplyHook: Send + Sync {
    async fn before_apply(&self, client: &tokio_postgres::Client) -> ShiftResult<()>;
}

/// Apply one migration file atomically.
///
/// Every file statement runs over the simple-query protocol (unnamed and
/// unprepared, so DDL is visible to the statements after it), the ledger
/// insert joins the same transaction, and the commit covers all of it: the
/// ledger can never record a version whose statements did not run, nor omit
/// a version whose statements did.
///
/// On failure the error names the failing statement: index `k` for the
/// file's statements, index `len(statements)` for the ledger insert.
pub async fn apply_migration(
    client: &mut tokio_postgres::Client,
    token: &CancellationToken,
    migration: &MigrationFile,
) -> ShiftResult<()> {
    tracing::info!(version = %migration.version, name = %migration.name, "applying migration");

    let tx = run_cancellable(token, async {
        client.transaction().await.map_err(ShiftError::from_db_error)
    })
    .await?;

    for (index, statement) in migration.statements.iter().enumerate() {
        tracing::debug!(index, "executing statement");
        run_cancellable(token, async {
            tx.simple_query(statement)
                .await
                .map(|_| ())
                .map_err(|source| ShiftError::Statement {
                    index,
                    statement: statement.clone(),
                    source,
                })
        })
        .await?;
    }

    run_cancellable(token, async {
        tx.execute(
            INSERT_MIGRATION_VERSION,
            &[
                &migration.version,
                &migration.name,
                &migration.statements,
            ],
        )
        .await
        .map_err(|source| ShiftError::Statement {
            index: migration.statements.len(),
            statement: INSERT_MIGRATION_VERSION.to_string(),
            source,
        })
    })
    .await?;

    run_cancellable(token, async {
        tx.commit().await.map_err(ShiftError::from_db_error)
    })
    .await
}

/// Apply migrations strictly sequentially in the given (ascending) order.
///
/// No file begins until the previous one has committed.
pub async fn apply_migrations(
    client: &mut tokio_postgres::Client,
    token: &CancellationToken,
    migrations: &[MigrationFile],
    hook: Option<&dyn ApplyHook>,
) -> ShiftResult<()> {
    if let Some(hook) = hook {
        run_cancellable(token, hook.before_apply(client)).await?;
    }
    for migration in migrations {
        apply_migration(client, token, migration).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A real driver error without a server: parsing an invalid connection
    /// config fails inside tokio-postgres.
    fn db_error() -> tokio_postgres::Error {
        "definitely not a connection string"
            .parse::<tokio_postgres::Config>()
            .expect_err("must fail")
    }

    #[test]
    fn failures_name_the_statement_and_its_index() {
        let err = ShiftError::Statement {
            index: 0,
            statement: "create schema public".to_string(),
            source: db_error(),
        };
        assert_eq!(err.to_string(), "At statement 0: create schema public");
    }

    #[test]
    fn ledger_insert_failure_is_attributed_past_the_last_statement() {
        let statements = vec!["create schema public".to_string()];
        let err = ShiftError::Statement {
            index: statements.len(),
            statement: INSERT_MIGRATION_VERSION.to_string(),
            source: db_error(),
        };
        assert!(err
            .to_string()
            .starts_with("At statement 1: INSERT INTO supabase_migrations.schema_migrations"));
    }
}

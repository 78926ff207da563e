//! Database access: executor trait, connect helper, cancellation plumbing.

use crate::error::{ShiftError, ShiftResult};
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};
use tokio_util::sync::CancellationToken;

/// A trait that unifies `Client` and `Transaction` for ledger operations.
///
/// This allows ledger mutations to run either directly on a connection or
/// inside the transaction of an applier/repair batch.
pub trait PgExecutor: Send + Sync {
    /// Execute a query and return all rows
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = ShiftResult<Vec<Row>>> + Send;

    /// Execute a statement and return the number of affected rows
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = ShiftResult<u64>> + Send;

    /// Execute a `;`-separated batch over the simple-query protocol.
    ///
    /// Statements are sent unnamed and unprepared, so each one sees the
    /// schema changes of the previous (DDL-on-DDL).
    fn batch_execute(&self, sql: &str) -> impl std::future::Future<Output = ShiftResult<()>> + Send;
}

impl PgExecutor for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ShiftResult<Vec<Row>> {
        tokio_postgres::Client::query(self, sql, params)
            .await
            .map_err(ShiftError::from_db_error)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ShiftResult<u64> {
        tokio_postgres::Client::execute(self, sql, params)
            .await
            .map_err(ShiftError::from_db_error)
    }

    async fn batch_execute(&self, sql: &str) -> ShiftResult<()> {
        tokio_postgres::Client::batch_execute(self, sql)
            .await
            .map_err(ShiftError::from_db_error)
    }
}

impl PgExecutor for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ShiftResult<Vec<Row>> {
        tokio_postgres::Transaction::query(self, sql, params)
            .await
            .map_err(ShiftError::from_db_error)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ShiftResult<u64> {
        tokio_postgres::Transaction::execute(self, sql, params)
            .await
            .map_err(ShiftError::from_db_error)
    }

    async fn batch_execute(&self, sql: &str) -> ShiftResult<()> {
        tokio_postgres::Transaction::batch_execute(self, sql)
            .await
            .map_err(ShiftError::from_db_error)
    }
}

/// Race an operation against cancellation.
///
/// Cancellation wins ties and surfaces as [`ShiftError::Cancelled`], never
/// as success; the in-flight future is dropped, which aborts the current
/// statement best-effort.
pub async fn run_cancellable<F, T>(token: &CancellationToken, fut: F) -> ShiftResult<T>
where
    F: std::future::Future<Output = ShiftResult<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ShiftError::Cancelled),
        res = fut => res,
    }
}

/// Open a connection and spawn its driver task.
///
/// Connect failures are transient (the caller may retry); the driver task
/// logs and exits when the connection closes.
pub async fn connect(url: &str, token: &CancellationToken) -> ShiftResult<tokio_postgres::Client> {
    let (client, connection) = run_cancellable(token, async {
        tokio_postgres::connect(url, NoTls)
            .await
            .map_err(|e| ShiftError::Transient(e.to_string()))
    })
    .await?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!("connection closed: {e}");
        }
    });

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancellation_beats_pending_work() {
        let token = CancellationToken::new();
        token.cancel();
        let err = run_cancellable(&token, async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok(())
        })
        .await
        .expect_err("must cancel");
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn uncancelled_work_completes() {
        let token = CancellationToken::new();
        let value = run_cancellable(&token, async { Ok(42) }).await.expect("ok");
        assert_eq!(value, 42);
    }
}

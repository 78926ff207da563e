//! The migration history ledger.
//!
//! Applied versions are recorded in `supabase_migrations.schema_migrations`.
//! The schema and table names are deliberately not configurable; every
//! statement here is a fixed string.

use crate::client::{run_cancellable, PgExecutor};
use crate::error::ShiftResult;
use tokio_util::sync::CancellationToken;

/// Idempotent history DDL, sent as one simple-query batch so each DDL sees
/// the previous one. The lock timeout bounds waits on DDL contention.
const CREATE_HISTORY_TABLE: &str = "\
SET lock_timeout = '4s';
CREATE SCHEMA IF NOT EXISTS supabase_migrations;
CREATE TABLE IF NOT EXISTS supabase_migrations.schema_migrations (version text NOT NULL PRIMARY KEY);
ALTER TABLE supabase_migrations.schema_migrations ADD COLUMN IF NOT EXISTS statements text[];
ALTER TABLE supabase_migrations.schema_migrations ADD COLUMN IF NOT EXISTS name text";

pub const INSERT_MIGRATION_VERSION: &str = "INSERT INTO supabase_migrations.schema_migrations (version, name, statements) VALUES ($1, $2, $3)";

const LIST_VERSIONS: &str =
    "SELECT version FROM supabase_migrations.schema_migrations ORDER BY version";

const SELECT_HISTORY: &str =
    "SELECT version, name, statements FROM supabase_migrations.schema_migrations ORDER BY version";

const DELETE_VERSIONS: &str =
    "DELETE FROM supabase_migrations.schema_migrations WHERE version = ANY($1)";

const DELETE_UP_TO: &str =
    "DELETE FROM supabase_migrations.schema_migrations WHERE version <= $1";

const TRUNCATE_HISTORY: &str = "TRUNCATE supabase_migrations.schema_migrations";

/// One row of the history ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMigration {
    pub version: String,
    pub name: Option<String>,
    pub statements: Option<Vec<String>>,
}

/// Ensure the history schema, table, and columns exist.
///
/// Run once per connection before any ledger mutation.
pub async fn create_history_table(
    exec: &impl PgExecutor,
    token: &CancellationToken,
) -> ShiftResult<()> {
    tracing::debug!("ensuring migration history table");
    run_cancellable(token, exec.batch_execute(CREATE_HISTORY_TABLE)).await
}

/// Applied versions, ascending.
pub async fn list_versions(
    exec: &impl PgExecutor,
    token: &CancellationToken,
) -> ShiftResult<Vec<String>> {
    let rows = run_cancellable(token, exec.query(LIST_VERSIONS, &[])).await?;
    Ok(rows.into_iter().map(|row| row.get("version")).collect())
}

/// Full ledger rows, ascending by version.
pub async fn read_history(
    exec: &impl PgExecutor,
    token: &CancellationToken,
) -> ShiftResult<Vec<SchemaMigration>> {
    let rows = run_cancellable(token, exec.query(SELECT_HISTORY, &[])).await?;
    Ok(rows
        .into_iter()
        .map(|row| SchemaMigration {
            version: row.get("version"),
            name: row.get("name"),
            statements: row.get("statements"),
        })
        .collect())
}

/// Record a version as applied.
pub async fn insert_version(
    exec: &impl PgExecutor,
    token: &CancellationToken,
    version: &str,
    name: Option<&str>,
    statements: Option<&[String]>,
) -> ShiftResult<u64> {
    run_cancellable(
        token,
        exec.execute(INSERT_MIGRATION_VERSION, &[&version, &name, &statements]),
    )
    .await
}

/// Remove the given versions from the ledger.
pub async fn delete_versions(
    exec: &impl PgExecutor,
    token: &CancellationToken,
    versions: &[String],
) -> ShiftResult<u64> {
    run_cancellable(token, exec.execute(DELETE_VERSIONS, &[&versions])).await
}

/// Remove every version up to and including `version` (squash baseline).
pub async fn delete_up_to(
    exec: &impl PgExecutor,
    token: &CancellationToken,
    version: &str,
) -> ShiftResult<u64> {
    run_cancellable(token, exec.execute(DELETE_UP_TO, &[&version])).await
}

/// Empty the ledger.
pub async fn truncate_history(
    exec: &impl PgExecutor,
    token: &CancellationToken,
) -> ShiftResult<()> {
    run_cancellable(token, exec.batch_execute(TRUNCATE_HISTORY)).await
}

//! Drift detection against a shadow database.
//!
//! The shadow is a throwaway PostgreSQL instance rebuilt from the on-disk
//! migration sequence; any schema present in the live local database but
//! not in the shadow is drift. Container orchestration, the diff tool, and
//! the prompt UI are external collaborators behind traits.

use crate::client::connect;
use crate::error::{ShiftError, ShiftResult};
use crate::migration::{self, MigrationFile};
use crate::{apply, ledger, splitter};
use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

static DROP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*drop\b").unwrap());

/// A running shadow database.
#[derive(Debug, Clone)]
pub struct ShadowHandle {
    /// Orchestrator-specific identifier (e.g. a container id).
    pub id: String,
    /// Connection string with superuser access.
    pub conn_string: String,
}

/// Creates and tears down shadow databases.
#[async_trait]
pub trait ShadowOrchestrator: Send + Sync {
    async fn create(&self, token: &CancellationToken) -> ShiftResult<ShadowHandle>;

    /// Connect-and-ping with bounded retries; `Transient` on timeout.
    async fn wait_healthy(&self, token: &CancellationToken, shadow: &ShadowHandle)
        -> ShiftResult<()>;

    /// Best-effort release. Must be called when the command ends, even on
    /// error.
    async fn remove(&self, shadow: &ShadowHandle);
}

/// The external schema-diff tool. Output is a newline-separated SQL script
/// that would turn `source` into `target`; the engine treats it as opaque
/// text plus the statement splitter.
#[async_trait]
pub trait SchemaDiffer: Send + Sync {
    async fn diff(
        &self,
        token: &CancellationToken,
        source: &str,
        target: &str,
        schemas: &[String],
    ) -> ShiftResult<String>;
}

/// The external schema-dump tool (used by squash).
#[async_trait]
pub trait SchemaDumper: Send + Sync {
    async fn dump(&self, token: &CancellationToken, conn_string: &str) -> ShiftResult<String>;
}

/// User interaction. Cancellation surfaces as [`ShiftError::Cancelled`].
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn prompt_text(&self, title: &str) -> ShiftResult<String>;
    async fn prompt_yes_no(&self, title: &str, default: bool) -> ShiftResult<bool>;
    /// Single choice out of `items`; returns the selected index.
    async fn prompt_choice(&self, title: &str, items: &[&str]) -> ShiftResult<usize>;
}

/// Outcome of comparing shadow and local schemas.
#[derive(Debug, Clone, Default)]
pub struct DriftResult {
    pub has_drift: bool,
    pub diff_sql: String,
    /// Diff statements whose first keyword is `DROP`, case-insensitive.
    pub drops: Vec<String>,
}

/// What the user chose to do about detected drift.
#[derive(Debug)]
pub enum DriftOutcome {
    /// Shadow and local schemas match.
    Clean,
    /// Drift exists; the user chose to continue without a new migration.
    Ignored(DriftResult),
    /// Drift was written to a new migration file.
    Materialized { result: DriftResult, path: PathBuf },
}

/// Classify a diff script: empty means no drift; otherwise split it and
/// collect the destructive statements.
pub fn classify_diff(diff_sql: &str) -> ShiftResult<DriftResult> {
    let has_drift = !diff_sql.trim().is_empty();
    let mut drops = Vec::new();
    if has_drift {
        for statement in splitter::split_and_trim(diff_sql)? {
            if DROP_RE.is_match(&statement) {
                drops.push(statement);
            }
        }
    }
    Ok(DriftResult {
        has_drift,
        diff_sql: diff_sql.to_string(),
        drops,
    })
}

/// Migration names keep `[A-Za-z0-9_]` after spaces become underscores.
pub fn sanitize_name(name: &str) -> String {
    name.replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Write a diff script verbatim as a new timestamped migration file.
pub fn write_diff_migration(dir: &Path, name: &str, diff_sql: &str) -> ShiftResult<PathBuf> {
    let version = Utc::now().format("%Y%m%d%H%M%S");
    let path = dir.join(format!("{version}_{}.sql", sanitize_name(name)));
    fs::create_dir_all(dir).map_err(|e| ShiftError::fs(dir, e))?;
    fs::write(&path, diff_sql).map_err(|e| ShiftError::fs(&path, e))?;
    Ok(path)
}

/// The drift pipeline: shadow build, schema diff, user decision.
pub struct DriftDetector<'a> {
    pub orchestrator: &'a dyn ShadowOrchestrator,
    pub differ: &'a dyn SchemaDiffer,
    pub prompter: &'a dyn Prompter,
    pub migrations_dir: &'a Path,
    /// Schema filter forwarded to the diff tool; empty means all.
    pub schemas: &'a [String],
}

const CHOICE_CREATE: &str = "Create a new migration from the schema changes";
const CHOICE_CONTINUE: &str = "Continue without creating a migration";
const CHOICE_CANCEL: &str = "Cancel";

impl DriftDetector<'_> {
    /// Rebuild a shadow from the local migration list and diff it against
    /// the live local database at `local_conn`. The shadow is released
    /// before returning, success or error.
    pub async fn detect(
        &self,
        token: &CancellationToken,
        local_conn: &str,
    ) -> ShiftResult<DriftResult> {
        let shadow = self.orchestrator.create(token).await?;
        let result = self.detect_with_shadow(token, &shadow, local_conn).await;
        self.orchestrator.remove(&shadow).await;
        result
    }

    async fn detect_with_shadow(
        &self,
        token: &CancellationToken,
        shadow: &ShadowHandle,
        local_conn: &str,
    ) -> ShiftResult<DriftResult> {
        self.orchestrator.wait_healthy(token, shadow).await?;

        let local = migration::list_migrations(self.migrations_dir)?;
        let mut client = connect(&shadow.conn_string, token).await?;
        ledger::create_history_table(&client, token).await?;
        apply::apply_migrations(&mut client, token, &local, None).await?;
        drop(client);

        tracing::debug!(migrations = local.len(), "shadow rebuilt, diffing schemas");
        let diff_sql = self
            .differ
            .diff(token, &shadow.conn_string, local_conn, self.schemas)
            .await?;
        classify_diff(&diff_sql)
    }

    /// Run the full pipeline and let the user decide what to do with the
    /// drift, if any.
    pub async fn run(
        &self,
        token: &CancellationToken,
        local_conn: &str,
    ) -> ShiftResult<DriftOutcome> {
        let result = self.detect(token, local_conn).await?;
        if !result.has_drift {
            return Ok(DriftOutcome::Clean);
        }

        for statement in &result.drops {
            tracing::warn!(%statement, "local database contains a destructive change");
        }

        let choice = self
            .prompter
            .prompt_choice(
                "Local database schema has diverged from the migration files",
                &[CHOICE_CREATE, CHOICE_CONTINUE, CHOICE_CANCEL],
            )
            .await?;
        match choice {
            0 => {
                let name = self.prompter.prompt_text("Name of the new migration").await?;
                let path = write_diff_migration(self.migrations_dir, &name, &result.diff_sql)?;
                tracing::info!(path = %path.display(), "drift captured as migration");
                Ok(DriftOutcome::Materialized { result, path })
            }
            1 => Ok(DriftOutcome::Ignored(result)),
            _ => Err(ShiftError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn empty_diff_has_no_drift() {
        let result = classify_diff("  \n\t").expect("classify");
        assert!(!result.has_drift);
        assert!(result.drops.is_empty());
    }

    #[test]
    fn drops_are_extracted_case_insensitively() {
        let diff = "ALTER TABLE t ADD COLUMN x int;\n  drop table old_stuff;\nDROP INDEX i;\nCREATE INDEX j ON t (x);";
        let result = classify_diff(diff).expect("classify");
        assert!(result.has_drift);
        assert_eq!(
            result.drops,
            vec!["drop table old_stuff", "DROP INDEX i"]
        );
    }

    #[test]
    fn drop_inside_another_statement_is_not_a_drop() {
        let diff = "COMMENT ON TABLE t IS 'do not drop';";
        let result = classify_diff(diff).expect("classify");
        assert!(result.drops.is_empty());
    }

    #[test]
    fn names_are_sanitized() {
        assert_eq!(sanitize_name("add users table"), "add_users_table");
        assert_eq!(sanitize_name("weird: chars?!"), "weird_chars");
        assert_eq!(sanitize_name("Ünïcode"), "ncode");
    }

    #[test]
    fn diff_is_written_verbatim() {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("pgshift-drift-test-{nonce}"));

        let diff = "ALTER TABLE t ADD COLUMN x int;\n";
        let path = write_diff_migration(&dir, "capture drift", diff).expect("write");
        let file_name = path.file_name().and_then(|s| s.to_str()).expect("name");
        assert!(file_name.ends_with("_capture_drift.sql"));
        assert_eq!(fs::read_to_string(&path).expect("read"), diff);

        fs::remove_dir_all(dir).expect("cleanup");
    }
}

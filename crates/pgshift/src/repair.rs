//! Administrative operations on the migration history: repair and squash.

use crate::client::{connect, run_cancellable};
use crate::drift::{Prompter, SchemaDumper, ShadowOrchestrator};
use crate::error::{ShiftError, ShiftResult};
use crate::migration::{self, MigrationFile};
use crate::{ledger, splitter};
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Target state for a repaired version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStatus {
    Applied,
    Reverted,
}

/// Mark versions as applied or reverted in the ledger, in one transaction.
///
/// An empty version list means whole-history repair, which requires
/// confirmation: `Applied` reloads the list from the migrations directory
/// and reinserts it after a truncate; `Reverted` truncates the ledger.
pub async fn repair_history(
    client: &mut tokio_postgres::Client,
    token: &CancellationToken,
    prompter: &dyn Prompter,
    migrations_dir: &Path,
    versions: Vec<String>,
    status: RepairStatus,
) -> ShiftResult<()> {
    for version in &versions {
        migration::validate_version(version)?;
    }

    let whole_history = versions.is_empty();
    if whole_history {
        let confirmed = prompter
            .prompt_yes_no("Repair the entire migration history?", false)
            .await?;
        if !confirmed {
            return Err(ShiftError::Cancelled);
        }
    }

    let tx = run_cancellable(token, async {
        client.transaction().await.map_err(ShiftError::from_db_error)
    })
    .await?;

    match status {
        RepairStatus::Applied => {
            if whole_history {
                ledger::truncate_history(&tx, token).await?;
                for m in migration::list_migrations(migrations_dir)? {
                    ledger::insert_version(&tx, token, &m.version, Some(&m.name), Some(&m.statements))
                        .await?;
                    tracing::info!(version = %m.version, "marked as applied");
                }
            } else {
                for version in &versions {
                    match MigrationFile::from_version(migrations_dir, version) {
                        Ok(m) => {
                            ledger::insert_version(
                                &tx,
                                token,
                                &m.version,
                                Some(&m.name),
                                Some(&m.statements),
                            )
                            .await?;
                        }
                        // a version can be marked applied without a local file
                        Err(e) if e.is_not_found() => {
                            ledger::insert_version(&tx, token, version, None, None).await?;
                        }
                        Err(e) => return Err(e),
                    }
                    tracing::info!(%version, "marked as applied");
                }
            }
        }
        RepairStatus::Reverted => {
            if whole_history {
                ledger::truncate_history(&tx, token).await?;
                tracing::info!("migration history truncated");
            } else {
                ledger::delete_versions(&tx, token, &versions).await?;
                for version in &versions {
                    tracing::info!(%version, "marked as reverted");
                }
            }
        }
    }

    run_cancellable(token, async {
        tx.commit().await.map_err(ShiftError::from_db_error)
    })
    .await
}

/// Baseline the history at `target_version`.
///
/// Rebuilds a shadow from every migration up to and including the target,
/// dumps its schema into the target file, and deletes the earlier files.
/// Returns the rewritten file path.
pub async fn squash(
    token: &CancellationToken,
    orchestrator: &dyn ShadowOrchestrator,
    dumper: &dyn SchemaDumper,
    migrations_dir: &Path,
    target_version: &str,
) -> ShiftResult<PathBuf> {
    migration::validate_version(target_version)?;

    let local = migration::list_migrations(migrations_dir)?;
    let baseline: Vec<MigrationFile> = local
        .into_iter()
        .filter(|m| m.version.as_str() <= target_version)
        .collect();
    let Some(target) = baseline.iter().find(|m| m.version == target_version).cloned() else {
        return Err(ShiftError::not_found(format!(
            "migration {target_version} not found in {}",
            migrations_dir.display()
        )));
    };

    let shadow = orchestrator.create(token).await?;
    let dump = async {
        orchestrator.wait_healthy(token, &shadow).await?;
        let mut client = connect(&shadow.conn_string, token).await?;
        ledger::create_history_table(&client, token).await?;
        crate::apply::apply_migrations(&mut client, token, &baseline, None).await?;
        drop(client);
        dumper.dump(token, &shadow.conn_string).await
    }
    .await;
    orchestrator.remove(&shadow).await;
    let dump = dump?;

    fs::write(&target.path, &dump).map_err(|e| ShiftError::fs(&target.path, e))?;
    for m in &baseline {
        if m.version != target.version {
            fs::remove_file(&m.path).map_err(|e| ShiftError::fs(&m.path, e))?;
        }
    }
    tracing::info!(version = target_version, "history squashed");

    Ok(target.path)
}

/// Rewrite the remote ledger after a squash: drop everything up to the
/// target, then record the target with the squashed statements.
pub async fn baseline_remote(
    client: &mut tokio_postgres::Client,
    token: &CancellationToken,
    target: &MigrationFile,
) -> ShiftResult<()> {
    let statements = splitter::split_and_trim(
        &fs::read_to_string(&target.path).map_err(|e| ShiftError::fs(&target.path, e))?,
    )?;

    let tx = run_cancellable(token, async {
        client.transaction().await.map_err(ShiftError::from_db_error)
    })
    .await?;
    ledger::delete_up_to(&tx, token, &target.version).await?;
    ledger::insert_version(
        &tx,
        token,
        &target.version,
        Some(&target.name),
        Some(&statements),
    )
    .await?;
    run_cancellable(token, async {
        tx.commit().await.map_err(ShiftError::from_db_error)
    })
    .await
}

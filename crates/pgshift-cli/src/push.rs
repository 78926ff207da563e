use crate::cli::PushArgs;
use crate::config::ProjectConfig;
use crate::diff_tool::CommandDiffer;
use crate::prompt::StdinPrompter;
use crate::shadow::DockerShadow;
use pgshift::{
    apply, ledger, migration, reconcile, CancellationToken, DriftDetector, DriftOutcome,
    ShiftError,
};

pub async fn run(args: PushArgs, token: &CancellationToken) -> anyhow::Result<()> {
    let config = ProjectConfig::load(args.config)?;
    let url = config.resolve_database_url(args.database)?;
    let dir = config.migrations_dir();

    if !args.no_verify {
        match config.local_database_url() {
            Some(local_url) => check_drift(&config, token, &dir, &local_url).await?,
            None => tracing::debug!("no local database configured, skipping drift check"),
        }
    }

    // reload: the drift check may have materialized a new migration file
    let local = migration::list_migrations(&dir)?;
    let mut client = pgshift::connect(&url, token).await?;
    ledger::create_history_table(&client, token).await?;
    let remote = ledger::list_versions(&client, token).await?;

    // more remote history than local files means the ledger and the
    // migrations directory have diverged beyond out-of-order repair
    if remote.len() > local.len() {
        return Err(ShiftError::Conflict(format!(
            "remote history has {} versions but only {} local migration files",
            remote.len(),
            local.len()
        ))
        .into());
    }

    let pending = reconcile::find_pending(&local, &remote, args.include_all)?;
    if pending.is_empty() {
        println!("Remote database is up to date.");
        return Ok(());
    }

    if args.dry_run {
        println!("Would apply {} migration(s):", pending.len());
        for m in &pending {
            println!("  {}_{}", m.version, m.name);
        }
        return Ok(());
    }

    apply::apply_migrations(&mut client, token, &pending, None).await?;
    println!("Applied {} migration(s).", pending.len());
    Ok(())
}

/// Drift-check failures do not block a push; only an explicit user cancel
/// does.
async fn check_drift(
    config: &ProjectConfig,
    token: &CancellationToken,
    dir: &std::path::Path,
    local_url: &str,
) -> anyhow::Result<()> {
    let shadow = &config.file.shadow;
    let orchestrator = DockerShadow::new(shadow.image.clone(), shadow.port, shadow.password.clone());
    let differ = CommandDiffer {
        template: config.file.diff.command.clone(),
    };
    let prompter = StdinPrompter;
    let detector = DriftDetector {
        orchestrator: &orchestrator,
        differ: &differ,
        prompter: &prompter,
        migrations_dir: dir,
        schemas: &config.file.database.schemas,
    };

    match detector.run(token, local_url).await {
        Ok(DriftOutcome::Clean) => {}
        Ok(DriftOutcome::Ignored(_)) => {
            tracing::warn!("continuing with uncommitted local schema changes");
        }
        Ok(DriftOutcome::Materialized { path, .. }) => {
            println!("created {}", path.display());
        }
        Err(e) if e.is_cancelled() => return Err(e.into()),
        Err(e) => tracing::warn!("drift check failed: {e}"),
    }
    Ok(())
}

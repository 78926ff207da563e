use crate::cli::UpArgs;
use crate::config::ProjectConfig;
use pgshift::{apply, ledger, migration, reconcile, CancellationToken};

pub async fn run(args: UpArgs, token: &CancellationToken) -> anyhow::Result<()> {
    let config = ProjectConfig::load(args.config)?;
    let url = config.resolve_database_url(args.database)?;

    let local = migration::list_migrations(&config.migrations_dir())?;
    let mut client = pgshift::connect(&url, token).await?;
    ledger::create_history_table(&client, token).await?;
    let remote = ledger::list_versions(&client, token).await?;

    let pending = reconcile::find_pending(&local, &remote, args.include_all)?;
    if pending.is_empty() {
        println!("No pending migrations.");
        return Ok(());
    }

    apply::apply_migrations(&mut client, token, &pending, None).await?;
    println!("Applied {} migration(s).", pending.len());
    Ok(())
}

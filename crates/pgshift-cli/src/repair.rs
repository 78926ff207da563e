use crate::cli::RepairArgs;
use crate::config::ProjectConfig;
use crate::prompt::StdinPrompter;
use pgshift::{ledger, repair, CancellationToken};

pub async fn run(args: RepairArgs, token: &CancellationToken) -> anyhow::Result<()> {
    let config = ProjectConfig::load(args.config)?;
    let url = config.resolve_database_url(args.database)?;

    let mut client = pgshift::connect(&url, token).await?;
    ledger::create_history_table(&client, token).await?;
    repair::repair_history(
        &mut client,
        token,
        &StdinPrompter,
        &config.migrations_dir(),
        args.versions,
        args.status,
    )
    .await?;

    println!("Migration history repaired.");
    Ok(())
}

use crate::cli::ListArgs;
use crate::config::ProjectConfig;
use pgshift::{ledger, migration, CancellationToken};

pub async fn run(args: ListArgs, token: &CancellationToken) -> anyhow::Result<()> {
    let config = ProjectConfig::load(args.config)?;
    let url = config.resolve_database_url(args.database)?;

    let local = migration::list_migrations(&config.migrations_dir())?;
    let client = pgshift::connect(&url, token).await?;
    ledger::create_history_table(&client, token).await?;
    let remote = ledger::list_versions(&client, token).await?;

    println!("{:<16} | {:<16} | NAME", "LOCAL", "REMOTE");
    println!("{:-<16}-|-{:-<16}-|------", "", "");

    // both lists are sorted ascending; walk them together
    let mut i = 0;
    let mut j = 0;
    while i < local.len() || j < remote.len() {
        let l = local.get(i);
        let r = remote.get(j);
        match (l, r) {
            (Some(l), Some(r)) if l.version == *r => {
                println!("{:<16} | {:<16} | {}", l.version, r, l.name);
                i += 1;
                j += 1;
            }
            (Some(l), Some(r)) if l.version.as_str() < r.as_str() => {
                println!("{:<16} | {:<16} | {}", l.version, "", l.name);
                i += 1;
            }
            (Some(l), None) => {
                println!("{:<16} | {:<16} | {}", l.version, "", l.name);
                i += 1;
            }
            (_, Some(r)) => {
                println!("{:<16} | {:<16} |", "", r);
                j += 1;
            }
            (None, None) => break,
        }
    }
    Ok(())
}

use crate::cli::SquashArgs;
use crate::config::ProjectConfig;
use crate::diff_tool::CommandDumper;
use crate::shadow::DockerShadow;
use pgshift::{ledger, repair, CancellationToken, MigrationFile};

pub async fn run(args: SquashArgs, token: &CancellationToken) -> anyhow::Result<()> {
    let config = ProjectConfig::load(args.config)?;
    let dir = config.migrations_dir();

    let shadow = &config.file.shadow;
    let orchestrator = DockerShadow::new(shadow.image.clone(), shadow.port, shadow.password.clone());
    let dumper = CommandDumper {
        template: config.file.diff.dump_command.clone(),
    };

    let path = repair::squash(token, &orchestrator, &dumper, &dir, &args.version).await?;
    println!("Squashed migrations into {}", path.display());

    if args.remote || args.database.is_some() {
        let url = config.resolve_database_url(args.database)?;
        let target = MigrationFile::from_path(&path)?;
        let mut client = pgshift::connect(&url, token).await?;
        ledger::create_history_table(&client, token).await?;
        repair::baseline_remote(&mut client, token, &target).await?;
        println!("Remote history baselined at {}.", args.version);
    }
    Ok(())
}

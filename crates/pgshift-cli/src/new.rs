use crate::cli::NewArgs;
use crate::config::ProjectConfig;
use anyhow::Context;
use chrono::Utc;
use pgshift::drift::sanitize_name;

pub async fn run(args: NewArgs) -> anyhow::Result<()> {
    let config = ProjectConfig::load(args.config)?;
    let dir = config.migrations_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let name = sanitize_name(&args.name);
    if name.is_empty() {
        anyhow::bail!("migration name becomes empty after sanitization");
    }

    let version = Utc::now().format("%Y%m%d%H%M%S");
    let path = dir.join(format!("{version}_{name}.sql"));
    if path.exists() {
        anyhow::bail!("refusing to overwrite existing file: {}", path.display());
    }

    std::fs::write(&path, "-- Write your migration here.\n")
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("created {}", path.display());
    Ok(())
}

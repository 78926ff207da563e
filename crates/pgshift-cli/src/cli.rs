use pgshift::RepairStatus;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    Migration,
    MigrationNew,
    MigrationList,
    MigrationUp,
    MigrationRepair,
    MigrationSquash,
    Push,
}

#[derive(Debug, Clone)]
pub enum Command {
    Help(HelpTopic),
    Migration(MigrationCommand),
    Push(PushArgs),
}

#[derive(Debug, Clone)]
pub enum MigrationCommand {
    New(NewArgs),
    List(ListArgs),
    Up(UpArgs),
    Repair(RepairArgs),
    Squash(SquashArgs),
}

#[derive(Debug, Clone)]
pub struct NewArgs {
    pub config: PathBuf,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ListArgs {
    pub config: PathBuf,
    pub database: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpArgs {
    pub config: PathBuf,
    pub database: Option<String>,
    pub include_all: bool,
}

#[derive(Debug, Clone)]
pub struct RepairArgs {
    pub config: PathBuf,
    pub database: Option<String>,
    pub status: RepairStatus,
    pub versions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SquashArgs {
    pub config: PathBuf,
    pub database: Option<String>,
    pub version: String,
    pub remote: bool,
}

#[derive(Debug, Clone)]
pub struct PushArgs {
    pub config: PathBuf,
    pub database: Option<String>,
    pub include_all: bool,
    pub dry_run: bool,
    pub no_verify: bool,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1);
    let Some(first) = it.next() else {
        return Ok(Command::Help(HelpTopic::Root));
    };

    match first.as_str() {
        "-h" | "--help" => Ok(Command::Help(HelpTopic::Root)),
        "migration" => parse_migration(it.map(|s| s.as_str())),
        "push" => parse_push(it.map(|s| s.as_str())),
        _ => anyhow::bail!("unknown command: {first}"),
    }
}

fn parse_migration<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut subcmd: Option<&str> = None;

    let mut config = PathBuf::from("pgshift.toml");
    let mut database: Option<String> = None;
    let mut include_all = false;
    let mut remote = false;
    let mut status: Option<RepairStatus> = None;
    let mut version: Option<String> = None;
    let mut positional: Vec<String> = Vec::new();

    while let Some(token) = it.next() {
        match token {
            "-h" | "--help" => {
                return Ok(Command::Help(match subcmd {
                    None => HelpTopic::Migration,
                    Some("new") => HelpTopic::MigrationNew,
                    Some("list") => HelpTopic::MigrationList,
                    Some("up") => HelpTopic::MigrationUp,
                    Some("repair") => HelpTopic::MigrationRepair,
                    Some("squash") => HelpTopic::MigrationSquash,
                    Some(other) => anyhow::bail!("unknown subcommand: {other}"),
                }));
            }
            "new" | "list" | "up" | "repair" | "squash" if subcmd.is_none() => {
                subcmd = Some(token);
            }
            "--config" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--config requires a value");
                };
                config = PathBuf::from(v);
            }
            _ if token.starts_with("--config=") => {
                config = PathBuf::from(token.trim_start_matches("--config="));
            }
            "--database" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--database requires a value");
                };
                database = Some(v.to_string());
            }
            _ if token.starts_with("--database=") => {
                database = Some(token.trim_start_matches("--database=").to_string());
            }
            "--status" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--status requires a value");
                };
                status = Some(parse_status(v)?);
            }
            _ if token.starts_with("--status=") => {
                status = Some(parse_status(token.trim_start_matches("--status="))?);
            }
            "--version" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--version requires a value");
                };
                version = Some(v.to_string());
            }
            _ if token.starts_with("--version=") => {
                version = Some(token.trim_start_matches("--version=").to_string());
            }
            "--include-all" => include_all = true,
            "--remote" => remote = true,
            other if !other.starts_with('-') => positional.push(other.to_string()),
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    let cmd = match subcmd {
        Some("new") => {
            let Some(name) = positional.first() else {
                anyhow::bail!("migration new requires a name");
            };
            MigrationCommand::New(NewArgs {
                config,
                name: name.clone(),
            })
        }
        Some("list") => MigrationCommand::List(ListArgs { config, database }),
        Some("up") => MigrationCommand::Up(UpArgs {
            config,
            database,
            include_all,
        }),
        Some("repair") => {
            let Some(status) = status else {
                anyhow::bail!("migration repair requires --status applied|reverted");
            };
            MigrationCommand::Repair(RepairArgs {
                config,
                database,
                status,
                versions: positional,
            })
        }
        Some("squash") => {
            let Some(version) = version else {
                anyhow::bail!("migration squash requires --version");
            };
            MigrationCommand::Squash(SquashArgs {
                config,
                database,
                version,
                remote,
            })
        }
        None => return Ok(Command::Help(HelpTopic::Migration)),
        Some(other) => anyhow::bail!("unknown subcommand: {other}"),
    };

    Ok(Command::Migration(cmd))
}

fn parse_status(v: &str) -> anyhow::Result<RepairStatus> {
    match v {
        "applied" => Ok(RepairStatus::Applied),
        "reverted" => Ok(RepairStatus::Reverted),
        other => anyhow::bail!("unknown repair status: {other} (expected applied or reverted)"),
    }
}

fn parse_push<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut config = PathBuf::from("pgshift.toml");
    let mut database: Option<String> = None;
    let mut include_all = false;
    let mut dry_run = false;
    let mut no_verify = false;

    while let Some(token) = it.next() {
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Push)),
            "--config" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--config requires a value");
                };
                config = PathBuf::from(v);
            }
            _ if token.starts_with("--config=") => {
                config = PathBuf::from(token.trim_start_matches("--config="));
            }
            "--database" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--database requires a value");
                };
                database = Some(v.to_string());
            }
            _ if token.starts_with("--database=") => {
                database = Some(token.trim_start_matches("--database=").to_string());
            }
            "--include-all" => include_all = true,
            "--dry-run" => dry_run = true,
            "--no-verify" => no_verify = true,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    Ok(Command::Push(PushArgs {
        config,
        database,
        include_all,
        dry_run,
        no_verify,
    }))
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => println!(
            "pgshift - PostgreSQL schema migrations

USAGE:
  pgshift migration <new|list|up|repair|squash> [options]
  pgshift push [options]

Run a subcommand with --help for details."
        ),
        HelpTopic::Migration => println!(
            "pgshift migration - manage migration files and history

SUBCOMMANDS:
  new <name>     Create a new timestamped migration file
  list           Show local and remote migration status
  up             Apply pending migrations
  repair         Mark versions as applied or reverted on the remote
  squash         Baseline the history at a target version"
        ),
        HelpTopic::MigrationNew => println!(
            "pgshift migration new <name>

Creates supabase/migrations/<timestamp>_<name>.sql.

OPTIONS:
  --config <path>    Project config (default pgshift.toml)"
        ),
        HelpTopic::MigrationList => println!(
            "pgshift migration list

Shows local migration files against the remote history ledger.

OPTIONS:
  --config <path>      Project config (default pgshift.toml)
  --database <url>     Override the database connection string"
        ),
        HelpTopic::MigrationUp => println!(
            "pgshift migration up

Applies pending migrations in ascending version order.

OPTIONS:
  --config <path>      Project config (default pgshift.toml)
  --database <url>     Override the database connection string
  --include-all        Also apply out-of-order local migrations"
        ),
        HelpTopic::MigrationRepair => println!(
            "pgshift migration repair --status applied|reverted [versions...]

Rewrites the remote history ledger. With no versions, repairs the entire
history after confirmation.

OPTIONS:
  --config <path>      Project config (default pgshift.toml)
  --database <url>     Override the database connection string
  --status <status>    applied or reverted (required)"
        ),
        HelpTopic::MigrationSquash => println!(
            "pgshift migration squash --version <version>

Rebuilds a shadow database up to <version>, replaces that migration file
with the schema dump, and removes the earlier files.

OPTIONS:
  --config <path>      Project config (default pgshift.toml)
  --database <url>     Override the database connection string
  --version <v>        Baseline version (required)
  --remote             Also rewrite the remote history ledger"
        ),
        HelpTopic::Push => println!(
            "pgshift push

Applies pending migrations to the target database, checking the local
database for schema drift first.

OPTIONS:
  --config <path>      Project config (default pgshift.toml)
  --database <url>     Override the database connection string
  --include-all        Also apply out-of-order local migrations
  --dry-run            Print pending migrations without applying
  --no-verify          Skip the drift check"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        std::iter::once("pgshift")
            .chain(parts.iter().copied())
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn parses_migration_up() {
        let cmd = parse_args(&args(&["migration", "up", "--include-all"])).expect("parse");
        match cmd {
            Command::Migration(MigrationCommand::Up(a)) => assert!(a.include_all),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_repair_with_versions() {
        let cmd = parse_args(&args(&[
            "migration", "repair", "--status", "reverted", "20260801", "20260802",
        ]))
        .expect("parse");
        match cmd {
            Command::Migration(MigrationCommand::Repair(a)) => {
                assert_eq!(a.status, RepairStatus::Reverted);
                assert_eq!(a.versions, vec!["20260801", "20260802"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn repair_requires_status() {
        assert!(parse_args(&args(&["migration", "repair"])).is_err());
    }

    #[test]
    fn repair_rejects_unknown_status() {
        assert!(parse_args(&args(&["migration", "repair", "--status", "done"])).is_err());
    }

    #[test]
    fn parses_push_flags() {
        let cmd = parse_args(&args(&["push", "--dry-run", "--no-verify", "--database=postgres://x"]))
            .expect("parse");
        match cmd {
            Command::Push(a) => {
                assert!(a.dry_run);
                assert!(a.no_verify);
                assert_eq!(a.database.as_deref(), Some("postgres://x"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_command_fails() {
        assert!(parse_args(&args(&["frobnicate"])).is_err());
    }
}

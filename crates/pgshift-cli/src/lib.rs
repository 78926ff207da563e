//! `pgshift` command-line utilities.
//!
//! This crate powers the `pgshift` binary (see `crates/pgshift-cli/src/main.rs`).
//! The public surface is intentionally small: most logic lives in internal
//! modules and is dispatched from [`run`].

mod cli;
mod config;
mod diff_tool;
mod list;
mod new;
mod prompt;
mod push;
mod repair;
mod shadow;
mod squash;
mod up;

use pgshift::CancellationToken;

/// Runs the `pgshift` CLI with an argv-style argument list.
///
/// Most callers should pass `std::env::args().collect()`.
pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cmd = cli::parse_args(&args)?;

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let result = match cmd {
        cli::Command::Help(topic) => {
            cli::print_help(topic);
            Ok(())
        }
        cli::Command::Migration(cmd) => match cmd {
            cli::MigrationCommand::New(args) => new::run(args).await,
            cli::MigrationCommand::List(args) => list::run(args, &token).await,
            cli::MigrationCommand::Up(args) => up::run(args, &token).await,
            cli::MigrationCommand::Repair(args) => repair::run(args, &token).await,
            cli::MigrationCommand::Squash(args) => squash::run(args, &token).await,
        },
        cli::Command::Push(args) => push::run(args, &token).await,
    };

    result.map_err(append_suggestion)
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .try_init();
}

/// Attach the engine's suggested next command, when it has one.
fn append_suggestion(err: anyhow::Error) -> anyhow::Error {
    let Some(shift) = err.downcast_ref::<pgshift::ShiftError>() else {
        return err;
    };
    match shift.suggestion() {
        Some(suggestion) => anyhow::anyhow!("{shift}\n{suggestion}"),
        None => err,
    }
}

//! # pgshift
//!
//! A schema-migration engine for PostgreSQL.
//!
//! - **Statement splitter**: a finite-state lexer over PostgreSQL source
//!   honoring dollar-quoting, nested block comments, doubled-quote escapes,
//!   and `BEGIN ATOMIC` bodies
//! - **History ledger**: applied versions recorded in
//!   `supabase_migrations.schema_migrations` on the target database
//! - **Reconciliation**: on-disk files vs ledger, with out-of-order and
//!   missing-entry detection
//! - **Transactional apply**: per-file transactions with statement-precise
//!   error attribution
//! - **Drift detection**: a shadow database rebuilt from the migration
//!   files, diffed against the live local database
//!
//! Container orchestration, the schema diff/dump tools, and the prompt UI
//! are collaborator traits implemented by the caller (see [`drift`]).

pub mod apply;
pub mod client;
pub mod drift;
pub mod error;
pub mod ledger;
pub mod migration;
pub mod reconcile;
pub mod repair;
pub mod splitter;

pub use apply::{apply_migration, apply_migrations, ApplyHook};
pub use client::{connect, run_cancellable, PgExecutor};
pub use drift::{
    DriftDetector, DriftOutcome, DriftResult, Prompter, SchemaDiffer, SchemaDumper, ShadowHandle,
    ShadowOrchestrator,
};
pub use error::{ShiftError, ShiftResult};
pub use migration::MigrationFile;
pub use reconcile::find_pending;
pub use repair::{baseline_remote, repair_history, squash, RepairStatus};
pub use splitter::{split, split_and_trim, SplitterConfig};

pub use tokio_util::sync::CancellationToken;

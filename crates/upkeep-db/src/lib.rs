pub mod catalog;
pub mod database;
pub mod discovery;
pub mod ledger;
pub mod ledger_store;
pub mod migrations;
pub mod runner;

pub use catalog::builtin_migrations;
pub use database::Database;
pub use discovery::discover_sql_migrations;
pub use ledger::{LedgerStore, MemoryLedgerStore, MigrationRecord};
pub use ledger_store::SqliteLedgerStore;
pub use migrations::{Migration, SqlMigration};
pub use runner::{
    FailureStage, MigrationFailure, MigrationRunner, RollbackOutcome, RunReport,
};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, info};
use upkeep_common::{Error, Result};

use crate::database::Database;

/// A named, one-shot data or schema change.
///
/// `name` is the ledger key: once a migration with this name has been
/// recorded as executed it is never run again. `rollback` should undo
/// whatever a failed `migrate` managed to do before it failed.
#[async_trait]
pub trait Migration: Send + Sync {
    fn name(&self) -> &str;

    async fn migrate(&self) -> Result<()>;

    async fn rollback(&self) -> Result<()>;
}

/// A migration whose forward and rollback steps are SQL batches, each run
/// in its own transaction.
///
/// `up` is atomic, so `down` only runs when `up` committed in this process.
/// A rollback after a failed `up`, or after a ledger error before `up` ran,
/// is a no-op and never touches data an earlier run put in place.
pub struct SqlMigration {
    name: String,
    up: String,
    down: Option<String>,
    db: Arc<Database>,
    committed: AtomicBool,
}

impl SqlMigration {
    pub fn new(
        db: Arc<Database>,
        name: impl Into<String>,
        up: impl Into<String>,
        down: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            up: up.into(),
            down,
            db,
            committed: AtomicBool::new(false),
        }
    }

    pub fn up_sql(&self) -> &str {
        &self.up
    }

    pub fn down_sql(&self) -> Option<&str> {
        self.down.as_deref()
    }
}

#[async_trait]
impl Migration for SqlMigration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn migrate(&self) -> Result<()> {
        self.db
            .execute_in_transaction(&self.up)
            .map_err(|e| Error::Migration(format!("{}: {e}", self.name)))?;
        self.committed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        if !self.committed.load(Ordering::SeqCst) {
            info!("{} did not commit in this run, nothing to roll back", self.name);
            return Ok(());
        }
        let Some(down) = &self.down else {
            debug!("no rollback SQL for {}, nothing to undo", self.name);
            return Ok(());
        };
        self.db
            .execute_in_transaction(down)
            .map_err(|e| Error::Rollback(format!("{}: {e}", self.name)))?;
        self.committed.store(false, Ordering::SeqCst);
        Ok(())
    }
}

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use upkeep_common::{Error, Result};
use uuid::Uuid;

/// A persisted ledger entry marking a migration as applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub id: String,
    pub name: String,
    pub executed: bool,
    pub executed_at: DateTime<Utc>,
}

impl MigrationRecord {
    /// A record for a migration that has just completed.
    pub fn applied(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            executed: true,
            executed_at: Utc::now(),
        }
    }
}

/// Read/write contract the runner needs from the migration ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// The record for `name` with `executed = true`, if one exists.
    async fn find_applied_record(&self, name: &str) -> Result<Option<MigrationRecord>>;

    async fn create_record(&self, record: &MigrationRecord) -> Result<()>;

    /// All records, oldest first.
    async fn list_records(&self) -> Result<Vec<MigrationRecord>>;
}

/// Ledger kept in process memory. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryLedgerStore {
    records: Mutex<Vec<MigrationRecord>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all recorded migrations, in insertion order.
    pub fn names(&self) -> Result<Vec<String>> {
        let records = self
            .records
            .lock()
            .map_err(|_| Error::Database("ledger lock poisoned".into()))?;
        Ok(records.iter().map(|r| r.name.clone()).collect())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn find_applied_record(&self, name: &str) -> Result<Option<MigrationRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|_| Error::Database("ledger lock poisoned".into()))?;
        Ok(records
            .iter()
            .find(|r| r.executed && r.name == name)
            .cloned())
    }

    async fn create_record(&self, record: &MigrationRecord) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| Error::Database("ledger lock poisoned".into()))?;
        if record.executed && records.iter().any(|r| r.executed && r.name == record.name) {
            return Err(Error::Database(format!(
                "migration {} is already recorded as executed",
                record.name
            )));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<MigrationRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|_| Error::Database("ledger lock poisoned".into()))?;
        Ok(records.clone())
    }
}

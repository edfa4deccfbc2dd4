use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{OptionalExtension, params};
use tracing::info;
use upkeep_common::{Error, Result};

use crate::database::Database;
use crate::ledger::{LedgerStore, MigrationRecord};

/// Migration ledger persisted in the `data_migrations` table.
pub struct SqliteLedgerStore {
    db: Arc<Database>,
}

impl SqliteLedgerStore {
    /// Wrap `db`, creating the ledger table if it does not exist yet.
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let store = Self { db };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<()> {
        let conn = self.db.connection()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS data_migrations (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                executed INTEGER NOT NULL DEFAULT 0,
                executed_at TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_data_migrations_executed_name
                ON data_migrations(name) WHERE executed = 1;",
        )
        .map_err(|e| Error::Database(format!("ledger schema setup failed: {e}")))?;

        info!("migration ledger ready");
        Ok(())
    }

    pub fn record_count(&self) -> Result<usize> {
        let conn = self.db.connection()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM data_migrations", [], |row| row.get(0))
            .map_err(|e| Error::Database(format!("failed to count ledger records: {e}")))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn find_applied_record(&self, name: &str) -> Result<Option<MigrationRecord>> {
        let conn = self.db.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, executed, executed_at
                 FROM data_migrations
                 WHERE name = ?1 AND executed = 1
                 LIMIT 1",
            )
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        stmt.query_row(params![name], |row| {
            Ok(MigrationRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                executed: row.get(2)?,
                executed_at: parse_datetime(row.get::<_, String>(3)?),
            })
        })
        .optional()
        .map_err(|e| Error::Database(format!("failed to look up migration {name}: {e}")))
    }

    async fn create_record(&self, record: &MigrationRecord) -> Result<()> {
        let conn = self.db.connection()?;
        conn.execute(
            "INSERT INTO data_migrations (id, name, executed, executed_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.id,
                record.name,
                record.executed,
                record.executed_at.to_rfc3339_opts(SecondsFormat::Micros, true)
            ],
        )
        .map_err(|e| Error::Database(format!("failed to record migration {}: {e}", record.name)))?;
        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<MigrationRecord>> {
        let conn = self.db.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, executed, executed_at
                 FROM data_migrations
                 ORDER BY executed_at ASC, rowid ASC",
            )
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(MigrationRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    executed: row.get(2)?,
                    executed_at: parse_datetime(row.get::<_, String>(3)?),
                })
            })
            .map_err(|e| Error::Database(format!("failed to query ledger: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(format!("failed to read ledger row: {e}")))
    }
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // SQLite datetime('now') produces "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
                .unwrap_or_else(|_| Utc::now())
        })
}

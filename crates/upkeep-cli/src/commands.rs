use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use serde::Serialize;
use tracing::info;
use upkeep_config::AppConfig;
use upkeep_db::{
    Database, LedgerStore, Migration, MigrationRecord, MigrationRunner, RollbackOutcome,
    RunReport, SqliteLedgerStore, builtin_migrations, discover_sql_migrations,
};

use crate::args::{MigrateArgs, StatusArgs};

/// Everything a subcommand needs: the open database, its ledger, and the
/// ordered migration list for this deployment.
pub struct Context {
    pub ledger: Arc<SqliteLedgerStore>,
    pub definitions: Vec<Arc<dyn Migration>>,
}

impl Context {
    pub fn open(config_dir: &Path, config: &AppConfig) -> Result<Self> {
        let data_dir = config.data_dir_or(config_dir);
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let db_path = config.database.resolve_path(&data_dir);
        let db = Arc::new(
            Database::open(&db_path)
                .with_context(|| format!("failed to open database {}", db_path.display()))?,
        );
        Self::with_database(db, config)
    }

    pub fn with_database(db: Arc<Database>, config: &AppConfig) -> Result<Self> {
        let ledger =
            Arc::new(SqliteLedgerStore::new(db.clone()).context("failed to prepare ledger")?);
        let definitions = load_definitions(config, &db)?;
        Ok(Self {
            ledger,
            definitions,
        })
    }

    fn runner(&self) -> MigrationRunner {
        MigrationRunner::new(self.ledger.clone())
    }
}

/// Built-in catalog first (unless disabled), then any migrations found in
/// the configured directory.
pub fn load_definitions(config: &AppConfig, db: &Arc<Database>) -> Result<Vec<Arc<dyn Migration>>> {
    let mut definitions = if config.migrations.include_builtin {
        builtin_migrations(db)
    } else {
        Vec::new()
    };

    if let Some(dir) = &config.migrations.dir {
        let discovered = discover_sql_migrations(dir, db.clone())
            .with_context(|| format!("failed to load migrations from {}", dir.display()))?;
        info!(
            "loaded {} SQL migration(s) from {}",
            discovered.len(),
            dir.display()
        );
        for migration in discovered {
            definitions.push(Arc::new(migration));
        }
    }

    Ok(definitions)
}

pub async fn migrate(ctx: &Context, args: &MigrateArgs) -> Result<()> {
    let runner = ctx.runner();

    if args.dry_run {
        let pending = runner.pending(&ctx.definitions).await?;
        print_pending(&pending);
        return Ok(());
    }

    let report = runner.run(&ctx.definitions).await;
    println!("{}", format_report(&report));

    if let Some(failure) = &report.halted {
        bail!("data migrations halted at {}", failure.name);
    }
    Ok(())
}

pub async fn pending(ctx: &Context) -> Result<()> {
    let pending = ctx.runner().pending(&ctx.definitions).await?;
    print_pending(&pending);
    Ok(())
}

#[derive(Serialize)]
struct StatusView<'a> {
    applied: &'a [MigrationRecord],
    pending: &'a [String],
}

pub async fn status(ctx: &Context, args: &StatusArgs) -> Result<()> {
    let records = ctx.ledger.list_records().await?;
    let pending = ctx.runner().pending(&ctx.definitions).await?;

    if args.json {
        let view = StatusView {
            applied: &records,
            pending: &pending,
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let applied: Vec<&MigrationRecord> = records.iter().filter(|r| r.executed).collect();
    println!("Applied ({}):", applied.len());
    for record in applied {
        println!("  {:<40} {}", record.name, record.executed_at.to_rfc3339());
    }
    print_pending(&pending);
    Ok(())
}

fn print_pending(pending: &[String]) {
    if pending.is_empty() {
        println!("No pending migrations.");
        return;
    }
    println!("Pending ({}):", pending.len());
    for name in pending {
        println!("  {name}");
    }
}

/// Human-readable summary of a batch.
pub fn format_report(report: &RunReport) -> String {
    let mut out = format!(
        "{} applied, {} skipped",
        report.applied.len(),
        report.skipped.len()
    );
    for name in &report.applied {
        out.push_str(&format!("\n  applied  {name}"));
    }

    if let Some(failure) = &report.halted {
        out.push_str(&format!(
            "\nhalted at {} ({}): {}",
            failure.name, failure.stage, failure.error
        ));
        let rollback = match &failure.rollback {
            RollbackOutcome::Succeeded => "rollback succeeded".to_string(),
            RollbackOutcome::Failed(e) => format!("rollback FAILED: {e}"),
            RollbackOutcome::NotAttempted => "rollback not attempted".to_string(),
        };
        out.push_str(&format!("\n  {rollback}"));
        if !report.remaining.is_empty() {
            out.push_str(&format!(
                "\n  not attempted: {}",
                report.remaining.join(", ")
            ));
        }
    }
    out
}

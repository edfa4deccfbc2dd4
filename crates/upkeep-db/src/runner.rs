use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use upkeep_common::{Error, Result};

use crate::ledger::{LedgerStore, MigrationRecord};
use crate::migrations::Migration;

/// Where in a migration's lifecycle a batch was halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// The definition list was rejected before anything ran.
    Validation,
    Lookup,
    Migrate,
    /// `migrate` succeeded but the ledger entry could not be written.
    Record,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            FailureStage::Validation => "validation",
            FailureStage::Lookup => "ledger lookup",
            FailureStage::Migrate => "migrate",
            FailureStage::Record => "ledger write",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    Succeeded,
    Failed(String),
    NotAttempted,
}

/// The migration that stopped a batch, and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFailure {
    pub name: String,
    pub stage: FailureStage,
    pub error: String,
    pub rollback: RollbackOutcome,
}

/// Outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    /// Definitions after the failed one, never attempted this run.
    pub remaining: Vec<String>,
    pub halted: Option<MigrationFailure>,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.halted.is_none()
    }
}

enum Step {
    Skipped,
    Applied,
}

/// Applies data migrations in order, exactly once each, against a ledger.
///
/// A failing migration is rolled back and ends the batch; failures never
/// escape `run`, they are logged and described in the returned report.
/// Only one runner should operate on a given ledger at a time.
pub struct MigrationRunner {
    ledger: Arc<dyn LedgerStore>,
}

impl MigrationRunner {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    pub async fn run(&self, definitions: &[Arc<dyn Migration>]) -> RunReport {
        let mut report = RunReport::default();

        if let Some(index) = find_duplicate(definitions) {
            let name = definitions[index].name().to_string();
            error!("duplicate data migration name, nothing was run: {name}");
            report.remaining = names_from(definitions, 0);
            report.halted = Some(MigrationFailure {
                error: format!("migration name {name} appears more than once"),
                name,
                stage: FailureStage::Validation,
                rollback: RollbackOutcome::NotAttempted,
            });
            return report;
        }

        for (index, migration) in definitions.iter().enumerate() {
            let name = migration.name();

            match self.apply(migration.as_ref()).await {
                Ok(Step::Skipped) => report.skipped.push(name.to_string()),
                Ok(Step::Applied) => report.applied.push(name.to_string()),
                Err((stage, err)) => {
                    error!("data migration failed ({stage}): {name}: {err}");
                    let rollback = roll_back(migration.as_ref(), stage).await;

                    report.remaining = names_from(definitions, index + 1);
                    report.halted = Some(MigrationFailure {
                        name: name.to_string(),
                        stage,
                        error: err.to_string(),
                        rollback,
                    });
                    break;
                }
            }
        }

        match &report.halted {
            Some(failure) => warn!(
                "data migrations halted at {}: {} applied, {} skipped, {} not attempted",
                failure.name,
                report.applied.len(),
                report.skipped.len(),
                report.remaining.len()
            ),
            None => info!(
                "data migrations complete: {} applied, {} skipped",
                report.applied.len(),
                report.skipped.len()
            ),
        }

        report
    }

    /// Names with no applied ledger entry, in definition order. Runs nothing.
    pub async fn pending(&self, definitions: &[Arc<dyn Migration>]) -> Result<Vec<String>> {
        let mut pending = Vec::new();
        for migration in definitions {
            if self
                .ledger
                .find_applied_record(migration.name())
                .await?
                .is_none()
            {
                pending.push(migration.name().to_string());
            }
        }
        Ok(pending)
    }

    async fn apply(
        &self,
        migration: &dyn Migration,
    ) -> std::result::Result<Step, (FailureStage, Error)> {
        let name = migration.name();

        let existing = self
            .ledger
            .find_applied_record(name)
            .await
            .map_err(|e| (FailureStage::Lookup, e))?;
        if existing.is_some() {
            debug!("skipping data migration: {name}");
            return Ok(Step::Skipped);
        }

        info!("running data migration: {name}");
        migration
            .migrate()
            .await
            .map_err(|e| (FailureStage::Migrate, e))?;

        // Recorded only after migrate succeeds; a failure above leaves no entry.
        self.ledger
            .create_record(&MigrationRecord::applied(name))
            .await
            .map_err(|e| (FailureStage::Record, e))?;

        info!("data migration complete: {name}");
        Ok(Step::Applied)
    }
}

async fn roll_back(migration: &dyn Migration, stage: FailureStage) -> RollbackOutcome {
    let name = migration.name();
    info!("rolling back data migration: {name}");

    match migration.rollback().await {
        Ok(()) => {
            info!("rolled back data migration: {name}");
            RollbackOutcome::Succeeded
        }
        Err(e) => {
            error!("data migration rollback failed: {name}: {e}");
            if stage == FailureStage::Record {
                warn!(
                    "{name} was applied but is not in the ledger; it will run again on the next batch"
                );
            }
            RollbackOutcome::Failed(e.to_string())
        }
    }
}

fn find_duplicate(definitions: &[Arc<dyn Migration>]) -> Option<usize> {
    let mut seen = HashSet::new();
    definitions
        .iter()
        .position(|migration| !seen.insert(migration.name()))
}

fn names_from(definitions: &[Arc<dyn Migration>], start: usize) -> Vec<String> {
    definitions
        .iter()
        .skip(start)
        .map(|m| m.name().to_string())
        .collect()
}

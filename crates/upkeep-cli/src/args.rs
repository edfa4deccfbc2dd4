use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "upkeep", version, about = "Run and inspect Upkeep data migrations")]
pub struct Cli {
    /// Directory containing config.yml / config.toml (default: ~/.upkeep)
    #[arg(long, global = true, env = "UPKEEP_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Override the configured log level (e.g. debug, info, warn)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply every pending data migration, in order
    Migrate(MigrateArgs),
    /// Show the migration ledger and what is still pending
    Status(StatusArgs),
    /// List pending migrations without running them
    Pending,
}

#[derive(Parser, Debug, Clone)]
pub struct MigrateArgs {
    /// Print what would run and exit
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct StatusArgs {
    /// Print the status as JSON
    #[arg(long)]
    pub json: bool,
}

mod args;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use upkeep_config::ConfigLoader;

use crate::args::{Cli, Command};
use crate::commands::Context;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(ConfigLoader::default_config_dir);
    let mut config = ConfigLoader::new(&config_dir).load()?;

    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
    if cli.json_logs {
        config.log.json = true;
    }
    logging::init_tracing(&config.log.level, config.log.json);

    let ctx = Context::open(&config_dir, &config)?;

    match &cli.command {
        Command::Migrate(args) => commands::migrate(&ctx, args).await,
        Command::Status(args) => commands::status(&ctx, args).await,
        Command::Pending => commands::pending(&ctx).await,
    }
}

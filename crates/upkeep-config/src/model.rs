use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const DEFAULT_DB_FILE: &str = "upkeep.db";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the SQLite database and other state.
    pub data_dir: Option<PathBuf>,
    pub database: DatabaseConfig,
    pub migrations: MigrationsConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Explicit database file. Takes precedence over `data_dir`.
    pub path: Option<PathBuf>,
    pub file_name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            file_name: DEFAULT_DB_FILE.to_string(),
        }
    }
}

impl DatabaseConfig {
    /// Resolve the database file location against the data directory.
    pub fn resolve_path(&self, data_dir: &Path) -> PathBuf {
        match &self.path {
            Some(path) => path.clone(),
            None => data_dir.join(&self.file_name),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    /// Optional directory of `<version>_<name>.up.sql` / `.down.sql` files,
    /// applied after the built-in catalog.
    pub dir: Option<PathBuf>,
    pub include_builtin: bool,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            include_builtin: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// The data directory, falling back to `<config_dir>/data`.
    pub fn data_dir_or(&self, config_dir: &Path) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| config_dir.join("data"))
    }
}

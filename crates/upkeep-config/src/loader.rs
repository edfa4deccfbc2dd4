use std::path::{Path, PathBuf};

use tracing::{debug, info};
use upkeep_common::{Error, Result};

use crate::model::AppConfig;

const CONFIG_FILE_NAMES: &[&str] = &["config.yml", "config.yaml", "config.toml"];

/// Locates and parses the Upkeep config file.
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// `~/.upkeep`, or `./.upkeep` when no home directory is known.
    pub fn default_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".upkeep")
    }

    /// Load the first config file found in the config directory, or the
    /// defaults if there is none. Environment overrides are applied last.
    pub fn load(&self) -> Result<AppConfig> {
        let found = CONFIG_FILE_NAMES
            .iter()
            .map(|name| self.config_dir.join(name))
            .find(|path| path.is_file());

        let mut config = match found {
            Some(path) => Self::load_file(&path)?,
            None => {
                debug!(
                    "no config file in {}, using defaults",
                    self.config_dir.display()
                );
                AppConfig::default()
            }
        };

        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a single config file, choosing the format by extension.
    pub fn load_file(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config = match ext {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}")))?,
            "toml" => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("TOML parse error: {e}")))?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config extension: {other}"
                )));
            }
        };

        info!("loaded config from {}", path.display());
        Ok(config)
    }
}

/// Apply `UPKEEP_DATA_DIR` and `UPKEEP_LOG_LEVEL` on top of the file config.
pub fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(dir) = lookup("UPKEEP_DATA_DIR").filter(|v| !v.is_empty()) {
        config.data_dir = Some(PathBuf::from(dir));
    }
    if let Some(level) = lookup("UPKEEP_LOG_LEVEL").filter(|v| !v.is_empty()) {
        config.log.level = level;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());
        let config = loader.load().unwrap();
        assert!(config.migrations.include_builtin);
    }

    #[test]
    fn loads_yaml_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yml"),
            "data_dir: /srv/upkeep\nmigrations:\n  dir: /srv/upkeep/migrations\n  include_builtin: false\nlog:\n  json: true\n",
        )
        .unwrap();

        let config = ConfigLoader::load_file(&dir.path().join("config.yml")).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/upkeep")));
        assert_eq!(
            config.migrations.dir,
            Some(PathBuf::from("/srv/upkeep/migrations"))
        );
        assert!(!config.migrations.include_builtin);
        assert!(config.log.json);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn loads_toml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[database]\nfile_name = \"monitors.db\"\n\n[log]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = ConfigLoader::load_file(&path).unwrap();
        assert_eq!(config.database.file_name, "monitors.db");
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();

        let err = ConfigLoader::load_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn malformed_yaml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "log: [unterminated").unwrap();

        let err = ConfigLoader::load_file(&path).unwrap_err();
        assert!(err.to_string().contains("YAML parse error"));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, |key| match key {
            "UPKEEP_DATA_DIR" => Some("/data".to_string()),
            "UPKEEP_LOG_LEVEL" => Some("warn".to_string()),
            _ => None,
        });
        assert_eq!(config.data_dir, Some(PathBuf::from("/data")));
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, |_| Some(String::new()));
        assert!(config.data_dir.is_none());
        assert_eq!(config.log.level, "info");
    }
}

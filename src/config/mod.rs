//! Configuration management for osrc

pub mod schema;

pub use schema::Config;

use crate::error::{OsrcError, OsrcResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Name of the project-local configuration file
pub const LOCAL_CONFIG_FILE: &str = ".osrc.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("osrc")
            .join("config.toml")
    }

    /// Walk up from `start` looking for `.osrc.toml`
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> OsrcResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> OsrcResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| OsrcError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| OsrcError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load the global config with `local` layered on top.
    ///
    /// Tables merge key by key; any other local value replaces the global one.
    pub async fn load_merged(&self, local: Option<&Path>) -> OsrcResult<Config> {
        let Some(local) = local else {
            return self.load().await;
        };

        let mut merged = if self.config_path.exists() {
            read_value(&self.config_path).await?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };
        let overlay = read_value(local).await?;
        merge_values(&mut merged, overlay);

        merged.try_into().map_err(|e: toml::de::Error| OsrcError::ConfigInvalid {
            path: local.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> OsrcResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            OsrcError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> OsrcResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| OsrcError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_value(path: &Path) -> OsrcResult<toml::Value> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| OsrcError::io(format!("reading config from {}", path.display()), e))?;
    content
        .parse()
        .map_err(|e: toml::de::Error| OsrcError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Merge `overlay` into `base`, recursing into tables
pub fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.buildpack.engine, "auto");
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.buildpack.engine = "docker".to_string();

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.buildpack.engine, "docker");
    }

    #[tokio::test]
    async fn local_config_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("config.toml");
        std::fs::write(
            &global,
            "[buildpack]\nengine = \"podman\"\nnetwork = \"host\"\n\n[package]\nlayered = true\n",
        )
        .unwrap();
        let local = temp.path().join(LOCAL_CONFIG_FILE);
        std::fs::write(&local, "[buildpack]\nengine = \"docker\"\n").unwrap();

        let manager = ConfigManager::with_path(global);
        let config = manager.load_merged(Some(&local)).await.unwrap();
        assert_eq!(config.buildpack.engine, "docker");
        assert_eq!(config.buildpack.network.as_deref(), Some("host"));
        assert!(config.package.layered);
    }

    #[tokio::test]
    async fn invalid_local_config_names_the_file() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join(LOCAL_CONFIG_FILE);
        std::fs::write(&local, "[package]\nlayered = \"yes\"\n").unwrap();
        let manager = ConfigManager::with_path(temp.path().join("missing.toml"));
        let err = manager.load_merged(Some(&local)).await.unwrap_err();
        assert!(matches!(err, OsrcError::ConfigInvalid { .. }));
    }

    #[test]
    fn find_local_config_walks_up() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        assert!(ConfigManager::find_local_config(&nested).is_none()
            || !ConfigManager::find_local_config(&nested)
                .unwrap()
                .starts_with(temp.path()));

        std::fs::write(temp.path().join("a").join(LOCAL_CONFIG_FILE), "").unwrap();
        assert_eq!(
            ConfigManager::find_local_config(&nested).unwrap(),
            temp.path().join("a").join(LOCAL_CONFIG_FILE)
        );
    }
}

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::db::{BackendType, DatabaseConfig};
use crate::error::Result;
use crate::store::StoreOptions;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "SHOPLIST_CONFIG";
/// Environment variable overriding the database path
pub const DATABASE_ENV: &str = "SHOPLIST_DB";

/// User configuration, stored as YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Path to the database file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    /// Backend name (yaml, sqlite, memory); inferred from the path when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    /// Reject empty list titles and item labels
    #[serde(default)]
    pub require_text: bool,
}

impl Config {
    /// Loads the config from the provided path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Loads the config if the file exists, otherwise returns defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the config to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Parsed backend setting, if any
    pub fn backend_type(&self) -> Result<Option<BackendType>> {
        match &self.backend {
            Some(name) => name
                .parse()
                .map(Some)
                .map_err(|e: String| anyhow::anyhow!(e).into()),
            None => Ok(None),
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            require_text: self.require_text,
        }
    }

    /// Resolves the database to open.
    ///
    /// Priority: explicit path, then `SHOPLIST_DB`, then the config file,
    /// then the default data location. An explicit backend wins over the
    /// configured one, which wins over inference from the extension.
    pub fn resolve_database(
        &self,
        path_override: Option<&Path>,
        backend_override: Option<BackendType>,
    ) -> Result<DatabaseConfig> {
        let path = match path_override {
            Some(path) => path.to_path_buf(),
            None => match env::var(DATABASE_ENV) {
                Ok(path) if !path.is_empty() => PathBuf::from(path),
                _ => match &self.database {
                    Some(path) => path.clone(),
                    None => default_database_path()?,
                },
            },
        };

        let backend_type = match backend_override {
            Some(bt) => bt,
            None => self
                .backend_type()?
                .unwrap_or_else(|| BackendType::from_path(&path)),
        };

        Ok(DatabaseConfig { path, backend_type })
    }
}

/// Gets the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    let config_dir = dirs::config_dir().context("Failed to determine config directory")?;
    Ok(config_dir.join("shoplist").join("config.yaml"))
}

/// Default database location under the user's data directory
pub fn default_database_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("Failed to determine data directory")?;
    Ok(data_dir.join("shoplist").join("lists.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");

        let config = Config {
            database: Some(PathBuf::from("/data/lists.db")),
            backend: None,
            require_text: true,
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(loaded.store_options().require_text);
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_or_default(temp_dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, Config::default());
        assert!(!config.require_text);
    }

    #[test]
    fn test_explicit_path_wins() {
        let config = Config {
            database: Some(PathBuf::from("/data/lists.yaml")),
            backend: None,
            require_text: false,
        };
        let resolved = config
            .resolve_database(Some(Path::new("/tmp/other.db")), None)
            .unwrap();
        assert_eq!(resolved.path, PathBuf::from("/tmp/other.db"));
        assert_eq!(resolved.backend_type, BackendType::Sqlite);
    }

    #[test]
    fn test_configured_backend_overrides_extension() {
        let config = Config {
            database: None,
            backend: Some("sqlite".to_string()),
            require_text: false,
        };
        let resolved = config
            .resolve_database(Some(Path::new("/tmp/lists.data")), None)
            .unwrap();
        assert_eq!(resolved.backend_type, BackendType::Sqlite);

        let resolved = config
            .resolve_database(Some(Path::new("/tmp/lists.data")), Some(BackendType::Memory))
            .unwrap();
        assert_eq!(resolved.backend_type, BackendType::Memory);
    }

    #[test]
    fn test_invalid_backend_name() {
        let config = Config {
            backend: Some("postgres".to_string()),
            ..Default::default()
        };
        assert!(config.backend_type().is_err());
    }
}

//! Application configuration.
//!
//! Settings live in an optional JSON file (`config.json` under the platform
//! config directory). A database URL given on the command line or through
//! `DATABASE_URL` takes precedence over the file's connection fields.

use crate::error::{Result, ResultExt as _, SheetError};
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr as _;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub database: DbSettings,
    pub extract: ExtractSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DbSettings {
    /// Full connection URL; overrides the individual fields when set.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(
        serialize_with = "serialize_password",
        deserialize_with = "deserialize_password"
    )]
    pub password: SecretString,
    pub database: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

// Passwords are read from the file but never written back.
fn serialize_password<S>(
    _password: &SecretString,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str("")
}

fn deserialize_password<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(SecretString::new(s.into()))
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_owned(),
            port: 5432,
            user: "postgres".to_owned(),
            password: SecretString::new(String::new().into()),
            database: "postgres".to_owned(),
            max_connections: 5,
            acquire_timeout_secs: 10,
        }
    }
}

impl DbSettings {
    /// Connection options for sqlx.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the configured URL cannot be parsed.
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if let Some(url) = &self.url {
            return PgConnectOptions::from_str(url)
                .map_err(|e| SheetError::InvalidInput(e.to_string()))
                .context("Failed to parse database URL");
        }

        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database);
        let password = self.password.expose_secret();
        if !password.is_empty() {
            options = options.password(password);
        }
        Ok(options)
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        if url.is_some() {
            self.url = url;
        }
        self
    }
}

/// Where the extractor finds its sheets.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ExtractSettings {
    pub metadata_sheet: String,
    pub data_sheet: String,
    /// Title rows above the data sheet's header.
    pub skip_rows: usize,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            metadata_sheet: "Metadata".to_owned(),
            data_sheet: "Data".to_owned(),
            skip_rows: 5,
        }
    }
}

pub fn get_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sheetstore").join("config.json"))
}

/// Loads configuration from `path`, or from the default location.
///
/// A missing file yields defaults; an unreadable or malformed one is an error.
///
/// # Errors
///
/// Propagates I/O and JSON errors for files that exist.
pub fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match get_config_path() {
            Some(p) => p,
            None => return Ok(AppConfig::default()),
        },
    };

    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = serde_json::from_str::<AppConfig>(&content)
        .map_err(|e| SheetError::InvalidInput(e.to_string()))
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    Ok(config)
}

/// Writes `config` as pretty JSON, creating parent directories. The password
/// is blanked on the way out.
pub fn save_app_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use secrecy::ExposeSecret as _;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() -> Result<()> {
        let temp = TempDir::new()?;
        let config = load_app_config(Some(temp.path().join("absent.json").as_path()))?;
        assert_eq!(config.extract, ExtractSettings::default());
        assert_eq!(config.database.port, 5432);
        Ok(())
    }

    #[test]
    fn test_partial_file_fills_defaults() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "database": { "host": "db", "password": "hunter2" }, "extract": { "data_sheet": "Master Sheet" } }"#,
        )?;

        let config = load_app_config(Some(path.as_path()))?;
        assert_eq!(config.database.host, "db");
        assert_eq!(config.database.password.expose_secret(), "hunter2");
        assert_eq!(config.extract.data_sheet, "Master Sheet");
        assert_eq!(config.extract.skip_rows, 5);
        Ok(())
    }

    #[test]
    fn test_password_never_written() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("out").join("config.json");
        let mut config = AppConfig::default();
        config.database.password = SecretString::new("hunter2".into());

        save_app_config(&config, &path)?;
        let written = std::fs::read_to_string(&path)?;
        assert!(!written.contains("hunter2"));
        Ok(())
    }

    #[test]
    fn test_url_overrides_fields() -> Result<()> {
        let settings =
            DbSettings::default().with_url(Some("postgres://u:p@example:6543/sheets".to_owned()));
        let options = settings.connect_options()?;
        assert_eq!(options.get_host(), "example");
        assert_eq!(options.get_port(), 6543);
        Ok(())
    }

    #[test]
    fn test_malformed_file_is_error() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{ not json")?;
        assert!(load_app_config(Some(path.as_path())).is_err());
        Ok(())
    }
}

//! Application settings persistence
//!
//! Handles saving and loading the store configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::utils;

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Persistence store settings
    #[serde(default)]
    pub database: DatabaseSettings,
}

/// Persistence store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Database file, defaults to `music_database.db` in the data directory
    pub path: Option<PathBuf>,
    /// Pooled connections shared by readers and the writer
    pub max_connections: u32,
    /// Use write-ahead logging
    pub wal: bool,
    /// How long SQLite retries a locked database
    pub busy_timeout_ms: u64,
    /// How long a write waits for the previous one to finish
    pub write_timeout_ms: u64,
    /// Drop and recreate all tables when no migration path exists.
    /// Loses every stored row.
    pub destructive_fallback: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 5,
            wal: true,
            busy_timeout_ms: 5_000,
            write_timeout_ms: 10_000,
            destructive_fallback: false,
        }
    }
}

impl DatabaseSettings {
    /// The configured path, or the default location
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(utils::default_database_path)
    }
}

impl Settings {
    /// Get the settings file path
    pub fn file_path() -> Option<PathBuf> {
        utils::project_dirs().map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Load settings from file, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = Self::file_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from_file(&path).unwrap_or_else(|e| {
            warn!("Ignoring settings at {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save settings to the default file
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::file_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to_file(&path)
    }

    /// Save settings to a specific file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Errors that can occur with settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Could not determine config directory")]
    NoConfigDir,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());

        let settings: Settings =
            serde_json::from_str(r#"{ "database": { "max_connections": 2 } }"#).unwrap();
        assert_eq!(settings.database.max_connections, 2);
        assert!(settings.database.wal);
        assert!(!settings.database.destructive_fallback);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("settings.json");

        let mut settings = Settings::default();
        settings.database.path = Some(dir.path().join("music.db"));
        settings.database.write_timeout_ms = 250;
        settings.save_to_file(&path).unwrap();

        assert_eq!(Settings::load_from_file(&path).unwrap(), settings);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Settings::load_from_file(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
        assert!(matches!(
            Settings::load_from_file(&dir.path().join("missing.json")),
            Err(SettingsError::Io(_))
        ));
    }

    #[test]
    fn explicit_path_wins_over_default() {
        let settings = DatabaseSettings {
            path: Some(PathBuf::from("/tmp/elsewhere.db")),
            ..DatabaseSettings::default()
        };
        assert_eq!(
            settings.resolved_path(),
            Some(PathBuf::from("/tmp/elsewhere.db"))
        );
    }
}

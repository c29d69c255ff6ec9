use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Name of the catalog database inside the library directory
pub const CATALOG_FILE_NAME: &str = "catalog.db";

/// Log level for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Configuration for the library manager
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the managed library; may start with `~`
    pub library_dir: PathBuf,

    /// Number of parser/staging workers
    pub workers: usize,

    /// Whether imports descend into subdirectories by default
    pub recursive: bool,

    /// Where removed files wait until the catalog delete commits
    pub quarantine_dir: Option<PathBuf>,

    /// Editor used to review metadata before import (falls back to $EDITOR, then nano)
    pub editor: Option<String>,

    /// Directory for the rolling log file; console logging when unset
    pub log_dir: Option<PathBuf>,

    /// Log level
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library_dir: PathBuf::from("~/.ebm"),
            workers: std::cmp::min(num_cpus::get(), 4),
            recursive: false,
            quarantine_dir: None,
            editor: None,
            log_dir: None,
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Configuration(format!("Failed to open config file: {}", e)))?;

        let config: Config = serde_json::from_reader(file)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| Error::Configuration(format!("Failed to create config file: {}", e)))?;

        serde_json::to_writer_pretty(file, self)
            .map_err(|e| Error::Configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Configuration(
                "At least one worker is required".to_string(),
            ));
        }

        if self.library_dir.as_os_str().is_empty() {
            return Err(Error::Configuration(
                "Library directory must not be empty".to_string(),
            ));
        }

        let library = self.library_root()?;
        let quarantine = self.quarantine_root()?;
        if quarantine.starts_with(&library) {
            return Err(Error::Configuration(format!(
                "Quarantine directory {} must not be inside the library",
                quarantine.display()
            )));
        }

        Ok(())
    }

    /// Library directory with `~` expanded
    pub fn library_root(&self) -> Result<PathBuf> {
        expand_home(&self.library_dir)
    }

    /// Path of the catalog database
    pub fn catalog_path(&self) -> Result<PathBuf> {
        Ok(self.library_root()?.join(CATALOG_FILE_NAME))
    }

    /// Quarantine directory with `~` expanded
    pub fn quarantine_root(&self) -> Result<PathBuf> {
        match &self.quarantine_dir {
            Some(dir) => expand_home(dir),
            None => Ok(std::env::temp_dir().join("ebm-quarantine")),
        }
    }

    /// Editor command for the review step
    pub fn editor_command(&self) -> String {
        self.editor
            .clone()
            .or_else(|| std::env::var("EDITOR").ok().filter(|e| !e.trim().is_empty()))
            .unwrap_or_else(|| "nano".to_string())
    }
}

/// Bind a leading `~` to the home directory
pub fn expand_home(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = dirs::home_dir().ok_or_else(|| {
                Error::Configuration("Cannot determine home directory".to_string())
            })?;
            Ok(home.join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.workers >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = Config {
            workers: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_quarantine_inside_library_rejected() {
        let config = Config {
            library_dir: PathBuf::from("/srv/books"),
            quarantine_dir: Some(PathBuf::from("/srv/books/.trash")),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ebm.json");
        let config = Config {
            library_dir: PathBuf::from("/srv/books"),
            workers: 3,
            recursive: true,
            ..Default::default()
        };

        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();

        assert_eq!(loaded.library_dir, PathBuf::from("/srv/books"));
        assert_eq!(loaded.workers, 3);
        assert!(loaded.recursive);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ebm.json");
        std::fs::write(&path, r#"{"library_dir": "/srv/books"}"#).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.library_dir, PathBuf::from("/srv/books"));
        assert_eq!(loaded.log_level, LogLevel::Info);
    }

    #[test]
    fn test_expand_home() {
        let absolute = expand_home(Path::new("/srv/books")).unwrap();
        assert_eq!(absolute, PathBuf::from("/srv/books"));

        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/.ebm")).unwrap(), home.join(".ebm"));
        }
    }

    #[test]
    fn test_catalog_path() {
        let config = Config {
            library_dir: PathBuf::from("/lib"),
            ..Default::default()
        };
        assert_eq!(config.catalog_path().unwrap(), PathBuf::from("/lib/catalog.db"));
    }
}

//! Optional YAML settings.
//!
//! Settings supply defaults for options the command line leaves out. They
//! are read from `--config`, or from `simtally/settings.yaml` in the user
//! config directory when that file exists.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::storage::{StorageError, StorageFormat};

const SETTINGS_FILE: &str = "settings.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Output format when neither a flag nor the file extension picks one
    pub format: Option<StorageFormat>,
    /// Confidence level of reported intervals, in percent
    pub confidence: f64,
    pub log_level: String,
    /// Append logs here instead of writing to stderr
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            format: None,
            confidence: 95.0,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("simtally").join(SETTINGS_FILE))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, serde_saphyr::Error> {
        serde_saphyr::from_str(yaml)
    }

    pub fn to_yaml(&self) -> Result<String, serde_saphyr::ser::Error> {
        serde_saphyr::to_string(self)
    }

    /// Load settings from `path`, or from the default location.
    ///
    /// An explicit path must exist; a missing default file yields the
    /// defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, StorageError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            StorageError::Io(format!("Failed to read settings {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content).map_err(|e| {
            StorageError::Parse(format!("Invalid settings {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let settings = Settings::from_yaml("confidence: 99.0\nformat: json\n").unwrap();
        assert_eq!(settings.confidence, 99.0);
        assert_eq!(settings.format, Some(StorageFormat::Json));
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.log_file, None);
    }

    #[test]
    fn test_yaml_round_trip() {
        let settings = Settings {
            format: Some(StorageFormat::Yaml),
            confidence: 90.0,
            log_level: "debug".to_string(),
            log_file: Some(PathBuf::from("/tmp/simtally.log")),
        };
        let yaml = settings.to_yaml().unwrap();
        assert_eq!(Settings::from_yaml(&yaml).unwrap(), settings);
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "log_level: warn\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.confidence, 95.0);

        assert!(matches!(
            Settings::load(Some(&dir.path().join("missing.yaml"))),
            Err(StorageError::Io(_))
        ));
    }
}

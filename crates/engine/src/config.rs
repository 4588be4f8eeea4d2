//! Engine configuration file.
//!
//! ```toml
//! [engine]
//! overdue_after_days = 14
//!
//! [directory]
//! administrators = ["hr-admin"]
//!
//! [logging]
//! level = "info"
//! json = false
//! ```
//!
//! Every section is optional and falls back to the defaults shown.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::directory::StaticDirectory;
use crate::projection::ProjectionPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub engine: EngineSettings,
    pub directory: DirectorySettings,
    pub logging: LoggingSettings,
}

/// `[engine]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    pub overdue_after_days: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            overdue_after_days: ProjectionPolicy::default().overdue_after_days,
        }
    }
}

/// `[directory]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectorySettings {
    /// Actor ids holding the administrator role on every instance.
    pub administrators: Vec<String>,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `SIGNOFF_LOG`.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.overdue_after_days == 0 {
            return Err(ConfigError::Invalid(
                "engine.overdue_after_days must be at least 1".to_string(),
            ));
        }
        if let Some(blank) = self.directory.administrators.iter().find(|a| a.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "directory.administrators contains a blank id '{}'",
                blank
            )));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.level must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn policy(&self) -> ProjectionPolicy {
        ProjectionPolicy {
            overdue_after_days: self.engine.overdue_after_days,
        }
    }

    pub fn directory(&self) -> StaticDirectory {
        StaticDirectory::new(self.directory.administrators.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.policy().overdue_after_days, 14);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn full_file_parses() {
        let config = EngineConfig::from_toml_str(
            r#"
            [engine]
            overdue_after_days = 5

            [directory]
            administrators = ["hr-admin", "ops"]

            [logging]
            level = "debug"
            json = true
            "#,
        )
        .unwrap();
        assert_eq!(config.policy().overdue_after_days, 5);
        assert!(config.directory().is_administrator("ops"));
        assert!(!config.directory().is_administrator("E1"));
        assert!(config.logging.json);
    }

    #[test]
    fn zero_overdue_threshold_is_invalid() {
        let err = EngineConfig::from_toml_str("[engine]\noverdue_after_days = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EngineConfig::from_toml_str("[engine]\noverdue_days = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file_and_reports_missing_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[directory]\nadministrators = [\"hr-admin\"]").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.directory.administrators, vec!["hr-admin".to_string()]);

        let err = EngineConfig::load(Path::new("/nonexistent/signoff.toml")).unwrap_err();
        assert!(err.to_string().starts_with("could not read '/nonexistent/signoff.toml'"));
    }
}

//! Configuration management for attrgate
//!
//! Provides hierarchical settings loading from multiple sources:
//! 1. CLI arguments (highest precedence)
//! 2. Environment variables (ATTRGATE_* prefix)
//! 3. attrgate.local.toml (gitignored, local overrides)
//! 4. attrgate.toml (git-tracked, deployment settings)
//! 5. ~/.config/attrgate/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)
//!
//! The authorization policy itself lives in a separate document named by
//! `policy.file`; see [`policy_file`].

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;
pub mod policy_file;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Text shown when a rejected client configured no message at all.
pub const DEFAULT_GENERIC_TEXT: &str = "You are not authorized to access this service.";

/// Main attrgate settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttrgateConfig {
    pub policy: PolicyConfig,
    pub logging: LoggingConfig,
    pub rejection: RejectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Policy document (TOML or JSON)
    pub file: PathBuf,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("policy.toml"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive; `RUST_LOG` wins when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RejectionConfig {
    /// Endpoint denied requests are redirected to.
    pub endpoint: String,
    pub default_language: String,
    pub generic_text: String,
}

impl Default for RejectionConfig {
    fn default() -> Self {
        Self {
            endpoint: "/authorize/403".to_string(),
            default_language: "en".to_string(),
            generic_text: DEFAULT_GENERIC_TEXT.to_string(),
        }
    }
}

impl AttrgateConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if self.policy.file.is_relative() {
            self.policy.file = base.join(&self.policy.file);
        }
    }

    /// Check values the type system cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rejection.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "rejection.endpoint must not be empty".to_string(),
            ));
        }
        if self.rejection.default_language.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "rejection.default_language must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AttrgateConfig::default();
        assert_eq!(config.policy.file, PathBuf::from("policy.toml"));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_eq!(config.rejection.endpoint, "/authorize/403");
        assert_eq!(config.rejection.default_language, "en");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_path_resolution() {
        let mut config = AttrgateConfig::default();
        config.resolve_paths("/etc/attrgate");
        assert_eq!(config.policy.file, PathBuf::from("/etc/attrgate/policy.toml"));

        config.policy.file = PathBuf::from("/srv/policy.json");
        config.resolve_paths("/etc/attrgate");
        assert_eq!(config.policy.file, PathBuf::from("/srv/policy.json"));
    }

    #[test]
    fn test_validation() {
        let mut config = AttrgateConfig::default();
        config.rejection.endpoint = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: AttrgateConfig = toml::from_str(
            r#"
[logging]
format = "json"
"#,
        )
        .expect("Failed to parse settings");

        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.rejection.default_language, "en");
    }
}

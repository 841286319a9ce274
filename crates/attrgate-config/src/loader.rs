//! Configuration loader with multi-source merging

use crate::{AttrgateConfig, Paths};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "ATTRGATE".to_string(),
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "ATTRGATE")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// TOML files that exist, lowest precedence first: user config, the
    /// deployment's `attrgate.toml`, then `attrgate.local.toml`.
    pub fn config_files(&self) -> Vec<PathBuf> {
        let user = Paths::new().user_config_file().ok();
        user.into_iter()
            .chain([
                Paths::project_config_file(&self.project_dir),
                Paths::local_config_file(&self.project_dir),
            ])
            .filter(|path| path.is_file())
            .collect()
    }

    /// Merges defaults, [`Self::config_files`] and `<PREFIX>_SECTION__KEY`
    /// environment variables, later sources winning, then validates.
    pub fn load(self) -> Result<AttrgateConfig> {
        let defaults = config::Config::try_from(&AttrgateConfig::default())
            .context("Failed to serialize built-in defaults")?;

        let builder = self.config_files().into_iter().fold(
            config::Config::builder().add_source(defaults),
            |builder, path| {
                debug!(path = %path.display(), "Merging settings file");
                builder.add_source(config::File::from(path).format(config::FileFormat::Toml))
            },
        );

        let merged = builder
            .add_source(
                config::Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to merge settings sources")?;

        let mut settings: AttrgateConfig = merged
            .try_deserialize()
            .context("Settings do not match the expected layout")?;

        settings.resolve_paths(&self.project_dir);
        settings.validate().context("Invalid settings")?;

        Ok(settings)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> AttrgateConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

//! TOML Configuration Management
//!
//! Handles reading and validating `scan-cascade.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::config::ScanConfig;
use crate::utils::error::{AppError, AppResult};

/// Configuration service for a scan run
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    config: ScanConfig,
}

impl ConfigService {
    /// Load the config at `path`, falling back to defaults when it does not exist
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let config_path = path.as_ref().to_path_buf();
        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            tracing::info!(
                path = %config_path.display(),
                "no configuration file found, using defaults"
            );
            ScanConfig::default()
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> AppResult<ScanConfig> {
        let content = fs::read_to_string(path)?;
        let config: ScanConfig = toml::from_str(&content)?;
        config.validate().map_err(AppError::validation)?;
        Ok(config)
    }

    /// Get the current configuration
    pub fn get_config(&self) -> &ScanConfig {
        &self.config
    }

    /// Get a clone of the current configuration
    pub fn get_config_clone(&self) -> ScanConfig {
        self.config.clone()
    }

    /// Path the configuration was loaded from
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

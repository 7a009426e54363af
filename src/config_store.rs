//! File-backed controller configuration for the host.
//!
//! The controller only ever sees a validated [`ControllerConfig`]; reading,
//! writing and locating the JSON file happens here.

use adaptive_quality::{ConfigError, ControllerConfig};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Configuration manager with file I/O.
pub struct ConfigManager {
    config: RwLock<ControllerConfig>,
    path: PathBuf,
}

impl ConfigManager {
    /// Load configuration from file or use defaults.
    /// If the file doesn't exist, returns a manager with default config.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            Self::read(path)?
        } else {
            ControllerConfig::default()
        };

        Ok(Self {
            config: RwLock::new(config),
            path: path.to_path_buf(),
        })
    }

    /// Load configuration from a file that must exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        Ok(Self {
            config: RwLock::new(Self::read(path)?),
            path: path.to_path_buf(),
        })
    }

    fn read(path: &Path) -> Result<ControllerConfig, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::ParseError(format!("Failed to read config file: {}", e)))?;

        let config: ControllerConfig = serde_json::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("Invalid JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file using atomic write.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config = self.get();

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Atomic write: write to temp file, then rename
        let temp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&config)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize config: {}", e)))?;

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    /// Get current configuration.
    pub fn get(&self) -> ControllerConfig {
        self.config
            .read()
            .map(|c| c.clone())
            .unwrap_or_else(|_| ControllerConfig::default())
    }

    /// Replace the configuration after validating it, then persist.
    pub fn update(&self, config: ControllerConfig) -> Result<(), ConfigError> {
        config.validate()?;

        let mut current = self.config.write().map_err(|_| {
            ConfigError::ValidationError("Failed to acquire write lock".to_string())
        })?;
        *current = config;
        drop(current);

        self.save()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Default location: `<user config dir>/adaptive-quality/config.json`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("adaptive-quality")
            .join("config.json")
    }
}

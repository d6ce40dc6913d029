//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::runtime::RuntimeConfig;
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the runtime configuration file searched for in the directory tree.
pub const CONFIG_FILE_NAME: &str = "arcadia.toml";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Built-in defaults - lowest priority
/// 2. Runtime config (./arcadia.toml) - overrides defaults
/// 3. Environment variables (ARCADIA_*) - highest priority
#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find arcadia.toml; falls back to the
    /// built-in defaults when no file is found.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<RuntimeConfig> {
        let config = match self.find_config_file(start_dir) {
            Some(path) => RuntimeConfig::load_from_file(&path)?,
            None => RuntimeConfig::default(),
        };
        self.apply_env_overrides(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<RuntimeConfig> {
        let config = RuntimeConfig::load_from_file(config_path)?;
        self.apply_env_overrides(config)
    }

    /// Find the configuration file by walking up the directory tree
    fn find_config_file(&self, start_dir: &Path) -> Option<PathBuf> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Some(config_path);
            }
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return None,
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Environment variables follow the pattern: ARCADIA_<KEY>
    /// Example: ARCADIA_REGISTERS_PER_THREAD=512
    fn apply_env_overrides(&self, mut config: RuntimeConfig) -> ConfigResult<RuntimeConfig> {
        if let Ok(value) = env::var("ARCADIA_REGISTERS_PER_THREAD") {
            config.registers_per_thread = parse_env_usize("ARCADIA_REGISTERS_PER_THREAD", &value)?;
        }
        if let Ok(value) = env::var("ARCADIA_MAX_CALL_DEPTH") {
            config.max_call_depth = parse_env_usize("ARCADIA_MAX_CALL_DEPTH", &value)?;
        }
        if let Ok(value) = env::var("ARCADIA_VALIDATE_BYTECODE") {
            config.validate_bytecode = parse_env_bool("ARCADIA_VALIDATE_BYTECODE", &value)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_env_usize(field: &str, value: &str) -> ConfigResult<usize> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: format!("expected an unsigned integer, got '{value}'"),
    })
}

fn parse_env_bool(field: &str, value: &str) -> ConfigResult<bool> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected 'true' or 'false', got '{value}'"),
        }),
    }
}

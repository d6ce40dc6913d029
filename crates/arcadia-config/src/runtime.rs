//! Runtime Configuration (arcadia.toml)
//!
//! Tunables for the interpreter: register-file size, call-depth cap, and
//! whether procedure bodies are validated before registration.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of registers in a thread's register file.
pub const DEFAULT_REGISTERS_PER_THREAD: usize = 256;

/// Default maximum call-state stack depth.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;

/// Runtime configuration from arcadia.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct RuntimeConfig {
    /// Number of registers per interpreter thread
    pub registers_per_thread: usize,

    /// Maximum call-state stack depth before growth is refused
    pub max_call_depth: usize,

    /// Validate procedure bodies when they are registered
    pub validate_bytecode: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            registers_per_thread: DEFAULT_REGISTERS_PER_THREAD,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            validate_bytecode: true,
        }
    }
}

impl RuntimeConfig {
    /// Load runtime configuration from a TOML file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: RuntimeConfig =
            toml::from_str(&contents).map_err(|error| ConfigError::TomlParseError {
                file: path.to_path_buf(),
                error,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Check field constraints that TOML deserialization cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.registers_per_thread == 0 {
            return Err(ConfigError::InvalidValue {
                field: "registers_per_thread".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_call_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_call_depth".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.registers_per_thread, 256);
        assert_eq!(config.max_call_depth, 1024);
        assert!(config.validate_bytecode);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: RuntimeConfig = toml::from_str("registers_per_thread = 64").unwrap();
        assert_eq!(config.registers_per_thread, 64);
        assert_eq!(config.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<RuntimeConfig, _> = toml::from_str("register_count = 64");
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_registers_invalid() {
        let config = RuntimeConfig {
            registers_per_thread: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

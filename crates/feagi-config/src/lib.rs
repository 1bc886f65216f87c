// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # FEAGI NPU Stream Configuration
//!
//! Type-safe configuration loader for the event buffers and recording
//! channels, with support for:
//! - TOML file parsing
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! ## Usage
//!
//! ```rust,no_run
//! use feagi_config::{load_config, StreamConfig};
//!
//! // Load configuration with automatic file discovery and overrides
//! let config = load_config(None, None).expect("Failed to load config");
//!
//! println!("Spike buffer capacity: {}", config.buffers.spike_capacity);
//! println!("Return tag: {}", config.recording.return_tag_id);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{
    apply_cli_overrides, apply_environment_overrides, find_config_file, load_config,
    load_config_or_default,
};

pub use types::*;
pub use validation::{
    collect_errors, validate_config, ConfigValidationError, MAX_CHANNEL_BYTES,
    RECORDING_REGION_STRIDE,
};

/// Re-export for convenience
pub use serde;

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found. Searched: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    ParseError(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_types_compile() {
        let _config = StreamConfig::default();
    }

    #[test]
    fn test_parse_error_message() {
        let err: ConfigError = toml::from_str::<StreamConfig>("buffers = 3")
            .unwrap_err()
            .into();
        assert!(err.to_string().starts_with("Invalid TOML syntax"));
    }
}

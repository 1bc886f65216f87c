// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{validate_config, ConfigError, ConfigResult, StreamConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "feagi_npu_stream.toml";

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "FEAGI_NPU_STREAM_CONFIG";

/// Find the configuration file
///
/// Search order:
/// 1. `FEAGI_NPU_STREAM_CONFIG` environment variable
/// 2. Current working directory: `./feagi_npu_stream.toml`
/// 3. Parent directories (searches up to 5 levels)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        } else {
            return Err(ConfigError::FileNotFound(format!(
                "Config file specified by {} not found: {}",
                CONFIG_PATH_ENV,
                path.display()
            )));
        }
    }

    let mut search_paths = Vec::new();

    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "Configuration file '{}' not found in any of these locations:\n{}\n\nSet {} environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list, CONFIG_PATH_ENV
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Returns
///
/// Validated `StreamConfig` with all overrides applied
///
/// # Errors
///
/// Returns error if config file is not found, contains invalid TOML, or fails validation
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<StreamConfig> {
    let config_file = if let Some(path) = config_path {
        path.to_path_buf()
    } else {
        find_config_file()?
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: StreamConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    validate_config(&config)?;
    Ok(config)
}

/// Load the configuration file if one exists, otherwise start from defaults
///
/// Overrides and validation apply either way.
pub fn load_config_or_default(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<StreamConfig> {
    match load_config(config_path, cli_args) {
        Err(ConfigError::FileNotFound(_)) if config_path.is_none() => {
            let mut config = StreamConfig::default();
            apply_environment_overrides(&mut config);
            if let Some(cli) = cli_args {
                apply_cli_overrides(&mut config, cli);
            }
            validate_config(&config)?;
            Ok(config)
        }
        other => other,
    }
}

fn parse_into<T: FromStr>(value: &str, target: &mut T) {
    if let Ok(parsed) = value.parse::<T>() {
        *target = parsed;
    }
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `FEAGI_SPIKE_BUFFER_CAPACITY` -> `buffers.spike_capacity`
/// - `FEAGI_GP_BUFFER_CAPACITY` -> `buffers.gradient_potential_capacity`
/// - `FEAGI_RETURN_TAG_ID` -> `recording.return_tag_id`
/// - `FEAGI_MAX_RESEND_ATTEMPTS` -> `recording.max_resend_attempts`
/// - `FEAGI_LOG_LEVEL` -> `logging.level`
///
/// Unparseable numeric values are ignored.
pub fn apply_environment_overrides(config: &mut StreamConfig) {
    if let Ok(value) = env::var("FEAGI_SPIKE_BUFFER_CAPACITY") {
        parse_into(&value, &mut config.buffers.spike_capacity);
    }
    if let Ok(value) = env::var("FEAGI_GP_BUFFER_CAPACITY") {
        parse_into(&value, &mut config.buffers.gradient_potential_capacity);
    }
    if let Ok(value) = env::var("FEAGI_RETURN_TAG_ID") {
        parse_into(&value, &mut config.recording.return_tag_id);
    }
    if let Ok(value) = env::var("FEAGI_MAX_RESEND_ATTEMPTS") {
        parse_into(&value, &mut config.recording.max_resend_attempts);
    }
    if let Ok(value) = env::var("FEAGI_LOG_LEVEL") {
        config.logging.level = value;
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"spike_capacity": "512", "core_id": "3"}`)
pub fn apply_cli_overrides(config: &mut StreamConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("spike_capacity") {
        parse_into(value, &mut config.buffers.spike_capacity);
    }
    if let Some(value) = cli_args.get("gradient_potential_capacity") {
        parse_into(value, &mut config.buffers.gradient_potential_capacity);
    }
    if let Some(value) = cli_args.get("return_tag_id") {
        parse_into(value, &mut config.recording.return_tag_id);
    }
    if let Some(value) = cli_args.get("max_resend_attempts") {
        parse_into(value, &mut config.recording.max_resend_attempts);
    }
    if let Some(value) = cli_args.get("spikes_bytes") {
        parse_into(value, &mut config.recording.channels.spikes_bytes);
    }
    if let Some(value) = cli_args.get("potentials_bytes") {
        parse_into(value, &mut config.recording.channels.potentials_bytes);
    }
    if let Some(value) = cli_args.get("gsyn_bytes") {
        parse_into(value, &mut config.recording.channels.gsyn_bytes);
    }
    if let Some(value) = cli_args.get("chip_id") {
        parse_into(value, &mut config.core.chip_id);
    }
    if let Some(value) = cli_args.get("core_id") {
        parse_into(value, &mut config.core.core_id);
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
}

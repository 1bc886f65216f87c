// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! This module provides validation logic to ensure configuration values are
//! within the ranges the buffers, the recording region layout and the packet
//! header fields can represent.

use crate::{ConfigError, ConfigResult, StreamConfig};

/// Smallest ring buffer capacity (one slot always stays empty)
pub const MIN_BUFFER_CAPACITY: usize = 2;

/// Core ids occupy the low 5 bits of the SDP source port
pub const MAX_CORE_ID: u8 = 31;

/// Address spacing between recording regions
pub const RECORDING_REGION_STRIDE: u32 = 0x0100_0000;

/// Largest channel data area: a region's header word plus data must fit its stride
pub const MAX_CHANNEL_BYTES: usize = RECORDING_REGION_STRIDE as usize - 4;

/// Level names accepted by `[logging] level`
pub const KNOWN_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    CapacityTooSmall { field: String, capacity: usize },
    CoreIdOutOfRange { core_id: u8 },
    UnalignedChannelSize { field: String, size: usize },
    ChannelTooLarge { field: String, size: usize },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapacityTooSmall { field, capacity } => {
                write!(
                    f,
                    "{} = {} is below the minimum capacity of {}",
                    field, capacity, MIN_BUFFER_CAPACITY
                )
            }
            Self::CoreIdOutOfRange { core_id } => {
                write!(f, "core.core_id = {} is outside valid range (0-{})", core_id, MAX_CORE_ID)
            }
            Self::UnalignedChannelSize { field, size } => {
                write!(f, "{} = {} is not a multiple of 4", field, size)
            }
            Self::ChannelTooLarge { field, size } => {
                write!(
                    f,
                    "{} = {} exceeds the region limit of {} bytes",
                    field, size, MAX_CHANNEL_BYTES
                )
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Buffer capacities of at least [`MIN_BUFFER_CAPACITY`]
/// - Core id that fits the SDP source port field
/// - Word-aligned recording channel sizes that fit one region stride
/// - Valid protocol and logging values
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &StreamConfig) -> ConfigResult<()> {
    let errors = collect_errors(config);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

/// Every validation problem in `config`, in section order
pub fn collect_errors(config: &StreamConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_buffers(config, &mut errors);
    validate_core(config, &mut errors);
    validate_recording(config, &mut errors);
    validate_logging(config, &mut errors);
    errors
}

fn validate_buffers(config: &StreamConfig, errors: &mut Vec<ConfigValidationError>) {
    let capacities = [
        ("buffers.spike_capacity", config.buffers.spike_capacity),
        (
            "buffers.gradient_potential_capacity",
            config.buffers.gradient_potential_capacity,
        ),
    ];
    for (field, capacity) in capacities {
        if capacity < MIN_BUFFER_CAPACITY {
            errors.push(ConfigValidationError::CapacityTooSmall {
                field: field.to_string(),
                capacity,
            });
        }
    }
}

fn validate_core(config: &StreamConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.core.core_id > MAX_CORE_ID {
        errors.push(ConfigValidationError::CoreIdOutOfRange {
            core_id: config.core.core_id,
        });
    }
}

fn validate_recording(config: &StreamConfig, errors: &mut Vec<ConfigValidationError>) {
    for (name, size) in config.recording.channels.all_sizes() {
        let field = format!("recording.channels.{}", name);
        if size % 4 != 0 {
            errors.push(ConfigValidationError::UnalignedChannelSize {
                field: field.clone(),
                size,
            });
        }
        if size > MAX_CHANNEL_BYTES {
            errors.push(ConfigValidationError::ChannelTooLarge { field, size });
        }
    }

    if config.recording.max_resend_attempts == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "recording.max_resend_attempts".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
}

fn validate_logging(config: &StreamConfig, errors: &mut Vec<ConfigValidationError>) {
    let level = config.logging.level.to_lowercase();
    if !KNOWN_LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("must be one of {}", KNOWN_LOG_LEVELS.join(", ")),
        });
    }
}

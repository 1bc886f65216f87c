// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `feagi_npu_stream.toml`.

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    pub buffers: BuffersConfig,
    pub recording: RecordingConfig,
    pub core: CoreConfig,
    pub logging: LoggingConfig,
}

/// Event buffer sizing
///
/// Capacities are slot counts; one slot always stays empty, so a buffer of
/// capacity `n` holds at most `n - 1` events.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BuffersConfig {
    pub spike_capacity: usize,
    pub gradient_potential_capacity: usize,
}

impl Default for BuffersConfig {
    fn default() -> Self {
        Self {
            spike_capacity: 256,
            gradient_potential_capacity: 256,
        }
    }
}

/// Recording channels and host read-back
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// IP tag read requests are addressed to
    pub return_tag_id: u8,
    /// Consecutive sequence mismatches answered with a resend before a channel stalls
    pub max_resend_attempts: u16,
    pub channels: ChannelSizesConfig,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            return_tag_id: 0,
            max_resend_attempts: 16,
            channels: ChannelSizesConfig::default(),
        }
    }
}

/// Data area size per recording channel in bytes (0 = disabled)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelSizesConfig {
    pub spikes_bytes: usize,
    pub potentials_bytes: usize,
    pub gsyn_bytes: usize,
}

impl Default for ChannelSizesConfig {
    fn default() -> Self {
        Self {
            spikes_bytes: 4096,
            potentials_bytes: 0,
            gsyn_bytes: 0,
        }
    }
}

impl ChannelSizesConfig {
    /// `(name, size)` for every channel, in channel order
    pub fn all_sizes(&self) -> [(&'static str, usize); 3] {
        [
            ("spikes_bytes", self.spikes_bytes),
            ("potentials_bytes", self.potentials_bytes),
            ("gsyn_bytes", self.gsyn_bytes),
        ]
    }
}

/// Identity of the simulated core
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Chip coordinates packed as `(x << 8) | y`
    pub chip_id: u16,
    /// Processor number on the chip (0..32)
    pub core_id: u8,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Building buffers and recording channels from a loaded configuration

use feagi_config::StreamConfig;
pub use feagi_config::{MAX_CHANNEL_BYTES, RECORDING_REGION_STRIDE};
use feagi_npu_event_buffer::{BufferError, GradientPotentialBuffer, SpikeBuffer};
use feagi_npu_recording::{PullSettings, RecordingChannelId, StaticIdentity, HEADER_BYTES};

/// Device address of the first recording region
pub const RECORDING_BASE_ADDRESS: u32 = 0x6000_0000;

/// Where one recording channel lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPlan {
    /// Channel the region belongs to
    pub channel: RecordingChannelId,
    /// Region number carried in the packet low nibble
    pub region_id: u8,
    /// Device address of the header word
    pub base_address: u32,
    /// Data area size in bytes
    pub size_bytes: usize,
}

impl ChannelPlan {
    /// Bytes of memory the region needs (header word + data)
    pub fn region_bytes(&self) -> usize {
        HEADER_BYTES + self.size_bytes
    }
}

/// Protocol parameters from the `[recording]` section
pub fn pull_settings(config: &StreamConfig) -> PullSettings {
    PullSettings {
        return_tag_id: config.recording.return_tag_id,
        max_resend_attempts: config.recording.max_resend_attempts,
    }
}

/// Core identity from the `[core]` section
pub fn core_identity(config: &StreamConfig) -> StaticIdentity {
    StaticIdentity {
        chip_id: config.core.chip_id,
        core_id: config.core.core_id,
    }
}

/// Spike buffer sized from `[buffers] spike_capacity`
pub fn spike_buffer(config: &StreamConfig) -> Result<SpikeBuffer, BufferError> {
    SpikeBuffer::initialize(config.buffers.spike_capacity)
}

/// Gradient potential buffer sized from `[buffers] gradient_potential_capacity`
pub fn gradient_potential_buffer(
    config: &StreamConfig,
) -> Result<GradientPotentialBuffer, BufferError> {
    GradientPotentialBuffer::initialize(config.buffers.gradient_potential_capacity)
}

/// Region layout for every enabled channel, in channel order
///
/// Region ids follow channel numbers; channels with size 0 are left out.
/// Regions do not overlap for any configuration that passes validation,
/// which caps each size at [`MAX_CHANNEL_BYTES`].
pub fn channel_plan(config: &StreamConfig) -> Vec<ChannelPlan> {
    let sizes = &config.recording.channels;
    RecordingChannelId::ALL
        .into_iter()
        .zip([sizes.spikes_bytes, sizes.potentials_bytes, sizes.gsyn_bytes])
        .filter(|(_, size_bytes)| *size_bytes > 0)
        .map(|(channel, size_bytes)| ChannelPlan {
            channel,
            region_id: channel as u8,
            base_address: RECORDING_BASE_ADDRESS + RECORDING_REGION_STRIDE * channel as u32,
            size_bytes,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan_records_spikes_only() {
        let plan = channel_plan(&StreamConfig::default());
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].channel, RecordingChannelId::Spikes);
        assert_eq!(plan[0].base_address, RECORDING_BASE_ADDRESS);
        assert_eq!(plan[0].region_bytes(), 4 + 4096);
    }

    #[test]
    fn test_plan_addresses_follow_channel_numbers() {
        let mut config = StreamConfig::default();
        config.recording.channels.gsyn_bytes = 64;
        let plan = channel_plan(&config);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].channel, RecordingChannelId::Gsyn);
        assert_eq!(plan[1].region_id, 2);
        assert_eq!(plan[1].base_address, 0x6200_0000);
    }

    #[test]
    fn test_largest_valid_regions_do_not_overlap() {
        let mut config = StreamConfig::default();
        config.recording.channels.spikes_bytes = MAX_CHANNEL_BYTES;
        config.recording.channels.potentials_bytes = MAX_CHANNEL_BYTES;
        config.recording.channels.gsyn_bytes = MAX_CHANNEL_BYTES;
        assert!(feagi_config::validate_config(&config).is_ok());

        let plan = channel_plan(&config);
        for pair in plan.windows(2) {
            let end = pair[0].base_address as u64 + pair[0].region_bytes() as u64;
            assert!(end <= pair[1].base_address as u64);
        }

        config.recording.channels.spikes_bytes = MAX_CHANNEL_BYTES + 4;
        assert!(feagi_config::validate_config(&config).is_err());
    }

    #[test]
    fn test_buffers_use_configured_capacity() {
        let mut config = StreamConfig::default();
        config.buffers.spike_capacity = 8;
        assert_eq!(spike_buffer(&config).unwrap().capacity(), 8);

        config.buffers.gradient_potential_capacity = 1;
        assert!(gradient_potential_buffer(&config).is_err());
    }
}

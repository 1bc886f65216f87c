// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for recording operations

use core::fmt;

use crate::channel::RecordingChannelId;

/// Recording errors
///
/// Every variant is reported at the call site; none is retried internally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingError {
    /// Channel was configured before; configuration happens once per run
    AlreadyConfigured {
        /// Channel concerned
        channel: RecordingChannelId,
    },

    /// Record does not fit in what is left of the channel region
    OutOfSpace {
        /// Channel concerned
        channel: RecordingChannelId,
        /// Bytes the caller tried to record
        requested: usize,
        /// Bytes left before the end of the region
        remaining: usize,
    },

    /// Channel was never configured (or configured with size 0)
    ChannelNotInUse {
        /// Channel concerned
        channel: RecordingChannelId,
    },

    /// Supplied memory cannot hold the header word plus the requested size
    RegionTooSmall {
        /// Bytes needed (header + data)
        required: usize,
        /// Bytes supplied
        available: usize,
    },

    /// Region would extend past the 32-bit address space
    AddressOverflow {
        /// Address of the header word
        base_address: u32,
        /// Requested data size
        size_bytes: usize,
    },

    /// Channel number outside the known channels
    InvalidChannel(u8),

    /// Transport refused the read-request packet
    SendFailed {
        /// Channel concerned
        channel: RecordingChannelId,
    },
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::AlreadyConfigured { channel } => {
                write!(f, "Recording channel {} already configured", channel)
            }
            RecordingError::OutOfSpace {
                channel,
                requested,
                remaining,
            } => write!(
                f,
                "Recording channel {} out of space: requested {} bytes, {} remaining",
                channel, requested, remaining
            ),
            RecordingError::ChannelNotInUse { channel } => {
                write!(f, "Recording channel {} not in use", channel)
            }
            RecordingError::RegionTooSmall {
                required,
                available,
            } => write!(
                f,
                "Recording region too small: required {} bytes, available {}",
                required, available
            ),
            RecordingError::AddressOverflow {
                base_address,
                size_bytes,
            } => write!(
                f,
                "Recording region at {:08x} with {} bytes exceeds the address space",
                base_address, size_bytes
            ),
            RecordingError::InvalidChannel(raw) => write!(f, "Invalid recording channel {}", raw),
            RecordingError::SendFailed { channel } => {
                write!(f, "Failed to send read request for channel {}", channel)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RecordingError {}

/// Result type for recording operations
pub type Result<T> = core::result::Result<T, RecordingError>;

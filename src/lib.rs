// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # FEAGI NPU Stream
//!
//! Event traffic in and recorded output out of a neuromorphic core.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! feagi-npu-stream = "0.0.1-beta.18"  # Default: std
//! ```
//!
//! ## Feature Flags
//!
//! - **`std`** (default): config loading, logging setup, host-side reader and
//!   the `simulate_core` tool
//! - **`file-logging`**: JSON log files per run
//!
//! Without `std` only the buffers and the recording channels are built; both
//! need nothing beyond `alloc`.
//!
//! ## Architecture
//!
//! ```text
//! packet interrupt           step loop                     host
//! ┌──────────────┐  push  ┌─────────────┐  record  ┌──────────────────┐
//! │ Producer     │ ─────► │ Consumer    │ ───────► │ RecordingChannel │
//! └──────────────┘        └─────────────┘          └────────┬─────────┘
//!       event_buffer::RingBuffer              read request  │ ▲ host data read
//!                                                           ▼ │
//!                                                   HostTransport (SDP)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use feagi_npu_stream::prelude::*;
//!
//! let mut spikes = SpikeBuffer::initialize(16).unwrap();
//! let mut sdram = vec![0u8; HEADER_BYTES + 64];
//! let mut channels = RecordingChannels::new(&StaticIdentity::default(), PullSettings::default());
//! channels
//!     .configure(
//!         RecordingChannelId::Spikes,
//!         RecordingRegion { region_id: 0, base_address: 0x6000_0000, memory: &mut sdram },
//!         64,
//!     )
//!     .unwrap();
//!
//! spikes.push(Spike::new(7));
//! while !spikes.is_empty() {
//!     if let Some(spike) = spikes.pop() {
//!         channels.record(RecordingChannelId::Spikes, &spike.key().to_le_bytes()).unwrap();
//!     }
//! }
//! channels.finalise();
//! assert_eq!(spikes.underflow_count(), 0);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export components
pub use feagi_npu_event_buffer as event_buffer;
pub use feagi_npu_recording as recording;

#[cfg(feature = "std")]
pub use feagi_config as config;

#[cfg(feature = "std")]
pub use feagi_observability as observability;

#[cfg(feature = "std")]
pub mod setup;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::event_buffer::{
        Accum, Consumer, EventRecord, GradientPotential, GradientPotentialBuffer, Producer,
        RingBuffer, Spike, SpikeBuffer,
    };
    pub use crate::recording::{
        ChannelStatus, CoreIdentity, HostDataRead, HostTransport, PacketOutcome, PullSettings,
        RecordingChannelId, RecordingChannels, RecordingRegion, SdpMessage, StaticIdentity,
        HEADER_BYTES,
    };

    #[cfg(feature = "std")]
    pub use crate::recording::{HostReader, HostResponse};

    #[cfg(feature = "std")]
    pub use crate::config::StreamConfig;
}

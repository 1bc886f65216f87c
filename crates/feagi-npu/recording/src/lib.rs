// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! # FEAGI NPU Recording
//!
//! Streams simulation output from a neural core to the host.
//!
//! - **Channels**: one linear memory region per output stream (spikes,
//!   potentials, gsyn). The simulation loop appends with
//!   [`RecordingChannels::record`]; [`RecordingChannels::finalise`] writes the
//!   byte count into the header word in front of each region.
//! - **Host pull protocol**: the core asks the host to drain a channel
//!   ([`RecordingChannels::request_read`]); the host answers with a
//!   sequence-numbered "host data read" packet
//!   ([`RecordingChannels::handle_packet`]) and only then does the read cursor
//!   move.
//! - **Collaborators**: [`HostTransport`] sends packets, [`CoreIdentity`]
//!   supplies chip and core ids. Both are implemented by the platform layer.
//!
//! ## Memory layout
//!
//! ```text
//! base_address
//! │
//! ▼
//! ┌────────────┬──────────────────────────────────────────┐
//! │ byte count │ recorded data ...                        │
//! │  (u32 LE)  │                                          │
//! └────────────┴──────────────────────────────────────────┘
//!              ▲ start                                    ▲ end
//! ```
//!
//! The byte count is only valid after `finalise`.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod channel;
pub mod error;
pub mod manager;
pub mod packet;
pub mod protocol;
pub mod transport;

#[cfg(feature = "std")]
pub mod host;

pub use channel::{BufferOperation, RecordingChannel, RecordingChannelId, RecordingRegion, HEADER_BYTES};
pub use error::{RecordingError, Result};
pub use manager::RecordingChannels;
pub use packet::{HostDataRead, ReadRequest, SdpHeader, SdpMessage};
pub use protocol::{ChannelStatus, IgnoreReason, PacketOutcome, PullSettings, PullState};
pub use transport::{CoreIdentity, HostTransport, StaticIdentity};

#[cfg(feature = "std")]
pub use host::{DeviceMemory, HostReader, HostResponse};

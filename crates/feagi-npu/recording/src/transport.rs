// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Collaborator traits implemented by the platform layer
//!
//! The recording subsystem never touches the packet hardware or the core
//! registers itself. The platform supplies:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ RecordingChannels                            │
//! └───────────┬──────────────────────┬───────────┘
//!             │ send_to_host()       │ chip_id() / core_id()
//! ┌───────────▼───────────┐ ┌────────▼───────────┐
//! │ HostTransport         │ │ CoreIdentity       │
//! │ (SDP / UDP / USB ...) │ │ (registers, config)│
//! └───────────────────────┘ └────────────────────┘
//! ```
//!
//! Inbound packets flow the other way: the platform's receive callback hands
//! the EIEIO payload to [`RecordingChannels::handle_packet`](crate::RecordingChannels::handle_packet).
//! Transports are assumed byte-reliable; no checksum is verified here.

use core::fmt;

use crate::packet::SdpMessage;

/// Outbound packet path to the host
///
/// Implementations do NOT need to be `Send` or `Sync`; a core runs a single
/// thread of control.
pub trait HostTransport {
    /// Platform-specific error type
    type Error: fmt::Debug;

    /// Send one SDP message to the host
    ///
    /// Must not block; a full transmit queue is an error.
    fn send_to_host(&mut self, message: &SdpMessage) -> Result<(), Self::Error>;
}

impl<T: HostTransport + ?Sized> HostTransport for &mut T {
    type Error = T::Error;

    fn send_to_host(&mut self, message: &SdpMessage) -> Result<(), Self::Error> {
        (**self).send_to_host(message)
    }
}

/// Hardware identity of the local core
pub trait CoreIdentity {
    /// Chip coordinates packed as `(x << 8) | y`
    fn chip_id(&self) -> u16;

    /// Processor number on the chip (0..32)
    fn core_id(&self) -> u8;
}

/// Identity taken from configuration rather than hardware registers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticIdentity {
    /// Chip coordinates packed as `(x << 8) | y`
    pub chip_id: u16,
    /// Processor number on the chip
    pub core_id: u8,
}

impl StaticIdentity {
    /// Identity from chip coordinates and a core number
    pub const fn from_coordinates(x: u8, y: u8, core_id: u8) -> Self {
        Self {
            chip_id: ((x as u16) << 8) | y as u16,
            core_id,
        }
    }
}

impl CoreIdentity for StaticIdentity {
    fn chip_id(&self) -> u16 {
        self.chip_id
    }

    fn core_id(&self) -> u8 {
        self.core_id
    }
}

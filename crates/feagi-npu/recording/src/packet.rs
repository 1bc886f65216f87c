// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Wire formats for the host read-back exchange
//!
//! All multi-byte fields are little-endian on the wire.
//!
//! ## Outbound: read request (core → host)
//!
//! ```text
//! SDP header (8 bytes)
//! ┌───────┬─────┬───────────┬───────────┬───────────┬───────────┐
//! │ flags │ tag │ dest_port │ srce_port │ dest_addr │ srce_addr │
//! │  u8   │ u8  │    u8     │    u8     │    u16    │    u16    │
//! └───────┴─────┴───────────┴───────────┴───────────┴───────────┘
//! EIEIO command body (16 bytes)
//! ┌─────────┬─────────┬───────────┬─────┬─────────────┬──────────┬───────────────┬──────────────────┐
//! │ command │ chip_id │ processor │ pad │ chan/region │ sequence │ start_address │ space_to_be_read │
//! │   u16   │   u16   │    u8     │ u8  │     u8      │    u8    │      u32      │       u32        │
//! └─────────┴─────────┴───────────┴─────┴─────────────┴──────────┴───────────────┴──────────────────┘
//! ```
//!
//! ## Inbound: host data read (host → core)
//!
//! | field | width | meaning |
//! |---|---|---|
//! | command | 16 bits | `0x4009` |
//! | channel/region | 8 bits | high nibble channel, low nibble region |
//! | sequence | 8 bits | echo of the expected sequence number |
//! | space_read | 32 bits | bytes consumed by the host |

use bytemuck::{Pod, Zeroable};

/// Bit marking an EIEIO packet as a command
pub const EIEIO_COMMAND_FLAG: u16 = 1 << 14;

/// "SpiNNaker request buffers" command id
pub const SPINNAKER_REQUEST_BUFFERS: u16 = 6;

/// "Host data read" command id
pub const HOST_DATA_READ: u16 = 9;

/// Full command header of an inbound host-data-read packet
pub const HOST_DATA_READ_COMMAND: u16 = EIEIO_COMMAND_FLAG | HOST_DATA_READ;

/// Full command header of an outbound read request
pub const REQUEST_BUFFERS_COMMAND: u16 = EIEIO_COMMAND_FLAG | SPINNAKER_REQUEST_BUFFERS;

/// SDP flags: reply not expected
pub const SDP_FLAGS_NO_REPLY: u8 = 0x07;

/// SDP destination port used for IP-tag delivery to the host
pub const SDP_PORT_HOST: u8 = 0xFF;

/// SDP source port base (the core id occupies the low 5 bits)
pub const SDP_PORT_RECORDING: u8 = 1 << 5;

/// Pack a channel number and region id into one byte
#[inline]
pub const fn pack_channel_and_region(channel: u8, region_id: u8) -> u8 {
    ((channel & 0x0F) << 4) | (region_id & 0x0F)
}

/// Split a channel/region byte into `(channel, region_id)`
#[inline]
pub const fn unpack_channel_and_region(byte: u8) -> (u8, u8) {
    ((byte >> 4) & 0x0F, byte & 0x0F)
}

/// SDP routing header
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SdpHeader {
    /// Reply / checksum flags
    pub flags: u8,
    /// IP tag the message is delivered through
    pub tag: u8,
    /// Destination port (high 3 bits) and CPU (low 5 bits)
    pub dest_port: u8,
    /// Source port (high 3 bits) and CPU (low 5 bits)
    pub srce_port: u8,
    /// Destination chip
    pub dest_addr: u16,
    /// Source chip
    pub srce_addr: u16,
}

impl SdpHeader {
    /// Encoded size in bytes
    pub const SIZE: usize = 8;

    fn to_le(self) -> Self {
        Self {
            dest_addr: self.dest_addr.to_le(),
            srce_addr: self.srce_addr.to_le(),
            ..self
        }
    }

    /// Encode to wire bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        bytemuck::cast(self.to_le())
    }

    /// Decode from wire bytes; `None` if too short
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let raw: Self = bytemuck::try_pod_read_unaligned(bytes.get(..Self::SIZE)?).ok()?;
        Some(Self {
            dest_addr: u16::from_le(raw.dest_addr),
            srce_addr: u16::from_le(raw.srce_addr),
            ..raw
        })
    }
}

/// "Request buffers" body asking the host to read a span of a channel
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ReadRequest {
    /// Always [`REQUEST_BUFFERS_COMMAND`]
    pub command: u16,
    /// Chip the data lives on
    pub chip_id: u16,
    /// Core id shifted left by 3
    pub processor: u8,
    /// Padding
    pub pad1: u8,
    /// High nibble channel, low nibble region
    pub channel_and_region: u8,
    /// Sequence number the host must echo
    pub sequence: u8,
    /// Absolute address of the first unread byte
    pub start_address: u32,
    /// Number of bytes ready to be read
    pub space_to_be_read: u32,
}

impl ReadRequest {
    /// Encoded size in bytes
    pub const SIZE: usize = 16;

    /// Channel number carried in the request
    pub fn channel(&self) -> u8 {
        unpack_channel_and_region(self.channel_and_region).0
    }

    /// Region id carried in the request
    pub fn region_id(&self) -> u8 {
        unpack_channel_and_region(self.channel_and_region).1
    }

    /// Encode to wire bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let wire = Self {
            command: self.command.to_le(),
            chip_id: self.chip_id.to_le(),
            start_address: self.start_address.to_le(),
            space_to_be_read: self.space_to_be_read.to_le(),
            ..*self
        };
        bytemuck::cast(wire)
    }

    /// Decode from wire bytes; `None` if too short
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let raw: Self = bytemuck::try_pod_read_unaligned(bytes.get(..Self::SIZE)?).ok()?;
        Some(Self {
            command: u16::from_le(raw.command),
            chip_id: u16::from_le(raw.chip_id),
            start_address: u32::from_le(raw.start_address),
            space_to_be_read: u32::from_le(raw.space_to_be_read),
            ..raw
        })
    }
}

/// Complete outbound message: SDP header + read request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SdpMessage {
    /// Routing header
    pub header: SdpHeader,
    /// EIEIO command body
    pub request: ReadRequest,
}

impl SdpMessage {
    /// Encoded size in bytes
    pub const SIZE: usize = SdpHeader::SIZE + ReadRequest::SIZE;

    /// Value of the SDP `length` field (header + body)
    pub const fn length(&self) -> u16 {
        Self::SIZE as u16
    }

    /// Encode to wire bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[..SdpHeader::SIZE].copy_from_slice(&self.header.to_bytes());
        bytes[SdpHeader::SIZE..].copy_from_slice(&self.request.to_bytes());
        bytes
    }

    /// Decode from wire bytes; `None` if too short
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            header: SdpHeader::from_bytes(bytes)?,
            request: ReadRequest::from_bytes(bytes.get(SdpHeader::SIZE..)?)?,
        })
    }
}

/// Inbound acknowledgement: the host has consumed `space_read` bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct HostDataRead {
    /// [`HOST_DATA_READ_COMMAND`] for packets this layer acts on
    pub command: u16,
    /// High nibble channel, low nibble region
    pub channel_and_region: u8,
    /// Host's echo of the expected sequence number
    pub sequence: u8,
    /// Bytes the host consumed
    pub space_read: u32,
}

impl HostDataRead {
    /// Encoded size in bytes
    pub const SIZE: usize = 8;

    /// Build an acknowledgement
    pub const fn new(channel: u8, region_id: u8, sequence: u8, space_read: u32) -> Self {
        Self {
            command: HOST_DATA_READ_COMMAND,
            channel_and_region: pack_channel_and_region(channel, region_id),
            sequence,
            space_read,
        }
    }

    /// Channel number carried in the packet
    pub fn channel(&self) -> u8 {
        unpack_channel_and_region(self.channel_and_region).0
    }

    /// Region id carried in the packet
    pub fn region_id(&self) -> u8 {
        unpack_channel_and_region(self.channel_and_region).1
    }

    /// Encode to wire bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let wire = Self {
            command: self.command.to_le(),
            space_read: self.space_read.to_le(),
            ..*self
        };
        bytemuck::cast(wire)
    }

    /// Decode from wire bytes; `None` if too short
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let raw: Self = bytemuck::try_pod_read_unaligned(bytes.get(..Self::SIZE)?).ok()?;
        Some(Self {
            command: u16::from_le(raw.command),
            space_read: u32::from_le(raw.space_read),
            ..raw
        })
    }
}

/// Read the command header of any EIEIO command packet
pub fn peek_command(bytes: &[u8]) -> Option<u16> {
    let header = bytes.get(..2)?;
    Some(u16::from_le_bytes([header[0], header[1]]))
}

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! A single recording channel
//!
//! The channel owns a borrowed memory region for the whole run. The first
//! word is the byte counter; data follows. The write cursor only ever moves
//! forward (the region is one-shot for the run), while the read cursor wraps
//! back to the start when the host reports having consumed up to the end.

use core::fmt;

use crate::error::{RecordingError, Result};
use crate::packet::{pack_channel_and_region, ReadRequest, SdpHeader, SdpMessage};
use crate::packet::{REQUEST_BUFFERS_COMMAND, SDP_FLAGS_NO_REPLY, SDP_PORT_HOST, SDP_PORT_RECORDING};
use crate::protocol::PullState;

/// Size of the byte-count header word in front of the data
pub const HEADER_BYTES: usize = core::mem::size_of::<u32>();

/// Logical output streams of a neural core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RecordingChannelId {
    /// Spike times
    Spikes = 0,
    /// Membrane potentials
    Potentials = 1,
    /// Synaptic conductances
    Gsyn = 2,
}

impl RecordingChannelId {
    /// Number of channels
    pub const COUNT: usize = 3;

    /// All channels in index order
    pub const ALL: [RecordingChannelId; Self::COUNT] = [
        RecordingChannelId::Spikes,
        RecordingChannelId::Potentials,
        RecordingChannelId::Gsyn,
    ];

    /// Position in the channel table
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for RecordingChannelId {
    type Error = RecordingError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(RecordingChannelId::Spikes),
            1 => Ok(RecordingChannelId::Potentials),
            2 => Ok(RecordingChannelId::Gsyn),
            _ => Err(RecordingError::InvalidChannel(value)),
        }
    }
}

impl fmt::Display for RecordingChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordingChannelId::Spikes => "spikes",
            RecordingChannelId::Potentials => "potentials",
            RecordingChannelId::Gsyn => "gsyn",
        };
        write!(f, "{}({})", name, *self as u8)
    }
}

/// Which side last touched the region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOperation {
    /// Host acknowledged a read (also the state right after configuration)
    Read,
    /// Simulation appended a record
    Write,
}

/// Memory handed to a channel by the region resolver
#[derive(Debug)]
pub struct RecordingRegion<'a> {
    /// Region number in the configuration table (low nibble on the wire)
    pub region_id: u8,
    /// Device address of `memory[0]` (the header word)
    pub base_address: u32,
    /// Header word followed by the data area
    pub memory: &'a mut [u8],
}

/// A configured recording channel
pub struct RecordingChannel<'a> {
    id: RecordingChannelId,
    memory: &'a mut [u8],
    base_address: u32,
    end: usize,
    write_cursor: usize,
    read_cursor: usize,
    region_id: u8,
    last_operation: BufferOperation,
    request: SdpMessage,
    pub(crate) pull: PullState,
}

impl<'a> RecordingChannel<'a> {
    /// Claim `size_bytes` of `region` (plus the header word) for `id`
    ///
    /// Zeroes the header word and builds the read-request template addressed
    /// to the host through `return_tag_id`.
    pub fn new(
        id: RecordingChannelId,
        region: RecordingRegion<'a>,
        size_bytes: usize,
        return_tag_id: u8,
        chip_id: u16,
        core_id: u8,
    ) -> Result<Self> {
        let RecordingRegion {
            region_id,
            base_address,
            memory,
        } = region;

        let required = HEADER_BYTES
            .checked_add(size_bytes)
            .ok_or(RecordingError::AddressOverflow {
                base_address,
                size_bytes,
            })?;
        if memory.len() < required {
            return Err(RecordingError::RegionTooSmall {
                required,
                available: memory.len(),
            });
        }
        let fits_address_space = u32::try_from(required)
            .ok()
            .and_then(|required| base_address.checked_add(required))
            .is_some();
        if !fits_address_space {
            return Err(RecordingError::AddressOverflow {
                base_address,
                size_bytes,
            });
        }

        memory[..HEADER_BYTES].copy_from_slice(&0u32.to_le_bytes());

        let request = SdpMessage {
            header: SdpHeader {
                flags: SDP_FLAGS_NO_REPLY,
                tag: return_tag_id,
                dest_port: SDP_PORT_HOST,
                srce_port: SDP_PORT_RECORDING | (core_id & 0x1F),
                dest_addr: 0,
                srce_addr: chip_id,
            },
            request: ReadRequest {
                command: REQUEST_BUFFERS_COMMAND,
                chip_id,
                processor: core_id << 3,
                pad1: 0,
                channel_and_region: pack_channel_and_region(id as u8, region_id),
                ..ReadRequest::default()
            },
        };

        Ok(Self {
            id,
            memory,
            base_address,
            end: required,
            write_cursor: HEADER_BYTES,
            read_cursor: HEADER_BYTES,
            region_id,
            last_operation: BufferOperation::Read,
            request,
            pull: PullState::default(),
        })
    }

    /// Append `data`; all or nothing
    ///
    /// Succeeds only if `write_cursor + data.len() < end`, so the last byte of
    /// the region is never written.
    pub fn record(&mut self, data: &[u8]) -> Result<()> {
        let remaining = self.remaining();
        if data.len() >= remaining {
            return Err(RecordingError::OutOfSpace {
                channel: self.id,
                requested: data.len(),
                remaining,
            });
        }

        let start = self.write_cursor;
        self.memory[start..start + data.len()].copy_from_slice(data);
        self.write_cursor += data.len();
        self.last_operation = BufferOperation::Write;
        Ok(())
    }

    /// Store the number of bytes written into the header word
    pub fn finalise(&mut self) -> u32 {
        let bytes_written = self.bytes_written();
        self.memory[..HEADER_BYTES].copy_from_slice(&bytes_written.to_le_bytes());
        bytes_written
    }

    /// Move the read cursor after a committed host acknowledgement
    ///
    /// Wraps to the start when it reaches or passes the end.
    pub(crate) fn advance_read(&mut self, space_read: u32) {
        let advanced = self.read_cursor.saturating_add(space_read as usize);
        self.read_cursor = if advanced >= self.end {
            HEADER_BYTES
        } else {
            advanced
        };
        self.last_operation = BufferOperation::Read;
    }

    /// Read-request template with the protocol fields filled in
    pub(crate) fn read_request(&self, sequence: u8) -> SdpMessage {
        let mut message = self.request;
        message.request.sequence = sequence;
        message.request.start_address = self.read_address();
        message.request.space_to_be_read = self.unread_bytes() as u32;
        message
    }

    /// Channel this region belongs to
    pub fn id(&self) -> RecordingChannelId {
        self.id
    }

    /// Region number in the configuration table
    pub fn region_id(&self) -> u8 {
        self.region_id
    }

    /// Which side last touched the region
    pub fn last_operation(&self) -> BufferOperation {
        self.last_operation
    }

    /// Capacity of the data area in bytes
    pub fn size_bytes(&self) -> usize {
        self.end - HEADER_BYTES
    }

    /// Bytes appended since configuration
    pub fn bytes_written(&self) -> u32 {
        (self.write_cursor - HEADER_BYTES) as u32
    }

    /// Bytes between the write cursor and the end of the region
    pub fn remaining(&self) -> usize {
        self.end - self.write_cursor
    }

    /// Write cursor as an offset from the data start
    pub fn write_offset(&self) -> usize {
        self.write_cursor - HEADER_BYTES
    }

    /// Read cursor as an offset from the data start
    pub fn read_offset(&self) -> usize {
        self.read_cursor - HEADER_BYTES
    }

    /// Bytes written but not yet acknowledged by the host
    pub fn unread_bytes(&self) -> usize {
        self.write_cursor.saturating_sub(self.read_cursor)
    }

    /// Device address of the data start
    pub fn data_address(&self) -> u32 {
        self.base_address + HEADER_BYTES as u32
    }

    /// Device address of the read cursor
    pub fn read_address(&self) -> u32 {
        self.base_address + self.read_cursor as u32
    }

    /// Device address of the header word
    pub fn base_address(&self) -> u32 {
        self.base_address
    }

    /// Value currently stored in the header word
    pub fn header_value(&self) -> u32 {
        let mut word = [0u8; HEADER_BYTES];
        word.copy_from_slice(&self.memory[..HEADER_BYTES]);
        u32::from_le_bytes(word)
    }

    /// Data recorded so far
    pub fn data(&self) -> &[u8] {
        &self.memory[HEADER_BYTES..self.write_cursor]
    }

    /// Bytes at a device address inside the data area, bounded by the end
    pub fn read_at(&self, address: u32, len: usize) -> Option<&[u8]> {
        let offset = address.checked_sub(self.base_address)? as usize;
        if offset < HEADER_BYTES {
            return None;
        }
        let stop = offset.checked_add(len)?;
        if stop > self.end {
            return None;
        }
        self.memory.get(offset..stop)
    }

    /// Per-channel pull protocol state
    pub fn pull_state(&self) -> &PullState {
        &self.pull
    }
}

impl fmt::Debug for RecordingChannel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingChannel")
            .field("id", &self.id)
            .field("region_id", &self.region_id)
            .field("base_address", &format_args!("{:08x}", self.base_address))
            .field("size_bytes", &self.size_bytes())
            .field("write_offset", &self.write_offset())
            .field("read_offset", &self.read_offset())
            .field("last_operation", &self.last_operation)
            .field("pull", &self.pull)
            .finish()
    }
}

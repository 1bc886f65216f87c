// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Host side of the read-back exchange
//!
//! Answers read requests the way the host tooling does: read the span the
//! core advertised, keep the data, and reply with a host-data-read packet
//! echoing the request's sequence number. Used by the simulation tool and
//! the integration tests to drive the full loop in one process.

use std::collections::HashMap;

use crate::channel::RecordingChannelId;
use crate::manager::RecordingChannels;
use crate::packet::{HostDataRead, SdpMessage, REQUEST_BUFFERS_COMMAND};
use crate::protocol::INITIAL_SEQUENCE;

/// Read access to device memory by absolute address
pub trait DeviceMemory {
    /// `len` bytes starting at `address`, or `None` if unmapped
    fn read(&self, address: u32, len: usize) -> Option<&[u8]>;
}

impl DeviceMemory for RecordingChannels<'_> {
    fn read(&self, address: u32, len: usize) -> Option<&[u8]> {
        self.iter().find_map(|channel| channel.read_at(address, len))
    }
}

/// Reply to one read request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostResponse {
    /// New span: data delivered and acknowledged
    Fresh {
        /// Bytes read from the device
        data: Vec<u8>,
        /// Acknowledgement to send back to the core
        ack: HostDataRead,
    },
    /// Resent request for a span already delivered
    ///
    /// The acknowledgement repeats the length delivered under that sequence
    /// number, which may be shorter than the repeated request's span.
    Duplicate {
        /// Acknowledgement to send back to the core
        ack: HostDataRead,
    },
}

impl HostResponse {
    /// Acknowledgement to send back to the core
    pub fn ack(&self) -> HostDataRead {
        match self {
            HostResponse::Fresh { ack, .. } | HostResponse::Duplicate { ack } => *ack,
        }
    }
}

/// Host-side reader keeping one sequence number per channel
#[derive(Debug, Default)]
pub struct HostReader {
    last_sequence: HashMap<u8, u8>,
    delivered_span: HashMap<u8, u32>,
    received: HashMap<u8, Vec<u8>>,
}

impl HostReader {
    /// Reader that has seen nothing yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Last sequence number processed for a raw channel number
    pub fn last_sequence(&self, channel: u8) -> u8 {
        self.last_sequence
            .get(&channel)
            .copied()
            .unwrap_or(INITIAL_SEQUENCE)
    }

    /// Answer one read request
    ///
    /// Returns `None` for messages that are not read requests, for sequence
    /// numbers that are neither the next one nor a repeat of the last one, and
    /// for spans outside mapped memory.
    pub fn handle_request<M: DeviceMemory + ?Sized>(
        &mut self,
        memory: &M,
        message: &SdpMessage,
    ) -> Option<HostResponse> {
        let request = &message.request;
        if request.command != REQUEST_BUFFERS_COMMAND {
            tracing::warn!(command = request.command, "Host reader: not a read request");
            return None;
        }

        let channel = request.channel();
        let last = self.last_sequence(channel);

        if request.sequence == last {
            let Some(&span) = self.delivered_span.get(&channel) else {
                tracing::warn!(channel, sequence = last, "Host reader: repeat of unseen request");
                return None;
            };
            tracing::debug!(
                channel,
                sequence = last,
                delivered = span,
                requested = request.space_to_be_read,
                "Host reader: repeated request"
            );
            let ack = HostDataRead::new(channel, request.region_id(), request.sequence, span);
            return Some(HostResponse::Duplicate { ack });
        }
        if request.sequence != last.wrapping_add(1) {
            tracing::warn!(
                channel,
                expected = last.wrapping_add(1),
                received = request.sequence,
                "Host reader: out-of-order request"
            );
            return None;
        }

        let data = memory
            .read(request.start_address, request.space_to_be_read as usize)?
            .to_vec();
        let ack = HostDataRead::new(
            channel,
            request.region_id(),
            request.sequence,
            request.space_to_be_read,
        );
        self.last_sequence.insert(channel, request.sequence);
        self.delivered_span.insert(channel, request.space_to_be_read);
        self.received
            .entry(channel)
            .or_default()
            .extend_from_slice(&data);

        tracing::debug!(
            channel,
            sequence = request.sequence,
            bytes = data.len(),
            "Host reader: span delivered"
        );
        Some(HostResponse::Fresh { data, ack })
    }

    /// Everything delivered so far for `channel`, in order
    pub fn received(&self, channel: RecordingChannelId) -> &[u8] {
        self.received
            .get(&(channel as u8))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{pack_channel_and_region, ReadRequest};

    struct FlatMemory {
        base: u32,
        bytes: Vec<u8>,
    }

    impl DeviceMemory for FlatMemory {
        fn read(&self, address: u32, len: usize) -> Option<&[u8]> {
            let offset = address.checked_sub(self.base)? as usize;
            self.bytes.get(offset..offset + len)
        }
    }

    fn request(sequence: u8, start_address: u32, space: u32) -> SdpMessage {
        SdpMessage {
            request: ReadRequest {
                command: REQUEST_BUFFERS_COMMAND,
                channel_and_region: pack_channel_and_region(1, 6),
                sequence,
                start_address,
                space_to_be_read: space,
                ..ReadRequest::default()
            },
            ..SdpMessage::default()
        }
    }

    #[test]
    fn test_fresh_then_duplicate() {
        let memory = FlatMemory {
            base: 0x100,
            bytes: (0u8..16).collect(),
        };
        let mut reader = HostReader::new();
        assert_eq!(reader.last_sequence(1), 0xFF);

        let response = reader
            .handle_request(&memory, &request(0, 0x104, 4))
            .unwrap();
        assert_eq!(
            response,
            HostResponse::Fresh {
                data: vec![4, 5, 6, 7],
                ack: HostDataRead::new(1, 6, 0, 4)
            }
        );
        assert_eq!(reader.last_sequence(1), 0);

        let again = reader
            .handle_request(&memory, &request(0, 0x104, 4))
            .unwrap();
        assert!(matches!(again, HostResponse::Duplicate { .. }));
        assert_eq!(reader.received(RecordingChannelId::Potentials), &[4, 5, 6, 7]);
    }

    #[test]
    fn test_repeat_with_longer_span_acknowledges_delivered_length() {
        let memory = FlatMemory {
            base: 0,
            bytes: (0u8..32).collect(),
        };
        let mut reader = HostReader::new();
        reader.handle_request(&memory, &request(0, 0, 8)).unwrap();

        // Core never saw the ack and re-requests after recording more
        let again = reader
            .handle_request(&memory, &request(0, 0, 12))
            .unwrap();
        assert_eq!(
            again,
            HostResponse::Duplicate {
                ack: HostDataRead::new(1, 6, 0, 8)
            }
        );
        assert_eq!(reader.received(RecordingChannelId::Potentials).len(), 8);
    }

    #[test]
    fn test_out_of_order_and_unmapped_rejected() {
        let memory = FlatMemory {
            base: 0,
            bytes: vec![0; 8],
        };
        let mut reader = HostReader::new();
        assert!(reader.handle_request(&memory, &request(3, 0, 4)).is_none());
        assert!(reader.handle_request(&memory, &request(0, 4, 8)).is_none());
        assert_eq!(reader.last_sequence(1), 0xFF);
    }
}

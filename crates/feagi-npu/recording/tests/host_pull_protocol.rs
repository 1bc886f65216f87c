// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the host pull protocol
//!
//! Drives a core-side channel table against the host-side reader through an
//! in-memory transport.

use feagi_npu_event_buffer::{EventRecord, Spike, SpikeBuffer};
use feagi_npu_recording::*;

const SPIKE_REGION: u8 = 2;
const POTENTIAL_REGION: u8 = 3;

/// Collects every outbound packet
#[derive(Default)]
struct LoopbackTransport {
    sent: Vec<SdpMessage>,
}

impl HostTransport for LoopbackTransport {
    type Error = ();

    fn send_to_host(&mut self, message: &SdpMessage) -> std::result::Result<(), ()> {
        self.sent.push(*message);
        Ok(())
    }
}

/// Refuses every packet
struct FullQueue;

impl HostTransport for FullQueue {
    type Error = &'static str;

    fn send_to_host(&mut self, _message: &SdpMessage) -> std::result::Result<(), &'static str> {
        Err("tx queue full")
    }
}

fn spike_region(memory: &mut [u8]) -> RecordingRegion<'_> {
    RecordingRegion {
        region_id: SPIKE_REGION,
        base_address: 0x6000_0000,
        memory,
    }
}

fn ack_bytes(channel: RecordingChannelId, sequence: u8, space_read: u32) -> [u8; 8] {
    HostDataRead::new(channel as u8, SPIKE_REGION, sequence, space_read).to_bytes()
}

#[test]
fn test_commit_sequence_and_read_cursor() {
    let mut memory = [0u8; 36];
    let mut transport = LoopbackTransport::default();
    let identity = StaticIdentity::from_coordinates(0, 1, 5);
    let mut channels = RecordingChannels::new(&identity, PullSettings::default());
    channels
        .configure(RecordingChannelId::Spikes, spike_region(&mut memory), 32)
        .unwrap();
    channels.record(RecordingChannelId::Spikes, &[1; 16]).unwrap();

    let request = channels
        .request_read(RecordingChannelId::Spikes, &mut transport)
        .unwrap();
    assert_eq!(request.sequence, 0);
    assert_eq!(request.start_address, 0x6000_0004);
    assert_eq!(request.space_to_be_read, 16);
    assert_eq!(transport.sent[0].header.srce_addr, 0x0001);
    assert_eq!(transport.sent[0].header.srce_port, (1 << 5) | 5);

    let outcome = channels.handle_packet(
        &ack_bytes(RecordingChannelId::Spikes, 0, 16),
        &mut transport,
    );
    assert!(matches!(outcome, PacketOutcome::Committed { sequence: 0, .. }));

    let channel = channels.channel(RecordingChannelId::Spikes).unwrap();
    assert_eq!(channel.read_offset(), 16);
    assert_eq!(channel.last_operation(), BufferOperation::Read);
    assert_eq!(channel.pull_state().expected(), 1);
}

#[test]
fn test_read_cursor_wraps_at_end() {
    let mut memory = [0u8; 20];
    let mut transport = LoopbackTransport::default();
    let mut channels =
        RecordingChannels::new(&StaticIdentity::default(), PullSettings::default());
    channels
        .configure(RecordingChannelId::Spikes, spike_region(&mut memory), 16)
        .unwrap();
    channels.record(RecordingChannelId::Spikes, &[3; 12]).unwrap();

    channels.handle_packet(&ack_bytes(RecordingChannelId::Spikes, 0, 8), &mut transport);
    channels.handle_packet(&ack_bytes(RecordingChannelId::Spikes, 1, 8), &mut transport);

    let channel = channels.channel(RecordingChannelId::Spikes).unwrap();
    assert_eq!(channel.read_offset(), 0);
    assert_eq!(channel.write_offset(), 12);
}

#[test]
fn test_mismatch_then_correct_ack() {
    let mut memory = [0u8; 36];
    let mut transport = LoopbackTransport::default();
    let mut channels =
        RecordingChannels::new(&StaticIdentity::default(), PullSettings::default());
    channels
        .configure(RecordingChannelId::Spikes, spike_region(&mut memory), 32)
        .unwrap();
    channels.record(RecordingChannelId::Spikes, &[4; 8]).unwrap();

    let outcome =
        channels.handle_packet(&ack_bytes(RecordingChannelId::Spikes, 7, 8), &mut transport);
    assert!(matches!(outcome, PacketOutcome::Resent { expected: 0, received: 7, .. }));
    assert_eq!(transport.sent.len(), 1);
    assert_eq!(
        channels
            .channel(RecordingChannelId::Spikes)
            .unwrap()
            .read_offset(),
        0
    );

    let outcome =
        channels.handle_packet(&ack_bytes(RecordingChannelId::Spikes, 0, 8), &mut transport);
    assert!(matches!(outcome, PacketOutcome::Committed { .. }));
    assert_eq!(transport.sent.len(), 1);
}

#[test]
fn test_stall_after_resend_bound() {
    let mut memory = [0u8; 36];
    let mut transport = LoopbackTransport::default();
    let settings = PullSettings {
        return_tag_id: 1,
        max_resend_attempts: 3,
    };
    let mut channels = RecordingChannels::new(&StaticIdentity::default(), settings);
    channels
        .configure(RecordingChannelId::Spikes, spike_region(&mut memory), 32)
        .unwrap();

    for _ in 0..3 {
        let outcome =
            channels.handle_packet(&ack_bytes(RecordingChannelId::Spikes, 9, 4), &mut transport);
        assert!(matches!(outcome, PacketOutcome::Resent { .. }));
    }
    let outcome =
        channels.handle_packet(&ack_bytes(RecordingChannelId::Spikes, 9, 4), &mut transport);
    assert!(matches!(outcome, PacketOutcome::Stalled { .. }));
    assert_eq!(
        channels.channel_status(RecordingChannelId::Spikes),
        ChannelStatus::Stalled
    );
    assert_eq!(transport.sent.len(), 3);
    assert!(transport.sent.iter().all(|m| m.header.tag == 1));

    // Stalled: further mismatches send nothing, pending reads skip it
    channels.handle_packet(&ack_bytes(RecordingChannelId::Spikes, 9, 4), &mut transport);
    channels.record(RecordingChannelId::Spikes, &[1; 4]).unwrap();
    assert_eq!(channels.request_pending_reads(&mut transport), 0);
    assert_eq!(transport.sent.len(), 3);

    let outcome =
        channels.handle_packet(&ack_bytes(RecordingChannelId::Spikes, 0, 4), &mut transport);
    assert!(matches!(outcome, PacketOutcome::Committed { .. }));
    assert_eq!(
        channels.channel_status(RecordingChannelId::Spikes),
        ChannelStatus::Active
    );
}

#[test]
fn test_channels_keep_independent_sequences() {
    let mut spikes = [0u8; 36];
    let mut potentials = [0u8; 36];
    let mut transport = LoopbackTransport::default();
    let mut channels =
        RecordingChannels::new(&StaticIdentity::default(), PullSettings::default());
    channels
        .configure(RecordingChannelId::Spikes, spike_region(&mut spikes), 32)
        .unwrap();
    channels
        .configure(
            RecordingChannelId::Potentials,
            RecordingRegion {
                region_id: POTENTIAL_REGION,
                base_address: 0x6100_0000,
                memory: &mut potentials,
            },
            32,
        )
        .unwrap();

    channels.handle_packet(&ack_bytes(RecordingChannelId::Spikes, 0, 0), &mut transport);
    channels.handle_packet(&ack_bytes(RecordingChannelId::Spikes, 1, 0), &mut transport);

    let potentials_ack =
        HostDataRead::new(RecordingChannelId::Potentials as u8, POTENTIAL_REGION, 0, 0);
    let outcome = channels.handle_packet(&potentials_ack.to_bytes(), &mut transport);
    assert!(matches!(outcome, PacketOutcome::Committed { sequence: 0, .. }));
    assert!(transport.sent.is_empty());
}

#[test]
fn test_send_failure_reported() {
    let mut memory = [0u8; 36];
    let mut channels =
        RecordingChannels::new(&StaticIdentity::default(), PullSettings::default());
    channels
        .configure(RecordingChannelId::Spikes, spike_region(&mut memory), 32)
        .unwrap();

    assert_eq!(
        channels.request_read(RecordingChannelId::Spikes, &mut FullQueue),
        Err(RecordingError::SendFailed {
            channel: RecordingChannelId::Spikes
        })
    );
    let outcome =
        channels.handle_packet(&ack_bytes(RecordingChannelId::Spikes, 2, 0), &mut FullQueue);
    assert!(matches!(outcome, PacketOutcome::Resent { sent: false, .. }));
}

#[test]
fn test_spikes_end_to_end_through_host_reader() {
    let mut spike_buffer = SpikeBuffer::initialize(32).unwrap();
    let mut memory = vec![0u8; 4 + 256];
    let mut transport = LoopbackTransport::default();
    let mut host = HostReader::new();
    let mut channels =
        RecordingChannels::new(&StaticIdentity::default(), PullSettings::default());
    channels
        .configure(RecordingChannelId::Spikes, spike_region(&mut memory), 256)
        .unwrap();

    let mut expected = Vec::new();
    for tick in 0..5u32 {
        {
            let (mut producer, _) = spike_buffer.split();
            for neuron in 0..4 {
                assert!(producer.push(Spike::new(tick * 100 + neuron)));
            }
        }
        while !spike_buffer.is_empty() {
            let spike = spike_buffer.pop().unwrap();
            let bytes = spike.key().to_le_bytes();
            channels.record(RecordingChannelId::Spikes, &bytes).unwrap();
            expected.extend_from_slice(&bytes);
        }

        assert_eq!(channels.request_pending_reads(&mut transport), 1);
        let message = transport.sent.pop().unwrap();
        let response = host.handle_request(&channels, &message).unwrap();
        assert!(matches!(response, HostResponse::Fresh { .. }));
        let outcome = channels.handle_packet(&response.ack().to_bytes(), &mut transport);
        assert!(matches!(outcome, PacketOutcome::Committed { .. }));
    }

    assert_eq!(host.received(RecordingChannelId::Spikes), expected.as_slice());
    assert_eq!(host.last_sequence(RecordingChannelId::Spikes as u8), 4);
    assert_eq!(channels.request_pending_reads(&mut transport), 0);

    channels.finalise();
    let channel = channels.channel(RecordingChannelId::Spikes).unwrap();
    assert_eq!(channel.header_value(), 80);
    assert_eq!(channel.data(), expected.as_slice());
    assert_eq!(spike_buffer.stats().overflows, 0);
    assert_eq!(spike_buffer.underflow_count(), 0);
}

#[test]
fn test_lost_ack_then_more_data_commits_only_delivered_span() {
    let mut memory = vec![0u8; 4 + 64];
    let mut transport = LoopbackTransport::default();
    let mut host = HostReader::new();
    let mut channels =
        RecordingChannels::new(&StaticIdentity::default(), PullSettings::default());
    channels
        .configure(RecordingChannelId::Spikes, spike_region(&mut memory), 64)
        .unwrap();

    channels.record(RecordingChannelId::Spikes, &[1; 8]).unwrap();
    assert_eq!(channels.request_pending_reads(&mut transport), 1);
    let first = transport.sent.pop().unwrap();
    let lost = host.handle_request(&channels, &first).unwrap();
    assert!(matches!(lost, HostResponse::Fresh { .. }));

    // Ack never reaches the core; more data lands before the next request
    channels.record(RecordingChannelId::Spikes, &[2; 4]).unwrap();
    assert_eq!(channels.request_pending_reads(&mut transport), 1);
    let repeat = transport.sent.pop().unwrap();
    assert_eq!(repeat.request.sequence, 0);
    assert_eq!(repeat.request.space_to_be_read, 12);

    let response = host.handle_request(&channels, &repeat).unwrap();
    assert!(matches!(response, HostResponse::Duplicate { .. }));
    assert_eq!(response.ack().space_read, 8);
    let outcome = channels.handle_packet(&response.ack().to_bytes(), &mut transport);
    assert!(matches!(outcome, PacketOutcome::Committed { space_read: 8, .. }));

    let channel = channels.channel(RecordingChannelId::Spikes).unwrap();
    assert_eq!(channel.read_offset(), 8);
    assert_eq!(channel.unread_bytes(), 4);

    // The remaining bytes go out under the next sequence number
    assert_eq!(channels.request_pending_reads(&mut transport), 1);
    let next = transport.sent.pop().unwrap();
    let response = host.handle_request(&channels, &next).unwrap();
    assert!(matches!(response, HostResponse::Fresh { .. }));
    channels.handle_packet(&response.ack().to_bytes(), &mut transport);

    let mut expected = vec![1u8; 8];
    expected.extend_from_slice(&[2; 4]);
    assert_eq!(host.received(RecordingChannelId::Spikes), expected.as_slice());
    assert_eq!(
        channels
            .channel(RecordingChannelId::Spikes)
            .unwrap()
            .unread_bytes(),
        0
    );
}

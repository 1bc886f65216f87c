// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! Recording channel table and host pull protocol handler
//!
//! One table per core. The simulation loop is the only writer of channel
//! data; the inbound packet handler only moves read cursors. Nothing here
//! blocks and nothing locks: every call returns its answer immediately.

use crate::channel::{RecordingChannel, RecordingChannelId, RecordingRegion};
use crate::error::{RecordingError, Result};
use crate::packet::{peek_command, HostDataRead, ReadRequest, HOST_DATA_READ_COMMAND};
use crate::protocol::{AckDecision, ChannelStatus, IgnoreReason, PacketOutcome, PullSettings};
use crate::transport::{CoreIdentity, HostTransport};

/// All recording channels of a core
///
/// # Example
/// ```
/// use feagi_npu_recording::*;
///
/// let mut sdram = [0u8; 68];
/// let identity = StaticIdentity::from_coordinates(0, 0, 1);
/// let mut channels = RecordingChannels::new(&identity, PullSettings::default());
///
/// channels
///     .configure(
///         RecordingChannelId::Spikes,
///         RecordingRegion { region_id: 2, base_address: 0x6000_0000, memory: &mut sdram },
///         64,
///     )
///     .unwrap();
/// channels.record(RecordingChannelId::Spikes, &42u32.to_le_bytes()).unwrap();
/// channels.finalise();
/// ```
#[derive(Debug)]
pub struct RecordingChannels<'a> {
    channels: [Option<RecordingChannel<'a>>; RecordingChannelId::COUNT],
    settings: PullSettings,
    chip_id: u16,
    core_id: u8,
}

impl<'a> RecordingChannels<'a> {
    /// Empty table for the core described by `identity`
    pub fn new(identity: &impl CoreIdentity, settings: PullSettings) -> Self {
        Self {
            channels: [None, None, None],
            settings,
            chip_id: identity.chip_id(),
            core_id: identity.core_id(),
        }
    }

    /// Put a channel in use
    ///
    /// `size_bytes == 0` means the channel is disabled; the call succeeds and
    /// the channel stays unconfigured.
    ///
    /// # Errors
    /// - [`RecordingError::AlreadyConfigured`] on a second configuration
    /// - [`RecordingError::RegionTooSmall`] / [`RecordingError::AddressOverflow`]
    ///   if the region cannot hold the header word plus `size_bytes`
    pub fn configure(
        &mut self,
        channel: RecordingChannelId,
        region: RecordingRegion<'a>,
        size_bytes: usize,
    ) -> Result<()> {
        if size_bytes == 0 {
            tracing::debug!(%channel, "Recording channel disabled");
            return Ok(());
        }

        let slot = &mut self.channels[channel.index()];
        if slot.is_some() {
            tracing::info!(%channel, "Recording channel already configured");
            return Err(RecordingError::AlreadyConfigured { channel });
        }

        let configured = RecordingChannel::new(
            channel,
            region,
            size_bytes,
            self.settings.return_tag_id,
            self.chip_id,
            self.core_id,
        )?;
        tracing::info!(
            %channel,
            size_bytes,
            start = format_args!("{:08x}", configured.data_address()),
            "Recording channel configured"
        );
        *slot = Some(configured);
        Ok(())
    }

    /// True once `channel` has been configured with a non-zero size
    pub fn is_in_use(&self, channel: RecordingChannelId) -> bool {
        self.channels[channel.index()].is_some()
    }

    /// Append `data` to `channel`; nothing is written on failure
    ///
    /// # Errors
    /// - [`RecordingError::ChannelNotInUse`] if the channel is not configured
    /// - [`RecordingError::OutOfSpace`] if the record does not fit
    pub fn record(&mut self, channel: RecordingChannelId, data: &[u8]) -> Result<()> {
        let Some(recording_channel) = self.channels[channel.index()].as_mut() else {
            tracing::warn!(%channel, "Recording channel not in use");
            return Err(RecordingError::ChannelNotInUse { channel });
        };

        recording_channel.record(data).map_err(|err| {
            tracing::warn!(%channel, "Recording channel out of space");
            err
        })
    }

    /// Write the byte count of every configured channel into its header word
    pub fn finalise(&mut self) {
        tracing::info!("Finalising recording channels");
        for recording_channel in self.channels.iter_mut().flatten() {
            let bytes_written = recording_channel.finalise();
            tracing::info!(
                channel = %recording_channel.id(),
                bytes = bytes_written as usize + crate::HEADER_BYTES,
                counter = format_args!("{:08x}", recording_channel.base_address()),
                "Finalised recording channel"
            );
        }
    }

    /// Ask the host to drain `channel`
    ///
    /// Sends the channel's read-request template with the expected sequence
    /// number, the read cursor address and the unread byte count filled in.
    pub fn request_read<T: HostTransport>(
        &mut self,
        channel: RecordingChannelId,
        transport: &mut T,
    ) -> Result<ReadRequest> {
        let recording_channel = self.channels[channel.index()]
            .as_ref()
            .ok_or(RecordingError::ChannelNotInUse { channel })?;

        let message = recording_channel.read_request(recording_channel.pull.expected());
        transport.send_to_host(&message).map_err(|err| {
            tracing::warn!(%channel, error = ?err, "Failed to send read request");
            RecordingError::SendFailed { channel }
        })?;

        tracing::debug!(
            %channel,
            sequence = message.request.sequence,
            start = format_args!("{:08x}", message.request.start_address),
            length = message.request.space_to_be_read,
            "Sent read request"
        );
        Ok(message.request)
    }

    /// Send a read request for every configured channel that has unread data
    ///
    /// Stalled channels are skipped. Returns the number of requests sent.
    pub fn request_pending_reads<T: HostTransport>(&mut self, transport: &mut T) -> usize {
        let mut sent = 0;
        for channel in RecordingChannelId::ALL {
            let pending = self.channels[channel.index()]
                .as_ref()
                .is_some_and(|c| c.unread_bytes() > 0 && !c.pull.is_stalled());
            if pending && self.request_read(channel, transport).is_ok() {
                sent += 1;
            }
        }
        sent
    }

    /// Handle one inbound EIEIO command packet
    ///
    /// Only host-data-read packets are acted on. A packet carrying the
    /// expected successor sequence commits; any other sequence triggers a
    /// resend of the read request, up to the configured bound, after which
    /// the channel is stalled until a correct acknowledgement arrives.
    pub fn handle_packet<T: HostTransport>(
        &mut self,
        payload: &[u8],
        transport: &mut T,
    ) -> PacketOutcome {
        match peek_command(payload) {
            Some(HOST_DATA_READ_COMMAND) => {}
            Some(other) => return PacketOutcome::Ignored(IgnoreReason::UnknownCommand(other)),
            None => {
                return PacketOutcome::Ignored(IgnoreReason::Truncated {
                    length: payload.len(),
                })
            }
        }

        let Some(ack) = HostDataRead::from_bytes(payload) else {
            return PacketOutcome::Ignored(IgnoreReason::Truncated {
                length: payload.len(),
            });
        };

        let raw_channel = ack.channel();
        let channel = match RecordingChannelId::try_from(raw_channel) {
            Ok(channel) if self.is_in_use(channel) => channel,
            _ => {
                tracing::warn!(channel = raw_channel, "Host data read for unused channel");
                return PacketOutcome::Ignored(IgnoreReason::ChannelNotInUse(raw_channel));
            }
        };

        let max_resends = self.settings.max_resend_attempts;
        let Some(recording_channel) = self.channels[channel.index()].as_mut() else {
            return PacketOutcome::Ignored(IgnoreReason::ChannelNotInUse(raw_channel));
        };

        if ack.region_id() != recording_channel.region_id() {
            tracing::warn!(
                %channel,
                expected = recording_channel.region_id(),
                received = ack.region_id(),
                "Host data read for wrong region"
            );
            return PacketOutcome::Ignored(IgnoreReason::RegionMismatch {
                channel,
                expected: recording_channel.region_id(),
                received: ack.region_id(),
            });
        }

        let expected = recording_channel.pull.expected();
        match recording_channel.pull.on_acknowledgement(ack.sequence, max_resends) {
            AckDecision::Commit => {
                recording_channel.advance_read(ack.space_read);
                tracing::debug!(
                    %channel,
                    sequence = ack.sequence,
                    space_read = ack.space_read,
                    read_offset = recording_channel.read_offset(),
                    "Host data read committed"
                );
                PacketOutcome::Committed {
                    channel,
                    sequence: ack.sequence,
                    space_read: ack.space_read,
                }
            }
            AckDecision::Resend { attempt } => {
                tracing::warn!(
                    %channel,
                    expected,
                    received = ack.sequence,
                    attempt,
                    "Sequence mismatch, resending read request"
                );
                let sent = self.request_read(channel, transport).is_ok();
                PacketOutcome::Resent {
                    channel,
                    expected,
                    received: ack.sequence,
                    attempt,
                    sent,
                }
            }
            AckDecision::Stall => {
                tracing::error!(
                    %channel,
                    expected,
                    received = ack.sequence,
                    max_resends,
                    "Recording channel stalled: resend limit reached"
                );
                PacketOutcome::Stalled {
                    channel,
                    expected,
                    received: ack.sequence,
                }
            }
            AckDecision::IgnoreWhileStalled => PacketOutcome::Stalled {
                channel,
                expected,
                received: ack.sequence,
            },
        }
    }

    /// Observable protocol state of `channel`
    pub fn channel_status(&self, channel: RecordingChannelId) -> ChannelStatus {
        match &self.channels[channel.index()] {
            None => ChannelStatus::Unconfigured,
            Some(c) if c.pull.is_stalled() => ChannelStatus::Stalled,
            Some(_) => ChannelStatus::Active,
        }
    }

    /// Configured channel, if any
    pub fn channel(&self, channel: RecordingChannelId) -> Option<&RecordingChannel<'a>> {
        self.channels[channel.index()].as_ref()
    }

    /// All configured channels in index order
    pub fn iter(&self) -> impl Iterator<Item = &RecordingChannel<'a>> {
        self.channels.iter().flatten()
    }

    /// Protocol parameters in effect
    pub fn settings(&self) -> PullSettings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::SdpMessage;
    use crate::transport::StaticIdentity;

    #[derive(Default)]
    struct CapturingTransport {
        sent: Vec<SdpMessage>,
    }

    impl HostTransport for CapturingTransport {
        type Error = ();

        fn send_to_host(&mut self, message: &SdpMessage) -> core::result::Result<(), ()> {
            self.sent.push(*message);
            Ok(())
        }
    }

    fn region(memory: &mut [u8], region_id: u8) -> RecordingRegion<'_> {
        RecordingRegion {
            region_id,
            base_address: 0x7000_0000,
            memory,
        }
    }

    fn ack(channel: RecordingChannelId, region_id: u8, sequence: u8, space_read: u32) -> [u8; 8] {
        HostDataRead::new(channel as u8, region_id, sequence, space_read).to_bytes()
    }

    #[test]
    fn test_configure_twice_is_rejected() {
        let mut first = [0u8; 16];
        let mut second = [0u8; 16];
        let mut channels =
            RecordingChannels::new(&StaticIdentity::default(), PullSettings::default());

        channels
            .configure(RecordingChannelId::Spikes, region(&mut first, 1), 8)
            .unwrap();
        assert_eq!(
            channels.configure(RecordingChannelId::Spikes, region(&mut second, 1), 8),
            Err(RecordingError::AlreadyConfigured {
                channel: RecordingChannelId::Spikes
            })
        );
    }

    #[test]
    fn test_zero_size_is_disabled() {
        let mut memory = [0u8; 16];
        let mut channels =
            RecordingChannels::new(&StaticIdentity::default(), PullSettings::default());
        channels
            .configure(RecordingChannelId::Gsyn, region(&mut memory, 1), 0)
            .unwrap();
        assert!(!channels.is_in_use(RecordingChannelId::Gsyn));
        assert_eq!(
            channels.record(RecordingChannelId::Gsyn, &[1]),
            Err(RecordingError::ChannelNotInUse {
                channel: RecordingChannelId::Gsyn
            })
        );
        assert_eq!(
            channels.channel_status(RecordingChannelId::Gsyn),
            ChannelStatus::Unconfigured
        );
    }

    #[test]
    fn test_out_of_space_leaves_cursor() {
        let mut memory = [0u8; 12];
        let mut channels =
            RecordingChannels::new(&StaticIdentity::default(), PullSettings::default());
        channels
            .configure(RecordingChannelId::Spikes, region(&mut memory, 1), 8)
            .unwrap();

        channels.record(RecordingChannelId::Spikes, &[1; 4]).unwrap();
        let err = channels
            .record(RecordingChannelId::Spikes, &[2; 4])
            .unwrap_err();
        assert_eq!(
            err,
            RecordingError::OutOfSpace {
                channel: RecordingChannelId::Spikes,
                requested: 4,
                remaining: 4
            }
        );
        let channel = channels.channel(RecordingChannelId::Spikes).unwrap();
        assert_eq!(channel.write_offset(), 4);
        assert_eq!(channel.data(), &[1; 4]);
    }

    #[test]
    fn test_matching_ack_commits() {
        let mut memory = [0u8; 36];
        let mut transport = CapturingTransport::default();
        let mut channels =
            RecordingChannels::new(&StaticIdentity::default(), PullSettings::default());
        channels
            .configure(RecordingChannelId::Spikes, region(&mut memory, 2), 32)
            .unwrap();
        channels.record(RecordingChannelId::Spikes, &[7; 12]).unwrap();

        let outcome =
            channels.handle_packet(&ack(RecordingChannelId::Spikes, 2, 0, 8), &mut transport);
        assert_eq!(
            outcome,
            PacketOutcome::Committed {
                channel: RecordingChannelId::Spikes,
                sequence: 0,
                space_read: 8
            }
        );
        let channel = channels.channel(RecordingChannelId::Spikes).unwrap();
        assert_eq!(channel.read_offset(), 8);
        assert_eq!(channel.pull_state().last_acknowledged(), 0);
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn test_mismatch_resends_exactly_once() {
        let mut memory = [0u8; 36];
        let mut transport = CapturingTransport::default();
        let mut channels =
            RecordingChannels::new(&StaticIdentity::default(), PullSettings::default());
        channels
            .configure(RecordingChannelId::Spikes, region(&mut memory, 2), 32)
            .unwrap();

        let outcome =
            channels.handle_packet(&ack(RecordingChannelId::Spikes, 2, 5, 8), &mut transport);
        assert!(matches!(
            outcome,
            PacketOutcome::Resent {
                expected: 0,
                received: 5,
                attempt: 1,
                sent: true,
                ..
            }
        ));
        assert_eq!(transport.sent.len(), 1);
        assert_eq!(transport.sent[0].request.sequence, 0);
        let channel = channels.channel(RecordingChannelId::Spikes).unwrap();
        assert_eq!(channel.pull_state().last_acknowledged(), 0xFF);
        assert_eq!(channel.read_offset(), 0);
    }

    #[test]
    fn test_other_commands_ignored() {
        let mut transport = CapturingTransport::default();
        let mut channels =
            RecordingChannels::new(&StaticIdentity::default(), PullSettings::default());
        let outcome = channels.handle_packet(&[0x06, 0x40, 0, 0, 0, 0, 0, 0], &mut transport);
        assert_eq!(
            outcome,
            PacketOutcome::Ignored(IgnoreReason::UnknownCommand(0x4006))
        );
        let outcome = channels.handle_packet(&[0x09, 0x40, 0], &mut transport);
        assert_eq!(
            outcome,
            PacketOutcome::Ignored(IgnoreReason::Truncated { length: 3 })
        );
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn test_unused_channel_and_region_mismatch_ignored() {
        let mut memory = [0u8; 20];
        let mut transport = CapturingTransport::default();
        let mut channels =
            RecordingChannels::new(&StaticIdentity::default(), PullSettings::default());
        channels
            .configure(RecordingChannelId::Potentials, region(&mut memory, 4), 16)
            .unwrap();

        assert_eq!(
            channels.handle_packet(&ack(RecordingChannelId::Spikes, 4, 0, 1), &mut transport),
            PacketOutcome::Ignored(IgnoreReason::ChannelNotInUse(0))
        );
        assert_eq!(
            channels.handle_packet(&ack(RecordingChannelId::Potentials, 5, 0, 1), &mut transport),
            PacketOutcome::Ignored(IgnoreReason::RegionMismatch {
                channel: RecordingChannelId::Potentials,
                expected: 4,
                received: 5
            })
        );
        assert!(transport.sent.is_empty());
    }
}

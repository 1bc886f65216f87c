// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Host pull protocol state machine
//!
//! Stop-and-wait exchange with an 8-bit sequence number per channel:
//!
//! ```text
//!            ack(seq == last + 1)           ack(seq != last + 1)
//!   ┌──────────────────────────────┐   ┌──────────────────────────────┐
//!   │ last = seq, advance read     │   │ resend request (bounded)     │
//!   ▼                              │   ▼                              │
//! [Active] ────────────────────────┘ [Active] ── resends exhausted ──► [Stalled]
//!                                                                        │
//!   ▲                       ack(seq == last + 1)                         │
//!   └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each channel carries its own [`PullState`], so an acknowledgement for one
//! channel can never disturb the sequence of another. Only an explicit
//! mismatch triggers a resend; there is no timeout-driven retransmission.

use crate::channel::RecordingChannelId;

/// Sequence value before the first acknowledgement (the first expected is 0)
pub const INITIAL_SEQUENCE: u8 = 0xFF;

/// Default bound on consecutive resends before a channel is stalled
pub const DEFAULT_MAX_RESEND_ATTEMPTS: u16 = 16;

/// Per-run protocol parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullSettings {
    /// IP tag the host listens on (from the per-run system region)
    pub return_tag_id: u8,
    /// Consecutive sequence mismatches answered with a resend before stalling
    pub max_resend_attempts: u16,
}

impl Default for PullSettings {
    fn default() -> Self {
        Self {
            return_tag_id: 0,
            max_resend_attempts: DEFAULT_MAX_RESEND_ATTEMPTS,
        }
    }
}

/// Observable state of a channel's read-back exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Channel not configured (or disabled with size 0)
    Unconfigured,
    /// Exchanging normally
    Active,
    /// Resend bound reached; waiting for a correct acknowledgement
    Stalled,
}

/// Sequence tracking for one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullState {
    last_acknowledged: u8,
    consecutive_resends: u16,
    stalled: bool,
}

impl Default for PullState {
    fn default() -> Self {
        Self {
            last_acknowledged: INITIAL_SEQUENCE,
            consecutive_resends: 0,
            stalled: false,
        }
    }
}

/// What the state machine decided for one acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AckDecision {
    Commit,
    Resend { attempt: u16 },
    Stall,
    IgnoreWhileStalled,
}

impl PullState {
    /// Last sequence number successfully acknowledged
    pub fn last_acknowledged(&self) -> u8 {
        self.last_acknowledged
    }

    /// Sequence number the next acknowledgement must carry
    pub fn expected(&self) -> u8 {
        self.last_acknowledged.wrapping_add(1)
    }

    /// Resends issued since the last commit
    pub fn consecutive_resends(&self) -> u16 {
        self.consecutive_resends
    }

    /// True once the resend bound has been reached
    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    pub(crate) fn on_acknowledgement(&mut self, sequence: u8, max_resends: u16) -> AckDecision {
        if sequence == self.expected() {
            self.last_acknowledged = sequence;
            self.consecutive_resends = 0;
            self.stalled = false;
            return AckDecision::Commit;
        }

        if self.stalled {
            return AckDecision::IgnoreWhileStalled;
        }

        if self.consecutive_resends >= max_resends {
            self.stalled = true;
            return AckDecision::Stall;
        }

        self.consecutive_resends += 1;
        AckDecision::Resend {
            attempt: self.consecutive_resends,
        }
    }
}

/// Why an inbound packet was not acted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Shorter than a host-data-read packet
    Truncated {
        /// Bytes received
        length: usize,
    },
    /// Command this layer does not handle
    UnknownCommand(u16),
    /// Channel nibble names no configured channel
    ChannelNotInUse(u8),
    /// Region nibble does not match the channel's region
    RegionMismatch {
        /// Channel named by the packet
        channel: RecordingChannelId,
        /// Region the channel was configured with
        expected: u8,
        /// Region carried by the packet
        received: u8,
    },
}

/// Result of handling one inbound packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOutcome {
    /// Sequence matched: read cursor advanced
    Committed {
        /// Channel acknowledged
        channel: RecordingChannelId,
        /// New last-acknowledged sequence number
        sequence: u8,
        /// Bytes the host consumed
        space_read: u32,
    },
    /// Sequence mismatch: read request sent again
    Resent {
        /// Channel concerned
        channel: RecordingChannelId,
        /// Sequence that was expected
        expected: u8,
        /// Sequence that arrived
        received: u8,
        /// Consecutive resend number (1-based)
        attempt: u16,
        /// False if the transport refused the packet
        sent: bool,
    },
    /// Sequence mismatch with the resend bound reached; nothing sent
    Stalled {
        /// Channel concerned
        channel: RecordingChannelId,
        /// Sequence that was expected
        expected: u8,
        /// Sequence that arrived
        received: u8,
    },
    /// Packet not for this layer or not usable
    Ignored(IgnoreReason),
}

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

//! # FEAGI NPU Event Buffers
//!
//! Fixed-capacity circular buffers that carry neural events from the packet
//! interrupt (producer) to the simulation step loop (consumer).
//!
//! This crate provides:
//! - **Records**: [`Spike`] (key only) and [`GradientPotential`] (key + payload
//!   packed into one 64-bit word), plus the s16.15 fixed-point [`Accum`]
//! - **Buffer**: [`RingBuffer`], allocated once, never resized, no locks
//! - **Handles**: [`Producer`] / [`Consumer`] obtained from [`RingBuffer::split`]
//!
//! ## Features
//!
//! - `default` = `["std"]`
//! - `std` = `std::error::Error` impls (the buffers themselves only need `alloc`)
//!
//! ## Usage
//!
//! ```rust
//! use feagi_npu_event_buffer::{Spike, SpikeBuffer};
//!
//! let mut buffer = SpikeBuffer::initialize(4).unwrap();
//! let (mut producer, mut consumer) = buffer.split();
//!
//! assert!(producer.push(Spike::new(10)));
//! assert!(consumer.peek_and_consume_if_key_equals(10));
//! assert!(consumer.pop().is_none());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod record;
pub mod ring_buffer;

pub use error::{BufferError, Result};
pub use record::{Accum, EventRecord, GradientPotential, Key, Payload, Spike};
pub use ring_buffer::{BufferDump, BufferStats, Consumer, Producer, RingBuffer, MIN_CAPACITY};

/// Buffer of incoming action potentials (spikes)
pub type SpikeBuffer = RingBuffer<Spike>;

/// Buffer of incoming gradient potentials (spike + payload)
pub type GradientPotentialBuffer = RingBuffer<GradientPotential>;

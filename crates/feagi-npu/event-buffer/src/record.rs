// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Event record types carried by the buffers
//!
//! Multicast packets always carry a 32-bit routing key and optionally a 32-bit
//! payload. A spike is the key alone; a gradient potential packs the key into
//! the high word and the payload into the low word of a `u64`.

use core::fmt;

/// 32-bit multicast routing key
pub type Key = u32;

/// 32-bit multicast payload
pub type Payload = u32;

/// Fixed-width record that can be stored in a [`RingBuffer`](crate::RingBuffer)
///
/// Every record is addressed by a routing key, which is what
/// `peek_and_consume_if_key_equals` compares against.
pub trait EventRecord: Copy + Default + fmt::Debug {
    /// Routing key of this event
    fn key(&self) -> Key;
}

/// Action potential: an event identified solely by its routing key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Spike(pub Key);

impl Spike {
    /// Create a spike for a routing key
    #[inline]
    pub const fn new(key: Key) -> Self {
        Self(key)
    }
}

impl EventRecord for Spike {
    #[inline]
    fn key(&self) -> Key {
        self.0
    }
}

impl From<Key> for Spike {
    fn from(key: Key) -> Self {
        Self(key)
    }
}

impl fmt::Display for Spike {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key:{:08x}", self.0)
    }
}

/// Gradient potential: routing key (high 32 bits) + payload (low 32 bits)
///
/// The packed word is never mutated in place; build a new value instead.
///
/// # Example
/// ```
/// use feagi_npu_event_buffer::GradientPotential;
///
/// let gp = GradientPotential::new(0x0001_0002, 0xdead_beef);
/// assert_eq!(gp.to_bits(), 0x0001_0002_dead_beef);
/// assert_eq!(gp.payload(), 0xdead_beef);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct GradientPotential(u64);

impl GradientPotential {
    /// Pack a key and a payload
    #[inline]
    pub const fn new(key: Key, payload: Payload) -> Self {
        Self(((key as u64) << 32) | payload as u64)
    }

    /// Pack a key with the raw bit pattern of a fixed-point accumulator
    #[inline]
    pub const fn from_accum(key: Key, value: Accum) -> Self {
        Self::new(key, value.to_payload())
    }

    /// Reinterpret an already packed 64-bit word
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Packed 64-bit word
    #[inline]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Routing key (high word)
    #[inline]
    pub const fn key(self) -> Key {
        (self.0 >> 32) as Key
    }

    /// Payload (low word)
    #[inline]
    pub const fn payload(self) -> Payload {
        (self.0 & u32::MAX as u64) as Payload
    }

    /// Payload interpreted as an s16.15 accumulator
    #[inline]
    pub const fn accum(self) -> Accum {
        Accum::from_payload(self.payload())
    }
}

impl EventRecord for GradientPotential {
    #[inline]
    fn key(&self) -> Key {
        GradientPotential::key(*self)
    }
}

impl fmt::Display for GradientPotential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key:{:08x}, payload:{:08x}", self.key(), self.payload())
    }
}

/// Signed s16.15 fixed-point value (16 integer bits, 15 fractional bits)
///
/// This is the accumulator format neuron state is computed in; a gradient
/// potential carries its bit pattern unchanged as the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Accum(i32);

impl Accum {
    /// Number of fractional bits
    pub const FRACTIONAL_BITS: u32 = 15;

    /// 1.0
    pub const ONE: Accum = Accum(1 << Self::FRACTIONAL_BITS);

    /// 0.0
    pub const ZERO: Accum = Accum(0);

    const SCALE: f32 = (1u32 << Self::FRACTIONAL_BITS) as f32;

    /// Wrap a raw bit pattern
    #[inline]
    pub const fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    /// Raw bit pattern
    #[inline]
    pub const fn to_bits(self) -> i32 {
        self.0
    }

    /// Convert from `f32`, truncating toward zero and saturating at the range ends
    #[inline]
    pub fn from_f32(value: f32) -> Self {
        // `as` saturates on overflow and maps NaN to 0
        Self((value * Self::SCALE) as i32)
    }

    /// Convert to `f32`
    #[inline]
    pub fn to_f32(self) -> f32 {
        self.0 as f32 / Self::SCALE
    }

    /// Bit pattern as a multicast payload
    #[inline]
    pub const fn to_payload(self) -> Payload {
        self.0 as Payload
    }

    /// Inverse of [`Accum::to_payload`]
    #[inline]
    pub const fn from_payload(payload: Payload) -> Self {
        Self(payload as i32)
    }
}

impl fmt::Display for Accum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_potential_packing() {
        let gp = GradientPotential::new(0xCAFE_0001, 0x0000_0042);
        assert_eq!(gp.key(), 0xCAFE_0001);
        assert_eq!(gp.payload(), 0x0000_0042);
        assert_eq!(EventRecord::key(&gp), 0xCAFE_0001);
    }

    #[test]
    fn test_gradient_potential_from_bits() {
        let gp = GradientPotential::from_bits(0xFFFF_FFFF_0000_0001);
        assert_eq!(gp.key(), u32::MAX);
        assert_eq!(gp.payload(), 1);
    }

    #[test]
    fn test_accum_payload_is_raw_bit_pattern() {
        let value = Accum::from_f32(-1.5);
        assert_eq!(value.to_bits(), -(3 << 14));
        let gp = GradientPotential::from_accum(7, value);
        assert_eq!(gp.payload(), (-(3i32 << 14)) as u32);
        assert_eq!(gp.accum(), value);
        assert_eq!(gp.accum().to_f32(), -1.5);
    }

    #[test]
    fn test_accum_saturates() {
        assert_eq!(Accum::from_f32(1.0e9).to_bits(), i32::MAX);
        assert_eq!(Accum::from_f32(-1.0e9).to_bits(), i32::MIN);
        assert_eq!(Accum::from_f32(f32::NAN), Accum::ZERO);
        assert_eq!(Accum::from_f32(1.0), Accum::ONE);
    }

    #[test]
    fn test_spike_key() {
        let spike = Spike::from(0x1234);
        assert_eq!(spike.key(), 0x1234);
        assert_eq!(Spike::new(0x1234), spike);
    }
}

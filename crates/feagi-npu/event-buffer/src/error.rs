// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for event buffer setup
//!
//! Only initialization can fail. Overflow and underflow during operation are
//! counted on the buffer, never returned as errors.

use core::fmt;

/// Event buffer errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Backing storage could not be reserved
    AllocationFailure {
        /// Requested number of slots
        capacity: usize,
        /// Requested size in bytes
        bytes: usize,
    },

    /// Capacity too small to hold any event (one slot is always kept empty)
    InvalidCapacity {
        /// Requested number of slots
        capacity: usize,
    },
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::AllocationFailure { capacity, bytes } => {
                write!(
                    f,
                    "Cannot allocate event buffer: {} slots ({} bytes)",
                    capacity, bytes
                )
            }
            BufferError::InvalidCapacity { capacity } => {
                write!(
                    f,
                    "Invalid event buffer capacity {}: at least {} slots required",
                    capacity,
                    crate::MIN_CAPACITY
                )
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BufferError {}

/// Result type for event buffer operations
pub type Result<T> = core::result::Result<T, BufferError>;

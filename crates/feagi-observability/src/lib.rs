// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # feagi-observability
//!
//! Logging infrastructure for the FEAGI NPU stream crates.
//!
//! Provides consistent logging setup across all crates with per-crate debug
//! flag support (`--debug-feagi-npu-recording`, `FEAGI_DEBUG=all`, ...).
//!
//! ## Features
//! - `file-logging`: JSON log files per run with retention (desktop only)

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

// Re-export commonly used items
pub use cli::*;
pub use init::*;

/// Known crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "feagi-npu-event-buffer",
    "feagi-npu-recording",
    "feagi-config",
    "feagi-npu-stream",
];

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unified logging initialization
//!
//! Console logging is always available. With the `file-logging` feature, each
//! run also gets its own folder of JSON log files with configurable retention.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::cli::CrateDebugFlags;

/// Build the filter for a run
///
/// `RUST_LOG` wins when set; otherwise the debug flags on top of
/// `default_level`.
pub fn build_env_filter(debug_flags: &CrateDebugFlags, default_level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = debug_flags.to_filter_string_with_default(default_level);
    EnvFilter::try_new(&directives).map_err(|e| anyhow!("Invalid log filter '{}': {}", directives, e))
}

/// Initialize human-readable console logging
///
/// # Errors
/// Fails if the filter is invalid or a global subscriber is already set.
pub fn init_console_logging(debug_flags: &CrateDebugFlags, default_level: &str) -> Result<()> {
    let env_filter = build_env_filter(debug_flags, default_level)?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

#[cfg(feature = "file-logging")]
pub use file::*;

#[cfg(feature = "file-logging")]
mod file {
    use std::path::{Path, PathBuf};

    use anyhow::{anyhow, Context, Result};
    use chrono::{NaiveDateTime, Utc};
    use tracing_appender::rolling;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Layer, Registry};

    use super::build_env_filter;
    use crate::cli::CrateDebugFlags;

    const RUN_PREFIX: &str = "run_";
    const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

    /// Logging initialization result
    ///
    /// Log files are flushed when this is dropped; keep it alive for the run.
    pub struct LoggingGuard {
        _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
        log_dir: PathBuf,
    }

    impl LoggingGuard {
        /// Get the log directory path
        pub fn log_dir(&self) -> &Path {
            &self.log_dir
        }
    }

    /// Initialize logging with file output and console output
    ///
    /// Creates a timestamped folder structure:
    /// ```text
    /// ./logs/
    ///   └── run_20250101_120000/
    ///       ├── feagi-npu-event-buffer.log
    ///       ├── feagi-npu-recording.log
    ///       └── feagi.log (combined)
    /// ```
    ///
    /// # Arguments
    /// * `debug_flags` - Per-crate debug flags for filtering
    /// * `default_level` - Level for everything the flags do not raise
    /// * `log_dir` - Base directory for logs (default: `./logs`)
    /// * `retention_days` - Keep logs for N days (default: 30)
    /// * `retention_runs` - Keep N most recent runs (default: 10)
    pub fn init_logging(
        debug_flags: &CrateDebugFlags,
        default_level: &str,
        log_dir: Option<PathBuf>,
        retention_days: Option<u64>,
        retention_runs: Option<usize>,
    ) -> Result<LoggingGuard> {
        let base_log_dir = log_dir.unwrap_or_else(|| PathBuf::from("./logs"));

        let timestamp = Utc::now().format(RUN_TIMESTAMP_FORMAT);
        let run_folder = base_log_dir.join(format!("{}{}", RUN_PREFIX, timestamp));
        std::fs::create_dir_all(&run_folder)
            .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

        cleanup_old_logs(
            &base_log_dir,
            retention_days.unwrap_or(30),
            retention_runs.unwrap_or(10),
        )?;

        let env_filter = build_env_filter(debug_flags, default_level)?;

        let mut layers = Vec::new();
        let mut file_guards = Vec::new();

        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_filter(env_filter)
            .boxed();
        layers.push(console_layer);

        // One file per crate, always at debug
        for crate_name in crate::KNOWN_CRATES {
            let file_appender = rolling::never(&run_folder, format!("{}.log", crate_name));
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            file_guards.push(guard);

            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .with_filter(EnvFilter::new(format!(
                    "{}=debug,off",
                    crate_name.replace('-', "_")
                )))
                .boxed();
            layers.push(file_layer);
        }

        let combined_appender = rolling::never(&run_folder, "feagi.log");
        let (combined_non_blocking, combined_guard) = tracing_appender::non_blocking(combined_appender);
        file_guards.push(combined_guard);

        let combined_layer = tracing_subscriber::fmt::layer()
            .with_writer(combined_non_blocking)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .json()
            .with_filter(build_env_filter(debug_flags, default_level)?)
            .boxed();
        layers.push(combined_layer);

        Registry::default()
            .with(layers)
            .try_init()
            .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

        Ok(LoggingGuard {
            _file_guards: file_guards,
            log_dir: run_folder,
        })
    }

    /// Clean up old run directories based on retention policy
    ///
    /// Removes runs older than `retention_days`, then the oldest runs beyond
    /// `retention_runs`. Returns the number of directories removed.
    pub fn cleanup_old_logs(
        base_log_dir: &Path,
        retention_days: u64,
        retention_runs: usize,
    ) -> Result<usize> {
        if !base_log_dir.exists() {
            return Ok(0);
        }

        let cutoff = Utc::now().naive_utc() - chrono::Duration::days(retention_days as i64);

        let mut runs: Vec<(PathBuf, NaiveDateTime)> = Vec::new();
        for entry in std::fs::read_dir(base_log_dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let started = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(RUN_PREFIX))
                .and_then(|ts| NaiveDateTime::parse_from_str(ts, RUN_TIMESTAMP_FORMAT).ok());
            if let Some(started) = started {
                runs.push((path, started));
            }
        }

        // Oldest first
        runs.sort_by_key(|(_, started)| *started);

        let expired = runs.iter().filter(|(_, started)| *started < cutoff).count();
        let surplus = runs.len().saturating_sub(retention_runs);
        let to_remove = expired.max(surplus);

        let mut removed = 0;
        for (path, _) in runs.iter().take(to_remove) {
            match std::fs::remove_dir_all(path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove old log directory"
                ),
            }
        }

        Ok(removed)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_from_flags() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-feagi-npu-recording".to_string()]);
        std::env::remove_var("RUST_LOG");
        let filter = build_env_filter(&flags, "warn").unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("feagi_npu_recording=debug"));
        assert!(rendered.contains("warn"));
    }
}

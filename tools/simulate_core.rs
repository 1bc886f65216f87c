// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Off-chip simulation of one neural core's event and recording traffic.
//!
//! A producer thread plays the packet interrupt and pushes synthetic spikes
//! and gradient potentials into the SPSC buffers. The main thread plays the
//! step loop: it drains the buffers, records fired keys and potentials, and
//! runs the host pull exchange against an in-process host reader.

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, FromArgMatches, Parser};
use feagi_npu_stream::config::{load_config_or_default, StreamConfig};
use feagi_npu_stream::observability::{debug_flags_help, parse_debug_flags};
use feagi_npu_stream::prelude::*;
use feagi_npu_stream::recording::RecordingError;
use feagi_npu_stream::setup;

/// Simulate one neural core's event buffers and recording read-back
#[derive(Parser, Debug)]
#[command(name = "simulate_core", version, long_about = None)]
struct Options {
    /// Configuration file (default: feagi_npu_stream.toml if found, else built-in defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulation ticks to run
    #[arg(long, default_value_t = 100)]
    ticks: u32,

    /// Synthetic neurons firing per tick
    #[arg(long, default_value_t = 32)]
    neurons: u32,

    /// Every n-th host ack carries a wrong sequence number
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    corrupt_every: Option<u32>,

    /// Configuration override, e.g. `--set core_id=3` (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    overrides: Vec<(String, String)>,

    /// Base directory for per-run log files (file-logging builds)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn parse_key_value(value: &str) -> std::result::Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{value}'"))
}

impl Options {
    /// Parse the process arguments; `--debug-*` flags belong to the logging setup
    fn from_process_args() -> Self {
        let args = env::args().filter(|arg| !arg.starts_with("--debug-"));
        let matches = Options::command()
            .after_help(debug_flags_help())
            .get_matches_from(args);
        Options::from_arg_matches(&matches).unwrap_or_else(|err| err.exit())
    }

    fn override_map(&self) -> HashMap<String, String> {
        self.overrides.iter().cloned().collect()
    }
}

/// Outbound packets queued for the host reader
#[derive(Default)]
struct LoopbackLink {
    outbox: VecDeque<SdpMessage>,
}

impl HostTransport for LoopbackLink {
    type Error = Infallible;

    fn send_to_host(&mut self, message: &SdpMessage) -> std::result::Result<(), Infallible> {
        self.outbox.push_back(*message);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RunTotals {
    spikes_received: u64,
    potentials_received: u64,
    records_dropped: u64,
    acks_sent: u64,
    acks_corrupted: u64,
    committed: u64,
    resent: u64,
    stalled: u64,
}

/// Synthetic firing pattern: every neuron fires on a stride set by its id
fn fires(tick: u32, neuron: u32) -> bool {
    (tick + neuron) % (neuron % 5 + 2) == 0
}

fn produce(
    ticks: u32,
    neurons: u32,
    mut spikes: Producer<'_, Spike>,
    mut potentials: Producer<'_, GradientPotential>,
) {
    for tick in 0..ticks {
        for neuron in 0..neurons {
            if fires(tick, neuron) {
                // Full buffer drops the event; the overflow counter records it
                spikes.push(Spike::new(neuron));
            }
            let ramp = Accum::from_f32((tick % 16) as f32 / 16.0 - 0.5);
            potentials.push(GradientPotential::from_accum(neuron, ramp));
        }
        thread::yield_now();
    }
}

fn record(
    channels: &mut RecordingChannels<'_>,
    channel: RecordingChannelId,
    bytes: &[u8],
    totals: &mut RunTotals,
) {
    match channels.record(channel, bytes) {
        Ok(()) | Err(RecordingError::ChannelNotInUse { .. }) => {}
        Err(_) => totals.records_dropped += 1,
    }
}

/// Run every queued read request through the host reader and feed the acks back
fn pump_host(
    channels: &mut RecordingChannels<'_>,
    link: &mut LoopbackLink,
    host: &mut HostReader,
    corrupt_every: Option<u32>,
    totals: &mut RunTotals,
) {
    channels.request_pending_reads(link);
    while let Some(message) = link.outbox.pop_front() {
        let Some(response) = host.handle_request(&*channels, &message) else {
            continue;
        };
        let mut ack = response.ack();
        totals.acks_sent += 1;
        if corrupt_every.is_some_and(|n| totals.acks_sent % n as u64 == 0) {
            ack.sequence = ack.sequence.wrapping_add(7);
            totals.acks_corrupted += 1;
        }

        match channels.handle_packet(&ack.to_bytes(), link) {
            PacketOutcome::Committed { .. } => totals.committed += 1,
            PacketOutcome::Resent { .. } => totals.resent += 1,
            PacketOutcome::Stalled { .. } => totals.stalled += 1,
            PacketOutcome::Ignored(reason) => {
                tracing::warn!(?reason, "Host ack ignored");
            }
        }
    }
}

fn run(config: &StreamConfig, options: &Options) -> Result<RunTotals> {
    let mut spike_buffer =
        setup::spike_buffer(config).context("Failed to allocate spike buffer")?;
    let mut potential_buffer = setup::gradient_potential_buffer(config)
        .context("Failed to allocate gradient potential buffer")?;

    let plan = setup::channel_plan(config);
    let mut regions: Vec<Vec<u8>> = plan.iter().map(|p| vec![0u8; p.region_bytes()]).collect();

    let identity = setup::core_identity(config);
    let mut channels = RecordingChannels::new(&identity, setup::pull_settings(config));
    for (p, memory) in plan.iter().zip(regions.iter_mut()) {
        channels
            .configure(
                p.channel,
                RecordingRegion {
                    region_id: p.region_id,
                    base_address: p.base_address,
                    memory: memory.as_mut_slice(),
                },
                p.size_bytes,
            )
            .map_err(|e| anyhow!("Failed to configure {}: {}", p.channel, e))?;
    }

    let mut link = LoopbackLink::default();
    let mut host = HostReader::new();
    let mut totals = RunTotals::default();
    let producer_done = AtomicBool::new(false);

    {
        let (spike_producer, mut spike_consumer) = spike_buffer.split();
        let (potential_producer, mut potential_consumer) = potential_buffer.split();

        thread::scope(|scope| {
            scope.spawn(|| {
                produce(options.ticks, options.neurons, spike_producer, potential_producer);
                producer_done.store(true, Ordering::Release);
            });

            loop {
                // Read the flag before draining so nothing pushed before it is missed
                let done = producer_done.load(Ordering::Acquire);
                let mut drained = 0;

                // Check before popping: a pop on an empty buffer counts as an underflow
                while !spike_consumer.is_empty() {
                    if let Some(spike) = spike_consumer.pop() {
                        totals.spikes_received += 1;
                        record(
                            &mut channels,
                            RecordingChannelId::Spikes,
                            &spike.key().to_le_bytes(),
                            &mut totals,
                        );
                        drained += 1;
                    }
                }
                while !potential_consumer.is_empty() {
                    if let Some(potential) = potential_consumer.pop() {
                        totals.potentials_received += 1;
                        record(
                            &mut channels,
                            RecordingChannelId::Potentials,
                            &potential.to_bits().to_le_bytes(),
                            &mut totals,
                        );
                        drained += 1;
                    }
                }

                if drained > 0 {
                    pump_host(&mut channels, &mut link, &mut host, options.corrupt_every, &mut totals);
                }
                if done {
                    break;
                }
                thread::yield_now();
            }
        });
    }

    pump_host(&mut channels, &mut link, &mut host, options.corrupt_every, &mut totals);
    channels.finalise();

    spike_buffer.report("spikes");
    potential_buffer.report("gradient_potentials");
    for channel in channels.iter() {
        tracing::info!(
            channel = %channel.id(),
            status = ?channels.channel_status(channel.id()),
            bytes_written = channel.header_value(),
            unread = channel.unread_bytes(),
            delivered = host.received(channel.id()).len(),
            "Recording channel summary"
        );
    }

    Ok(totals)
}

fn main() -> Result<()> {
    let options = Options::from_process_args();
    let debug_flags = parse_debug_flags();

    let config = load_config_or_default(options.config.as_deref(), Some(&options.override_map()))
        .context("Failed to load configuration")?;

    #[cfg(feature = "file-logging")]
    let _logging_guard = {
        let guard = feagi_npu_stream::observability::init_logging(
            &debug_flags,
            &config.logging.level,
            options.log_dir.clone(),
            None,
            None,
        )?;
        tracing::info!(log_dir = %guard.log_dir().display(), "Writing run logs");
        guard
    };
    #[cfg(not(feature = "file-logging"))]
    {
        feagi_npu_stream::observability::init_console_logging(&debug_flags, &config.logging.level)?;
        if let Some(log_dir) = &options.log_dir {
            tracing::warn!(
                log_dir = %log_dir.display(),
                "Built without file-logging; --log-dir ignored"
            );
        }
    }

    tracing::info!(
        ticks = options.ticks,
        neurons = options.neurons,
        spike_capacity = config.buffers.spike_capacity,
        chip_id = config.core.chip_id,
        core_id = config.core.core_id,
        "Starting core simulation"
    );

    let totals = run(&config, &options)?;

    println!("spikes received:       {}", totals.spikes_received);
    println!("potentials received:   {}", totals.potentials_received);
    println!("records dropped:       {}", totals.records_dropped);
    println!("host acks:             {} ({} corrupted)", totals.acks_sent, totals.acks_corrupted);
    println!("committed / resent:    {} / {}", totals.committed, totals.resent);
    println!("stalled acks:          {}", totals.stalled);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_definition() {
        Options::command().debug_assert();
    }

    #[test]
    fn test_overrides_and_defaults() {
        let options = Options::try_parse_from([
            "simulate_core",
            "--set",
            "core_id=3",
            "--set",
            "gsyn_bytes = 64",
            "--corrupt-every",
            "5",
        ])
        .unwrap();
        assert_eq!(options.ticks, 100);
        assert_eq!(options.neurons, 32);
        assert_eq!(options.corrupt_every, Some(5));

        let overrides = options.override_map();
        assert_eq!(overrides.get("core_id").map(String::as_str), Some("3"));
        assert_eq!(overrides.get("gsyn_bytes").map(String::as_str), Some("64"));
    }

    #[test]
    fn test_invalid_arguments_rejected() {
        assert!(Options::try_parse_from(["simulate_core", "--corrupt-every", "0"]).is_err());
        assert!(Options::try_parse_from(["simulate_core", "--set", "core_id"]).is_err());
    }
}

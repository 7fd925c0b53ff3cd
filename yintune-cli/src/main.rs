//! # yintune - Live Tuner CLI
//!
//! Thin binary over `yintune-core`: lists input devices and runs the live
//! tuner on one of them.
//!
//! ## Architecture
//! - **Audio callback**: cpal thread, downmixes and queues fixed-size blocks
//! - **Main thread**: estimator + smoother loop, prints one line per block
//! - **Ctrl+C**: handler sends on a shutdown channel; the loop returns and the
//!   capture is dropped, which stops the stream

mod cli;

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use yintune_core::audio::{list_input_devices, AudioCapture};
use yintune_core::live::{run_live, LiveTuner, LoopControl};
use yintune_core::{AudioFrame, LiveDisplayState, PitchResult};

use cli::{Cli, Command, LiveArgs};

/// Capacity of the block queue between the audio callback and the main loop.
const BLOCK_QUEUE_CAPACITY: usize = 16;

/// One `--json` output line.
#[derive(Serialize)]
struct FrameRecord<'a> {
    raw_frequency: f32,
    raw_confidence: f32,
    #[serde(flatten)]
    display: &'a LiveDisplayState,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .parse_default_env()
        .init();

    match cli.command {
        Command::Devices { json } => print_devices(json),
        Command::Live(args) => run(&args),
    }
}

fn print_devices(json: bool) -> Result<()> {
    let devices = list_input_devices()?;
    if devices.is_empty() {
        eprintln!("No input devices found.");
        return Ok(());
    }
    for device in &devices {
        if json {
            println!("{}", serde_json::to_string(device)?);
        } else {
            let marker = if device.is_default { " (default)" } else { "" };
            println!(
                "{:>3}: {}  [{} ch]{marker}",
                device.index, device.name, device.max_input_channels
            );
        }
    }
    Ok(())
}

fn run(args: &LiveArgs) -> Result<()> {
    let config = args.resolve_config()?;
    let mut capture_config = config.capture_config();
    capture_config.device = args.device.clone();

    let (block_tx, block_rx) = crossbeam_channel::bounded::<AudioFrame>(BLOCK_QUEUE_CAPACITY);
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("cannot install Ctrl+C handler")?;

    // Held until the loop returns; dropping it stops the stream.
    let capture = AudioCapture::start(&capture_config, block_tx)?;
    let mut tuner = LiveTuner::from_config(&config);
    eprintln!(
        "Listening on {} ({} ch at {} Hz, A4 = {} Hz). Press Ctrl+C to stop.",
        capture.device_name(),
        capture.channels(),
        capture.sample_rate(),
        config.a4
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut write_error = None;
    let summary = run_live(&block_rx, &shutdown_rx, &mut tuner, |result, state| {
        let written = if args.json {
            write_json_line(&mut out, result, state)
        } else {
            write_status_line(&mut out, state)
        };
        match written {
            Ok(()) => LoopControl::Continue,
            Err(e) => {
                write_error = Some(e);
                LoopControl::Stop
            }
        }
    });
    if !args.json {
        writeln!(out)?;
    }
    drop(capture);

    log::info!(
        "Stopped ({:?}): {} block(s), {} with pitch",
        summary.reason,
        summary.blocks,
        summary.pitched
    );
    match write_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn write_status_line(out: &mut impl Write, state: &LiveDisplayState) -> Result<()> {
    match state {
        LiveDisplayState::Pitch {
            median_frequency,
            shown_note,
            cents,
            confidence,
        } => {
            let note = shown_note.to_string();
            write!(
                out,
                "\r{median_frequency:7.2} Hz  {note:<4}  {cents:+6.1} cents  conf={confidence:4.2}   "
            )?;
        }
        LiveDisplayState::NoPitch => write!(out, "\r(no pitch){:<40}", "")?,
    }
    out.flush()?;
    Ok(())
}

fn write_json_line(
    out: &mut impl Write,
    result: &PitchResult,
    state: &LiveDisplayState,
) -> Result<()> {
    let record = FrameRecord {
        raw_frequency: result.frequency,
        raw_confidence: result.confidence,
        display: state,
    };
    serde_json::to_writer(&mut *out, &record)?;
    writeln!(out)?;
    Ok(())
}

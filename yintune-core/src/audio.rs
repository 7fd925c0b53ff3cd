//! # Audio Capture Module
//!
//! This module handles real-time audio capture using CPAL (Cross-Platform Audio Library).
//! The input callback only downmixes, cuts fixed-size blocks and hands them to
//! a channel; all pitch work happens on the consumer side.
//!
//! ## Features
//! - Default or named input device selection
//! - Closest supported sample rate, preferring 32-bit float input
//! - Non-blocking hand-off: a full channel drops the block
//! - The stream is paused and released when the capture is dropped

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Sender, TrySendError};
use serde::Serialize;

use crate::pitch::downmix;
use crate::AudioFrame;

/// Default number of samples per block handed to the analysis side.
///
/// Larger blocks provide more frequency resolution but increase latency.
pub const BUFFER_SIZE: usize = 2048;

/// Which device to open and how to cut its stream into blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Device name or index as listed by [`list_input_devices`]; `None` for the default.
    pub device: Option<String>,
    /// Requested sample rate in Hz.
    pub sample_rate: u32,
    /// Mono samples per block.
    pub block_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: 48_000,
            block_size: BUFFER_SIZE,
        }
    }
}

/// An input device and its capabilities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputDeviceInfo {
    pub index: usize,
    pub name: String,
    pub max_input_channels: u16,
    pub is_default: bool,
}

/// Cuts a stream of mono samples into fixed-size blocks.
#[derive(Debug)]
pub struct BlockAccumulator {
    buffer: Vec<f32>,
    block_size: usize,
}

impl BlockAccumulator {
    pub fn new(block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            buffer: Vec::with_capacity(block_size * 2),
            block_size,
        }
    }

    /// Appends samples and calls `emit` once per completed block.
    pub fn push(&mut self, samples: &[f32], mut emit: impl FnMut(Vec<f32>)) {
        self.buffer.extend_from_slice(samples);
        while self.buffer.len() >= self.block_size {
            let block: Vec<f32> = self.buffer.drain(..self.block_size).collect();
            emit(block);
        }
    }

    /// Samples waiting for the next block.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// A running input stream feeding a channel.
///
/// Dropping the capture pauses the stream and releases the device, whichever
/// way the owner exits.
pub struct AudioCapture {
    stream: cpal::Stream,
    sample_rate: u32,
    channels: u16,
    device_name: String,
    dropped: Arc<AtomicUsize>,
}

impl AudioCapture {
    /// Starts audio capture and streams mono frames into `sender`.
    ///
    /// This function:
    /// 1. Selects the default (or the configured) input device
    /// 2. Picks the supported config closest to the requested sample rate
    /// 3. Sets up a callback that downmixes, cuts blocks and `try_send`s them
    ///    as [`AudioFrame`]s tagged with the stream's sample rate
    ///
    /// # Errors
    /// Returns an error if no device matches, no f32 input format exists, or
    /// the stream cannot be built or started.
    pub fn start(config: &CaptureConfig, sender: Sender<AudioFrame>) -> Result<Self> {
        let host = cpal::default_host();
        let device = select_device(&host, config.device.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
        log::info!("Using audio input device: {device_name}");

        let configs = device
            .supported_input_configs()
            .context("cannot query input configs")?
            .collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, config.sample_rate)
            .ok_or_else(|| anyhow!("No suitable f32 input format found on {device_name}"))?;

        let sample_rate = supported_config
            .max_sample_rate()
            .0
            .min(config.sample_rate)
            .max(supported_config.min_sample_rate().0);
        let stream_config = supported_config.with_sample_rate(cpal::SampleRate(sample_rate));
        let channels = stream_config.channels();
        let stream_config: cpal::StreamConfig = stream_config.into();
        log::info!("Selected sample rate: {sample_rate} Hz, {channels} channel(s)");
        if sample_rate != config.sample_rate {
            log::warn!(
                "requested {} Hz is not supported, capturing at {sample_rate} Hz",
                config.sample_rate
            );
        }

        let dropped = Arc::new(AtomicUsize::new(0));
        let dropped_in_callback = Arc::clone(&dropped);
        let mut accumulator = BlockAccumulator::new(config.block_size);
        let channel_count = usize::from(channels);

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono = downmix(data, channel_count);
                    accumulator.push(&mono, |block| {
                        // Never block the audio thread; a full queue loses the block.
                        let frame = AudioFrame::new(block, sample_rate);
                        if let Err(TrySendError::Full(_)) = sender.try_send(frame) {
                            dropped_in_callback.fetch_add(1, Ordering::Relaxed);
                        }
                    });
                },
                |err| log::error!("An error occurred on the audio stream: {err}"),
                None,
            )
            .context("cannot build input stream")?;

        stream.play().context("cannot start input stream")?;

        Ok(Self {
            stream,
            sample_rate,
            channels,
            device_name,
            dropped,
        })
    }

    /// The sample rate the stream actually runs at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channels delivered by the device before downmixing.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Blocks lost because the channel was full.
    pub fn dropped_blocks(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        log::debug!("Stopping audio stream on {}", self.device_name);
        if let Err(e) = self.stream.pause() {
            log::warn!("Error pausing stream: {e}");
        }
        let dropped = self.dropped_blocks();
        if dropped > 0 {
            log::warn!("{dropped} audio block(s) dropped while the consumer was busy");
        }
    }
}

/// Lists every input device of the default host.
///
/// # Errors
/// Returns an error if the host cannot enumerate its devices.
pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let devices = host.input_devices().context("cannot enumerate input devices")?;

    Ok(devices
        .enumerate()
        .map(|(index, device)| {
            let name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
            let max_input_channels = device
                .supported_input_configs()
                .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                .unwrap_or(0);
            let is_default = default_name.as_deref() == Some(name.as_str());
            InputDeviceInfo {
                index,
                name,
                max_input_channels,
                is_default,
            }
        })
        .collect())
}

/// Resolves a device by exact name, then by index, or the default device.
fn select_device(host: &cpal::Host, wanted: Option<&str>) -> Result<cpal::Device> {
    let Some(wanted) = wanted else {
        return host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"));
    };

    let mut devices: Vec<cpal::Device> = host
        .input_devices()
        .context("cannot enumerate input devices")?
        .collect();
    if let Some(position) = devices
        .iter()
        .position(|d| d.name().is_ok_and(|name| name == wanted))
    {
        return Ok(devices.swap_remove(position));
    }
    if let Ok(index) = wanted.parse::<usize>() {
        if index < devices.len() {
            return Ok(devices.swap_remove(index));
        }
    }
    Err(anyhow!("No input device named {wanted:?}"))
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Only 32-bit float formats qualify. Among those, the range closest to
/// `target_rate` wins, then the one with the fewest channels.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            (
                rate_distance(c.min_sample_rate().0, c.max_sample_rate().0, target_rate),
                c.channels(),
            )
        })
}

/// Distance from `target` to the closed range `[min, max]`.
fn rate_distance(min: u32, max: u32, target: u32) -> u32 {
    if target < min {
        min - target
    } else {
        target.saturating_sub(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_emits_full_blocks() {
        let mut accumulator = BlockAccumulator::new(4);
        let mut blocks = Vec::new();
        accumulator.push(&[1.0, 2.0, 3.0], |b| blocks.push(b));
        assert!(blocks.is_empty());
        assert_eq!(accumulator.pending(), 3);

        accumulator.push(&[4.0, 5.0, 6.0, 7.0, 8.0, 9.0], |b| blocks.push(b));
        assert_eq!(blocks, vec![vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]]);
        assert_eq!(accumulator.pending(), 1);
    }

    #[test]
    fn test_accumulator_zero_block_size() {
        let mut accumulator = BlockAccumulator::new(0);
        let mut count = 0;
        accumulator.push(&[1.0, 2.0], |_| count += 1);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_rate_distance() {
        assert_eq!(rate_distance(44_100, 48_000, 48_000), 0);
        assert_eq!(rate_distance(44_100, 96_000, 48_000), 0);
        assert_eq!(rate_distance(8_000, 44_100, 48_000), 3_900);
        assert_eq!(rate_distance(96_000, 192_000, 48_000), 48_000);
    }

    #[test]
    fn test_full_channel_drops_without_blocking() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut accumulator = BlockAccumulator::new(2);
        let mut dropped = 0;
        accumulator.push(&[0.0; 6], |block| {
            if let Err(TrySendError::Full(_)) = tx.try_send(AudioFrame::new(block, 48_000)) {
                dropped += 1;
            }
        });
        assert_eq!(rx.len(), 1);
        assert_eq!(dropped, 2);
    }
}
